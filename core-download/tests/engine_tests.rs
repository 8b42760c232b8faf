//! End-to-end engine tests against a scripted processing service and an
//! in-memory store.

use async_trait::async_trait;
use bytes::Bytes;
use core_download::{
    DownloadEngine, DownloadError, DownloadStatus, DownloadTask, EngineConfig, MediaPayload,
    ProgressFn, RemoteStatus, SongInfo, SongProcessingApi, StatusResponse,
};
use core_library::MetadataStore;
use core_media::MediaBlobCache;
use core_runtime::{CoreEvent, DownloadEvent, EventBus};
use core_store::{Collection, EmbeddedObjectStore, ObjectStore};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Processing service whose responses are scripted per test.
struct ScriptedApi {
    info: SongInfo,
    /// Poll responses consumed in order; the last one repeats forever.
    statuses: Mutex<VecDeque<StatusResponse>>,
    audio: Bytes,
    thumbnail_fails: bool,
    resolution_calls: Mutex<u32>,
}

impl ScriptedApi {
    fn new(statuses: Vec<RemoteStatus>) -> Self {
        Self {
            info: SongInfo {
                id: "song-1".to_string(),
                title: "Test Song".to_string(),
                artist: "Test Artist".to_string(),
                thumbnail_url: Some("https://example.com/t.jpg".to_string()),
                duration_secs: Some(180),
                keywords: vec!["test".to_string()],
            },
            statuses: Mutex::new(
                statuses
                    .into_iter()
                    .map(|status| StatusResponse {
                        status,
                        progress: None,
                        message: None,
                    })
                    .collect(),
            ),
            audio: Bytes::from_static(b"audio-bytes"),
            thumbnail_fails: false,
            resolution_calls: Mutex::new(0),
        }
    }

    fn with_failing_thumbnail(mut self) -> Self {
        self.thumbnail_fails = true;
        self
    }
}

#[async_trait]
impl SongProcessingApi for ScriptedApi {
    async fn request_processing(&self, _source_url: &str) -> Result<SongInfo, DownloadError> {
        *self.resolution_calls.lock().unwrap() += 1;
        Ok(self.info.clone())
    }

    async fn processing_status(&self, _song_id: &str) -> Result<StatusResponse, DownloadError> {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            Ok(statuses.pop_front().unwrap())
        } else {
            Ok(statuses
                .front()
                .cloned()
                .unwrap_or(StatusResponse {
                    status: RemoteStatus::Completed,
                    progress: None,
                    message: None,
                }))
        }
    }

    async fn fetch_audio(
        &self,
        _song_id: &str,
        progress: ProgressFn,
    ) -> Result<MediaPayload, DownloadError> {
        progress(self.audio.len() as u64, Some(self.audio.len() as u64));
        Ok(MediaPayload {
            bytes: self.audio.clone(),
            mime: Some("audio/mpeg".to_string()),
        })
    }

    async fn fetch_thumbnail(&self, _song_id: &str) -> Result<MediaPayload, DownloadError> {
        if self.thumbnail_fails {
            return Err(DownloadError::Transport("thumbnail unavailable".to_string()));
        }
        Ok(MediaPayload {
            bytes: Bytes::from_static(b"jpeg-bytes"),
            mime: Some("image/jpeg".to_string()),
        })
    }
}

struct Harness {
    engine: Arc<DownloadEngine>,
    media: Arc<MediaBlobCache>,
    library: Arc<MetadataStore>,
    store: Arc<dyn ObjectStore>,
    events: EventBus,
}

async fn harness(api: ScriptedApi) -> Harness {
    let store: Arc<dyn ObjectStore> = Arc::new(EmbeddedObjectStore::in_memory().await.unwrap());
    let events = EventBus::new(64);
    let media = Arc::new(MediaBlobCache::new(store.clone()));
    let library = Arc::new(MetadataStore::new(store.clone(), events.clone()));
    let engine = Arc::new(DownloadEngine::new(
        Arc::new(api),
        media.clone(),
        library.clone(),
        store.clone(),
        events.clone(),
        EngineConfig {
            poll_interval: Duration::from_millis(5),
            max_poll_attempts: 20,
        },
    ));
    Harness {
        engine,
        media,
        library,
        store,
        events,
    }
}

async fn wait_for_status(
    engine: &DownloadEngine,
    task_id: &str,
    status: DownloadStatus,
) -> DownloadTask {
    for _ in 0..200 {
        let task = engine.task(task_id).await.unwrap();
        if task.status == status {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task never reached {:?}", status);
}

#[tokio::test]
async fn test_download_end_to_end() {
    let h = harness(ScriptedApi::new(vec![
        RemoteStatus::Processing,
        RemoteStatus::Completed,
    ]))
    .await;

    let task = h.engine.start_download("https://youtu.be/abc123").await.unwrap();
    assert_eq!(task.song_id, "song-1");
    assert_eq!(task.status, DownloadStatus::Pending);

    let done = wait_for_status(&h.engine, &task.id, DownloadStatus::Completed).await;
    assert_eq!(done.progress, 100);
    assert!(done.phase.is_none());
    assert_eq!(done.bytes_total, Some("audio-bytes".len() as u64));
    assert!(done.error.is_none());

    let song = h.library.get_song("song-1").await.unwrap().unwrap();
    assert_eq!(song.title, "Test Song");
    assert_eq!(song.artist, "Test Artist");

    let audio = h.media.get_audio("song-1").await.unwrap().unwrap();
    assert_eq!(audio.payload.as_ref(), b"audio-bytes");
    let thumb = h.media.get_thumbnail("song-1").await.unwrap();
    assert!(thumb.is_some());
}

#[tokio::test]
async fn test_server_failure_marks_task_unrecoverable() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Failed])).await;
    let mut rx = h.events.subscribe();

    let task = h.engine.start_download("https://youtu.be/abc123").await.unwrap();
    let failed = wait_for_status(&h.engine, &task.id, DownloadStatus::Error).await;
    assert!(failed.error.is_some());

    let mut saw_unrecoverable = false;
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Download(DownloadEvent::Failed { recoverable, .. }) = event {
            saw_unrecoverable = !recoverable;
        }
    }
    assert!(saw_unrecoverable);
}

#[tokio::test]
async fn test_processing_timeout_is_recoverable() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Processing])).await;
    let mut rx = h.events.subscribe();

    let task = h.engine.start_download("https://youtu.be/abc123").await.unwrap();
    let failed = wait_for_status(&h.engine, &task.id, DownloadStatus::Error).await;
    assert!(failed.error.unwrap().contains("did not finish in time"));

    let mut saw_recoverable = false;
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Download(DownloadEvent::Failed { recoverable, .. }) = event {
            saw_recoverable = recoverable;
        }
    }
    assert!(saw_recoverable);
}

#[tokio::test]
async fn test_thumbnail_failure_does_not_fail_download() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Completed]).with_failing_thumbnail()).await;

    let task = h.engine.start_download("https://youtu.be/abc123").await.unwrap();
    wait_for_status(&h.engine, &task.id, DownloadStatus::Completed).await;

    assert!(h.media.get_audio("song-1").await.unwrap().is_some());
    assert!(h.media.get_thumbnail("song-1").await.unwrap().is_none());
    assert!(h.library.get_song("song-1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalid_source_is_rejected_before_any_network_call() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Completed])).await;

    let result = h.engine.start_download("https://vimeo.com/123").await;
    assert!(matches!(result, Err(DownloadError::InvalidSource(_))));
    assert!(h.engine.tasks().await.is_empty());
}

#[tokio::test]
async fn test_load_persisted_pauses_interrupted_tasks() {
    let store: Arc<dyn ObjectStore> = Arc::new(EmbeddedObjectStore::in_memory().await.unwrap());

    let mut interrupted = DownloadTask::new("https://youtu.be/abc", "song-1", "One");
    interrupted.status = DownloadStatus::Downloading;
    let mut done = DownloadTask::new("https://youtu.be/def", "song-2", "Two");
    done.status = DownloadStatus::Completed;
    let log = serde_json::to_vec(&vec![interrupted.clone(), done.clone()]).unwrap();
    store
        .try_put(
            Collection::Downloads,
            "log",
            Bytes::from(log),
            Some("application/json".to_string()),
        )
        .await
        .unwrap();

    let events = EventBus::new(16);
    let media = Arc::new(MediaBlobCache::new(store.clone()));
    let library = Arc::new(MetadataStore::new(store.clone(), events.clone()));
    let engine = DownloadEngine::new(
        Arc::new(ScriptedApi::new(vec![RemoteStatus::Completed])),
        media,
        library,
        store,
        events,
        EngineConfig::default(),
    );

    engine.load_persisted().await.unwrap();

    let tasks = engine.tasks().await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(
        engine.task(&interrupted.id).await.unwrap().status,
        DownloadStatus::Paused
    );
    assert_eq!(
        engine.task(&done.id).await.unwrap().status,
        DownloadStatus::Completed
    );
}

#[tokio::test]
async fn test_remove_task_stops_worker() {
    // Status never leaves Processing, so the worker stays in the poll loop.
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Processing])).await;

    let task = h.engine.start_download("https://youtu.be/abc123").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    h.engine.remove_task(&task.id).await.unwrap();
    assert!(matches!(
        h.engine.task(&task.id).await,
        Err(DownloadError::TaskNotFound(_))
    ));
    assert_eq!(h.engine.active_download_count().await, 0);
}

#[tokio::test]
async fn test_remove_unknown_task_fails() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Completed])).await;
    assert!(matches!(
        h.engine.remove_task("nope").await,
        Err(DownloadError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_fetch_and_store_returns_song_id() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Completed])).await;

    let info = SongInfo {
        id: "bg-song".to_string(),
        title: "Scheduled".to_string(),
        artist: "Someone".to_string(),
        thumbnail_url: None,
        duration_secs: Some(90),
        keywords: Vec::new(),
    };
    let song_id = h.engine.fetch_and_store(&info).await.unwrap();
    assert_eq!(song_id, "bg-song");

    assert!(h.library.get_song("bg-song").await.unwrap().is_some());
    assert!(h.media.get_audio("bg-song").await.unwrap().is_some());
    // No task entry for scheduler-driven downloads
    assert!(h.engine.tasks().await.is_empty());
}

#[tokio::test]
async fn test_clear_completed() {
    let h = harness(ScriptedApi::new(vec![RemoteStatus::Completed])).await;

    let task = h.engine.start_download("https://youtu.be/abc123").await.unwrap();
    wait_for_status(&h.engine, &task.id, DownloadStatus::Completed).await;

    assert_eq!(h.engine.clear_completed().await, 1);
    assert!(h.engine.tasks().await.is_empty());

    // Persisted log reflects the removal
    let record = h
        .store
        .try_get(Collection::Downloads, "log")
        .await
        .unwrap()
        .unwrap();
    let persisted: Vec<DownloadTask> = record.decode_json().unwrap();
    assert!(persisted.is_empty());
}
