//! Download orchestration.
//!
//! The engine owns the task list, drives each task through its lifecycle on a
//! spawned worker, and persists the list after every mutation so a restart
//! can pick up where the app left off. In-flight tasks found at load time are
//! mapped to `Paused` since their workers are gone.

use crate::error::{DownloadError, Result};
use crate::remote::{no_progress, ProgressFn, RemoteStatus, SongInfo, SongProcessingApi};
use crate::source::validate_source_url;
use crate::task::{DownloadPhase, DownloadStatus, DownloadTask};
use bytes::Bytes;
use chrono::Utc;
use core_library::{MetadataStore, Song};
use core_media::MediaBlobCache;
use core_runtime::{CoreEvent, DownloadEvent, EventBus};
use core_store::{Collection, ObjectStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const TASK_LOG_KEY: &str = "log";

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between processing status polls.
    pub poll_interval: Duration,
    /// Poll attempts before the task fails with a timeout.
    pub max_poll_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 150,
        }
    }
}

struct WorkerHandle {
    join: JoinHandle<()>,
    cancel: CancellationToken,
}

pub struct DownloadEngine {
    api: Arc<dyn SongProcessingApi>,
    media: Arc<MediaBlobCache>,
    library: Arc<MetadataStore>,
    store: Arc<dyn ObjectStore>,
    events: EventBus,
    config: EngineConfig,
    tasks: Mutex<Vec<DownloadTask>>,
    workers: StdMutex<HashMap<String, WorkerHandle>>,
}

impl DownloadEngine {
    pub fn new(
        api: Arc<dyn SongProcessingApi>,
        media: Arc<MediaBlobCache>,
        library: Arc<MetadataStore>,
        store: Arc<dyn ObjectStore>,
        events: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            api,
            media,
            library,
            store,
            events,
            config,
            tasks: Mutex::new(Vec::new()),
            workers: StdMutex::new(HashMap::new()),
        }
    }

    /// Restores the persisted task list.
    ///
    /// Tasks that were in flight when the process died have no worker
    /// anymore, so they come back as `Paused` and wait for an explicit
    /// resume.
    pub async fn load_persisted(&self) -> Result<()> {
        let record = self.store.try_get(Collection::Downloads, TASK_LOG_KEY).await?;
        let mut loaded: Vec<DownloadTask> = match record {
            Some(record) => record.decode_json()?,
            None => return Ok(()),
        };

        let mut interrupted = 0;
        for task in &mut loaded {
            if task.status.is_active() {
                task.status = DownloadStatus::Paused;
                task.updated_at = Utc::now().timestamp();
                interrupted += 1;
            }
        }
        if interrupted > 0 {
            info!(count = interrupted, "Interrupted downloads paused on load");
        }

        let count = loaded.len();
        *self.tasks.lock().await = loaded;
        self.persist().await;
        debug!(count, "Download task log restored");
        Ok(())
    }

    /// Validates the source, registers it with the processing service and
    /// queues a task that a background worker drives to completion.
    pub async fn start_download(self: &Arc<Self>, source_url: &str) -> Result<DownloadTask> {
        validate_source_url(source_url)?;

        let info = self.api.request_processing(source_url).await?;

        let mut task = DownloadTask::new(source_url, &info.id, &info.title);
        task.artist = info.artist.clone();
        task.thumbnail_url = info.thumbnail_url.clone();
        task.duration_secs = info.duration_secs;
        task.keywords = info.keywords.clone();

        self.tasks.lock().await.push(task.clone());
        self.persist().await;

        info!(task_id = %task.id, title = %task.title, "Download queued");
        self.events
            .emit(CoreEvent::Download(DownloadEvent::TaskQueued {
                task_id: task.id.clone(),
                title: task.title.clone(),
            }))
            .ok();

        self.spawn_worker(&task.id);
        Ok(task)
    }

    /// Pauses a task mid-transfer. Only valid while `Downloading`.
    pub async fn pause(&self, task_id: &str) -> Result<()> {
        self.set_status(task_id, DownloadStatus::Paused).await?;
        self.stop_worker(task_id);
        info!(task_id, "Download paused");
        Ok(())
    }

    /// Resumes a paused task. The processing service is re-checked before
    /// the transfer restarts.
    pub async fn resume(self: &Arc<Self>, task_id: &str) -> Result<DownloadTask> {
        self.set_status(task_id, DownloadStatus::Pending).await?;
        self.spawn_worker(task_id);
        self.task(task_id).await
    }

    /// Retries a failed task from scratch: the source is resolved again and
    /// the task's song info refreshed before the worker restarts.
    pub async fn retry(self: &Arc<Self>, task_id: &str) -> Result<DownloadTask> {
        self.set_status(task_id, DownloadStatus::Pending).await?;

        let source_url = self.task(task_id).await?.source_url;
        let info = match self.api.request_processing(&source_url).await {
            Ok(info) => info,
            Err(e) => {
                self.fail_task(task_id, &e).await;
                return Err(e);
            }
        };

        {
            let mut tasks = self.tasks.lock().await;
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                task.song_id = info.id.clone();
                task.title = info.title.clone();
                task.artist = info.artist.clone();
                task.thumbnail_url = info.thumbnail_url.clone();
                task.duration_secs = info.duration_secs;
                task.keywords = info.keywords.clone();
                task.progress = 0;
                task.phase = None;
                task.bytes_downloaded = 0;
                task.bytes_total = None;
                task.error = None;
                task.updated_at = Utc::now().timestamp();
            }
        }
        self.persist().await;

        self.spawn_worker(task_id);
        self.task(task_id).await
    }

    /// Removes a task from the list, stopping its worker if one is running.
    /// Cached media for completed tasks is left alone; deleting the song is
    /// the library's job.
    pub async fn remove_task(&self, task_id: &str) -> Result<()> {
        self.stop_worker(task_id);

        let removed = {
            let mut tasks = self.tasks.lock().await;
            let before = tasks.len();
            tasks.retain(|t| t.id != task_id);
            tasks.len() < before
        };
        if !removed {
            return Err(DownloadError::TaskNotFound(task_id.to_string()));
        }

        self.persist().await;
        self.events
            .emit(CoreEvent::Download(DownloadEvent::Removed {
                task_id: task_id.to_string(),
            }))
            .ok();
        Ok(())
    }

    /// Drops all completed tasks. Returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let removed = {
            let mut tasks = self.tasks.lock().await;
            let before = tasks.len();
            tasks.retain(|t| t.status != DownloadStatus::Completed);
            before - tasks.len()
        };
        if removed > 0 {
            self.persist().await;
        }
        removed
    }

    /// Snapshot of the current task list.
    pub async fn tasks(&self) -> Vec<DownloadTask> {
        self.tasks.lock().await.clone()
    }

    pub async fn task(&self, task_id: &str) -> Result<DownloadTask> {
        self.tasks
            .lock()
            .await
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| DownloadError::TaskNotFound(task_id.to_string()))
    }

    /// Number of tasks currently pending, processing or transferring.
    pub async fn active_download_count(&self) -> usize {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.status.is_active())
            .count()
    }

    /// Downloads a song that was already resolved elsewhere, with no task
    /// entry and no progress events. Used by the background scheduler.
    ///
    /// Returns the stored song id.
    pub async fn fetch_and_store(&self, info: &SongInfo) -> Result<String> {
        self.wait_until_processed(&info.id, &info.id).await?;

        let audio = self.api.fetch_audio(&info.id, no_progress()).await?;
        self.media
            .save_audio(&info.id, audio.bytes, audio.mime)
            .await?;

        self.store_thumbnail(&info.id).await;

        let mut song = Song::new(&info.id, &info.title, &info.artist);
        song.thumbnail_url = info.thumbnail_url.clone();
        song.duration_secs = info.duration_secs;
        song.keywords = info.keywords.clone();
        self.library.save_song(&song).await?;

        info!(song_id = %info.id, "Background download stored");
        Ok(info.id.clone())
    }

    // ---- worker lifecycle ----

    fn spawn_worker(self: &Arc<Self>, task_id: &str) {
        let cancel = CancellationToken::new();
        let engine = Arc::clone(self);
        let id = task_id.to_string();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            match engine.run(&id, token).await {
                Ok(()) => {}
                Err(DownloadError::Cancelled) => {
                    debug!(task_id = %id, "Download worker cancelled");
                }
                Err(e) => engine.fail_task(&id, &e).await,
            }
            engine
                .workers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
        });

        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.to_string(), WorkerHandle { join, cancel });
    }

    fn stop_worker(&self, task_id: &str) {
        let handle = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(task_id);
        if let Some(handle) = handle {
            handle.cancel.cancel();
            handle.join.abort();
        }
    }

    async fn run(&self, task_id: &str, cancel: CancellationToken) -> Result<()> {
        self.set_status(task_id, DownloadStatus::Processing).await?;
        self.checkpoint(task_id, 0, Some(DownloadPhase::Processing))
            .await;
        let song_id = self.task(task_id).await?.song_id;
        self.wait_until_processed(task_id, &song_id).await?;
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        self.transfer(task_id, cancel).await
    }

    /// Polls the processing service until the song is ready, bounded by
    /// `max_poll_attempts`. Transport failures while polling are terminal;
    /// the task can be retried.
    async fn wait_until_processed(&self, task_id: &str, song_id: &str) -> Result<()> {
        for _ in 0..self.config.max_poll_attempts {
            let status = self.api.processing_status(song_id).await?;
            match status.status {
                RemoteStatus::Completed => return Ok(()),
                RemoteStatus::Failed => {
                    return Err(DownloadError::ProcessingFailed {
                        task_id: task_id.to_string(),
                        message: status
                            .message
                            .unwrap_or_else(|| "processing failed".to_string()),
                    });
                }
                RemoteStatus::Pending | RemoteStatus::Processing => {
                    self.emit_progress(task_id, 0, DownloadPhase::Processing);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
        Err(DownloadError::ProcessingTimeout {
            task_id: task_id.to_string(),
        })
    }

    /// Transfers the finished media and saves the song.
    ///
    /// Overall progress is split across phases: audio 0-70, thumbnail 70-90,
    /// metadata save 90-100. A thumbnail failure is logged and skipped; the
    /// metadata save gates completion.
    async fn transfer(&self, task_id: &str, cancel: CancellationToken) -> Result<()> {
        let task = self.task(task_id).await?;

        // Resume path re-enters here, so re-check readiness.
        let remote = self.api.processing_status(&task.song_id).await?;
        if remote.status != RemoteStatus::Completed {
            return Err(DownloadError::NotReady {
                task_id: task_id.to_string(),
            });
        }

        self.set_status(task_id, DownloadStatus::Downloading).await?;
        self.checkpoint(task_id, 0, Some(DownloadPhase::DownloadingAudio))
            .await;

        let events = self.events.clone();
        let progress_id = task_id.to_string();
        let progress: ProgressFn = Arc::new(move |done, total| {
            let percent = match total {
                Some(total) if total > 0 => ((done.saturating_mul(70)) / total).min(70) as u8,
                _ => 0,
            };
            events
                .emit(CoreEvent::Download(DownloadEvent::Progress {
                    task_id: progress_id.clone(),
                    percent,
                    phase: DownloadPhase::DownloadingAudio.as_str().to_string(),
                    bytes_downloaded: done,
                    bytes_total: total,
                }))
                .ok();
        });
        let audio = self.api.fetch_audio(&task.song_id, progress).await?;
        let audio_len = audio.bytes.len() as u64;

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        self.media
            .save_audio(&task.song_id, audio.bytes, audio.mime)
            .await?;
        {
            let mut tasks = self.tasks.lock().await;
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                task.bytes_downloaded = audio_len;
                task.bytes_total = Some(audio_len);
            }
        }
        self.checkpoint(task_id, 70, Some(DownloadPhase::DownloadingThumbnail))
            .await;
        self.emit_progress(task_id, 70, DownloadPhase::DownloadingThumbnail);

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        self.store_thumbnail(&task.song_id).await;
        self.checkpoint(task_id, 90, Some(DownloadPhase::Saving)).await;
        self.emit_progress(task_id, 90, DownloadPhase::Saving);

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let mut song = Song::new(&task.song_id, &task.title, &task.artist);
        song.thumbnail_url = task.thumbnail_url.clone();
        song.duration_secs = task.duration_secs;
        song.keywords = task.keywords.clone();
        self.library.save_song(&song).await?;

        self.set_status(task_id, DownloadStatus::Completed).await?;
        self.checkpoint(task_id, 100, None).await;
        self.emit_progress(task_id, 100, DownloadPhase::Saving);

        info!(task_id, song_id = %task.song_id, "Download completed");
        self.events
            .emit(CoreEvent::Download(DownloadEvent::Completed {
                task_id: task_id.to_string(),
                song_id: task.song_id.clone(),
            }))
            .ok();
        Ok(())
    }

    /// Fetches and stores the thumbnail, logging failures instead of
    /// propagating them. A song without artwork is still playable.
    async fn store_thumbnail(&self, song_id: &str) {
        match self.api.fetch_thumbnail(song_id).await {
            Ok(thumb) => {
                if let Err(e) = self
                    .media
                    .save_thumbnail(song_id, thumb.bytes, thumb.mime)
                    .await
                {
                    warn!(song_id, error = %e, "Thumbnail save failed, continuing");
                }
            }
            Err(e) => warn!(song_id, error = %e, "Thumbnail fetch failed, continuing"),
        }
    }

    async fn fail_task(&self, task_id: &str, e: &DownloadError) {
        {
            let mut tasks = self.tasks.lock().await;
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                if !task.status.is_terminal() {
                    task.status = DownloadStatus::Error;
                    task.phase = None;
                    task.error = Some(e.to_string());
                    task.updated_at = Utc::now().timestamp();
                }
            }
        }
        self.persist().await;

        error!(task_id, error = %e, "Download failed");
        self.events
            .emit(CoreEvent::Download(DownloadEvent::Failed {
                task_id: task_id.to_string(),
                message: e.to_string(),
                recoverable: e.recoverable(),
            }))
            .ok();
    }

    async fn set_status(&self, task_id: &str, to: DownloadStatus) -> Result<()> {
        {
            let mut tasks = self.tasks.lock().await;
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| DownloadError::TaskNotFound(task_id.to_string()))?;
            task.transition(to)?;
        }
        self.persist().await;
        self.events
            .emit(CoreEvent::Download(DownloadEvent::StatusChanged {
                task_id: task_id.to_string(),
                status: to.as_str().to_string(),
            }))
            .ok();
        Ok(())
    }

    /// Records a progress/phase checkpoint on the task and persists it.
    /// `None` clears the phase once the task is terminal.
    async fn checkpoint(&self, task_id: &str, percent: u8, phase: Option<DownloadPhase>) {
        {
            let mut tasks = self.tasks.lock().await;
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                task.progress = percent;
                task.phase = phase;
                task.updated_at = Utc::now().timestamp();
            }
        }
        self.persist().await;
    }

    fn emit_progress(&self, task_id: &str, percent: u8, phase: DownloadPhase) {
        self.events
            .emit(CoreEvent::Download(DownloadEvent::Progress {
                task_id: task_id.to_string(),
                percent,
                phase: phase.as_str().to_string(),
                bytes_downloaded: 0,
                bytes_total: None,
            }))
            .ok();
    }

    /// Writes the task list to storage. Persistence failures are logged and
    /// swallowed so a flaky store never kills the in-memory state.
    async fn persist(&self) {
        let snapshot = self.tasks.lock().await.clone();
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                self.store
                    .put(
                        Collection::Downloads,
                        TASK_LOG_KEY,
                        Bytes::from(bytes),
                        Some("application/json".to_string()),
                    )
                    .await;
            }
            Err(e) => warn!(error = %e, "Task log serialization failed"),
        }
    }
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
