//! The media blob cache.
//!
//! Stores audio and thumbnail payloads in the object store and hands out
//! [`MediaHandle`]s to loaded payloads. Reads distinguish "absent" from
//! "broken": an absent payload is `Ok(None)` so callers can fall back to the
//! remote URL, while a storage failure propagates so callers do not
//! misclassify a broken cache as an empty one.

use crate::error::{MediaError, Result};
use crate::handle::MediaHandle;
use async_trait::async_trait;
use bytes::Bytes;
use core_library::{Song, SongBlobStore};
use core_store::{Collection, ObjectStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";
const DEFAULT_THUMBNAIL_MIME: &str = "image/jpeg";

/// How a song should be played right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableRef {
    /// Cached payload, playable offline
    Offline(Arc<MediaHandle>),
    /// Remote streaming URL fallback
    Remote(String),
}

/// How a song's artwork should be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailRef {
    Offline(Arc<MediaHandle>),
    Remote(String),
}

/// Cumulative payload sizes held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaUsage {
    pub audio_bytes: u64,
    pub thumbnail_bytes: u64,
    pub audio_count: u64,
    pub thumbnail_count: u64,
}

impl MediaUsage {
    pub fn total_bytes(&self) -> u64 {
        self.audio_bytes + self.thumbnail_bytes
    }
}

pub struct MediaBlobCache {
    store: Arc<dyn ObjectStore>,
    audio_handles: Mutex<HashMap<String, Arc<MediaHandle>>>,
    thumbnail_handles: Mutex<HashMap<String, Arc<MediaHandle>>>,
}

impl MediaBlobCache {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            audio_handles: Mutex::new(HashMap::new()),
            thumbnail_handles: Mutex::new(HashMap::new()),
        }
    }

    // ---- audio ----

    /// Persists an audio payload and returns a handle to it.
    ///
    /// An existing payload is overwritten; any previously issued handle keeps
    /// its old payload until dropped.
    pub async fn save_audio(
        &self,
        song_id: &str,
        payload: Bytes,
        mime: Option<String>,
    ) -> Result<Arc<MediaHandle>> {
        let mime = mime.unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string());

        self.store
            .try_put(
                Collection::AudioFiles,
                song_id,
                payload.clone(),
                Some(mime.clone()),
            )
            .await?;

        let handle = Arc::new(MediaHandle::new("audio", song_id, mime, payload));
        self.cache_handle(&self.audio_handles, song_id, &handle);

        info!(song_id = song_id, bytes = handle.len(), "Audio payload cached");
        Ok(handle)
    }

    /// Loads the audio payload. `Ok(None)` means nothing is cached for the
    /// song; errors mean the cache could not be read.
    pub async fn get_audio(&self, song_id: &str) -> Result<Option<Arc<MediaHandle>>> {
        if let Some(handle) = self.cached_handle(&self.audio_handles, song_id) {
            return Ok(Some(handle));
        }

        match self.store.try_get(Collection::AudioFiles, song_id).await? {
            Some(record) => {
                let mime = record
                    .mime
                    .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string());
                let handle = Arc::new(MediaHandle::new("audio", song_id, mime, record.value));
                self.cache_handle(&self.audio_handles, song_id, &handle);
                Ok(Some(handle))
            }
            None => Ok(None),
        }
    }

    pub async fn delete_audio(&self, song_id: &str) -> Result<()> {
        self.store
            .try_delete(Collection::AudioFiles, song_id)
            .await?;
        self.drop_handle(&self.audio_handles, song_id);
        Ok(())
    }

    // ---- thumbnails ----

    pub async fn save_thumbnail(
        &self,
        song_id: &str,
        payload: Bytes,
        mime: Option<String>,
    ) -> Result<Arc<MediaHandle>> {
        let mime = mime.unwrap_or_else(|| DEFAULT_THUMBNAIL_MIME.to_string());

        self.store
            .try_put(
                Collection::ThumbnailFiles,
                song_id,
                payload.clone(),
                Some(mime.clone()),
            )
            .await?;

        let handle = Arc::new(MediaHandle::new("thumb", song_id, mime, payload));
        self.cache_handle(&self.thumbnail_handles, song_id, &handle);
        Ok(handle)
    }

    pub async fn get_thumbnail(&self, song_id: &str) -> Result<Option<Arc<MediaHandle>>> {
        if let Some(handle) = self.cached_handle(&self.thumbnail_handles, song_id) {
            return Ok(Some(handle));
        }

        match self
            .store
            .try_get(Collection::ThumbnailFiles, song_id)
            .await?
        {
            Some(record) => {
                let mime = record
                    .mime
                    .unwrap_or_else(|| DEFAULT_THUMBNAIL_MIME.to_string());
                let handle = Arc::new(MediaHandle::new("thumb", song_id, mime, record.value));
                self.cache_handle(&self.thumbnail_handles, song_id, &handle);
                Ok(Some(handle))
            }
            None => Ok(None),
        }
    }

    pub async fn delete_thumbnail(&self, song_id: &str) -> Result<()> {
        self.store
            .try_delete(Collection::ThumbnailFiles, song_id)
            .await?;
        self.drop_handle(&self.thumbnail_handles, song_id);
        Ok(())
    }

    // ---- resolution ----

    /// Resolves how to play a song: offline payload first, remote URL second.
    ///
    /// Storage failures propagate rather than silently degrading to the
    /// remote URL, so an unreadable cache is visible to the caller.
    pub async fn resolve_playable_reference(&self, song: &Song) -> Result<PlayableRef> {
        if let Some(handle) = self.get_audio(&song.id).await? {
            return Ok(PlayableRef::Offline(handle));
        }

        if let Some(url) = &song.audio_url {
            debug!(song_id = %song.id, "Falling back to remote audio");
            return Ok(PlayableRef::Remote(url.clone()));
        }

        Err(MediaError::NotFound {
            song_id: song.id.clone(),
        })
    }

    /// Resolves a song's artwork. Unlike audio, having none is normal.
    pub async fn resolve_thumbnail_reference(&self, song: &Song) -> Result<Option<ThumbnailRef>> {
        if let Some(handle) = self.get_thumbnail(&song.id).await? {
            return Ok(Some(ThumbnailRef::Offline(handle)));
        }

        Ok(song.thumbnail_url.clone().map(ThumbnailRef::Remote))
    }

    // ---- handle management ----

    /// Drops the cached handles for a song without touching storage.
    pub fn clear_handle(&self, song_id: &str) {
        self.drop_handle(&self.audio_handles, song_id);
        self.drop_handle(&self.thumbnail_handles, song_id);
    }

    /// Drops every cached handle without touching storage.
    pub fn clear_handles(&self) {
        self.audio_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.thumbnail_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Whether any offline payload (audio or thumbnail) exists for a song.
    pub async fn has_offline_files(&self, song_id: &str) -> Result<bool> {
        if self.store.try_contains(Collection::AudioFiles, song_id).await? {
            return Ok(true);
        }
        Ok(self
            .store
            .try_contains(Collection::ThumbnailFiles, song_id)
            .await?)
    }

    pub async fn storage_usage(&self) -> Result<MediaUsage> {
        Ok(MediaUsage {
            audio_bytes: self.store.payload_size(Collection::AudioFiles).await?,
            thumbnail_bytes: self.store.payload_size(Collection::ThumbnailFiles).await?,
            audio_count: self.store.count(Collection::AudioFiles).await?,
            thumbnail_count: self.store.count(Collection::ThumbnailFiles).await?,
        })
    }

    fn cached_handle(
        &self,
        map: &Mutex<HashMap<String, Arc<MediaHandle>>>,
        song_id: &str,
    ) -> Option<Arc<MediaHandle>> {
        map.lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(song_id)
            .cloned()
    }

    fn cache_handle(
        &self,
        map: &Mutex<HashMap<String, Arc<MediaHandle>>>,
        song_id: &str,
        handle: &Arc<MediaHandle>,
    ) {
        map.lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(song_id.to_string(), Arc::clone(handle));
    }

    fn drop_handle(&self, map: &Mutex<HashMap<String, Arc<MediaHandle>>>, song_id: &str) {
        map.lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(song_id);
    }
}

#[async_trait]
impl SongBlobStore for MediaBlobCache {
    async fn has_audio(&self, song_id: &str) -> bool {
        self.store
            .try_contains(Collection::AudioFiles, song_id)
            .await
            .unwrap_or(false)
    }

    async fn purge(&self, song_id: &str) {
        if let Err(e) = self.delete_audio(song_id).await {
            warn!(song_id = song_id, error = %e, "Audio purge failed");
        }
        if let Err(e) = self.delete_thumbnail(song_id).await {
            warn!(song_id = song_id, error = %e, "Thumbnail purge failed");
        }
    }

    async fn purge_all(&self) {
        if let Err(e) = self.store.try_clear(Collection::AudioFiles).await {
            warn!(error = %e, "Audio purge-all failed");
        }
        if let Err(e) = self.store.try_clear(Collection::ThumbnailFiles).await {
            warn!(error = %e, "Thumbnail purge-all failed");
        }
        self.clear_handles();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::EmbeddedObjectStore;

    async fn cache() -> MediaBlobCache {
        let store = Arc::new(EmbeddedObjectStore::in_memory().await.unwrap());
        MediaBlobCache::new(store)
    }

    #[tokio::test]
    async fn test_save_and_get_audio() {
        let cache = cache().await;

        let saved = cache
            .save_audio("s1", Bytes::from_static(b"audio"), None)
            .await
            .unwrap();
        assert_eq!(saved.mime, "audio/mpeg");

        let loaded = cache.get_audio("s1").await.unwrap().unwrap();
        assert_eq!(loaded.payload, Bytes::from_static(b"audio"));
        // The in-process handle is reused, not re-minted
        assert_eq!(loaded.locator, saved.locator);
    }

    #[tokio::test]
    async fn test_absent_audio_is_none() {
        let cache = cache().await;
        assert!(cache.get_audio("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_mints_new_handle() {
        let cache = cache().await;

        let first = cache
            .save_audio("s1", Bytes::from_static(b"v1"), None)
            .await
            .unwrap();
        let second = cache
            .save_audio("s1", Bytes::from_static(b"v2"), None)
            .await
            .unwrap();

        assert_ne!(first.locator, second.locator);
        // The old handle still holds its original payload
        assert_eq!(first.payload, Bytes::from_static(b"v1"));
        assert_eq!(
            cache.get_audio("s1").await.unwrap().unwrap().payload,
            Bytes::from_static(b"v2")
        );
    }

    #[tokio::test]
    async fn test_clear_handle_reloads_from_storage() {
        let cache = cache().await;

        let first = cache
            .save_audio("s1", Bytes::from_static(b"v"), None)
            .await
            .unwrap();
        cache.clear_handle("s1");

        let reloaded = cache.get_audio("s1").await.unwrap().unwrap();
        assert_ne!(reloaded.locator, first.locator);
        assert_eq!(reloaded.payload, first.payload);
    }

    #[tokio::test]
    async fn test_resolve_prefers_offline() {
        let cache = cache().await;

        let mut song = Song::new("s1", "T", "A");
        song.audio_url = Some("https://cdn.example.com/s1.mp3".to_string());

        cache
            .save_audio("s1", Bytes::from_static(b"v"), None)
            .await
            .unwrap();

        match cache.resolve_playable_reference(&song).await.unwrap() {
            PlayableRef::Offline(handle) => assert_eq!(handle.song_id, "s1"),
            other => panic!("expected offline ref, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_remote() {
        let cache = cache().await;

        let mut song = Song::new("s1", "T", "A");
        song.audio_url = Some("https://cdn.example.com/s1.mp3".to_string());

        match cache.resolve_playable_reference(&song).await.unwrap() {
            PlayableRef::Remote(url) => assert_eq!(url, "https://cdn.example.com/s1.mp3"),
            other => panic!("expected remote ref, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_with_nothing_is_not_found() {
        let cache = cache().await;
        let song = Song::new("s1", "T", "A");

        assert!(matches!(
            cache.resolve_playable_reference(&song).await,
            Err(MediaError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_thumbnail_is_fine() {
        let cache = cache().await;
        let song = Song::new("s1", "T", "A");
        assert_eq!(cache.resolve_thumbnail_reference(&song).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_removes_both_payloads() {
        let cache = cache().await;

        cache
            .save_audio("s1", Bytes::from_static(b"a"), None)
            .await
            .unwrap();
        cache
            .save_thumbnail("s1", Bytes::from_static(b"t"), None)
            .await
            .unwrap();

        assert!(cache.has_offline_files("s1").await.unwrap());

        cache.purge("s1").await;

        assert!(!cache.has_audio("s1").await);
        assert!(!cache.has_offline_files("s1").await.unwrap());
        assert!(cache.get_thumbnail("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_usage() {
        let cache = cache().await;

        cache
            .save_audio("s1", Bytes::from(vec![0u8; 100]), None)
            .await
            .unwrap();
        cache
            .save_thumbnail("s1", Bytes::from(vec![0u8; 10]), None)
            .await
            .unwrap();

        let usage = cache.storage_usage().await.unwrap();
        assert_eq!(usage.audio_bytes, 100);
        assert_eq!(usage.thumbnail_bytes, 10);
        assert_eq!(usage.audio_count, 1);
        assert_eq!(usage.total_bytes(), 110);
    }
}
