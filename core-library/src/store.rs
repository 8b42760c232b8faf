//! The metadata store.
//!
//! Owns songs, playlists and search history on top of the object store.
//! Listings go through 30-second TTL caches that every mutation invalidates,
//! so readers in this process see their own writes immediately and readers in
//! other processes converge within the TTL.

use crate::blob::SongBlobStore;
use crate::cache::TtlCache;
use crate::error::{LibraryError, Result};
use crate::models::{LibraryStats, Playlist, SearchHistoryEntry, Song};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_store::{Collection, ObjectStore, SnapshotSource, StoreError, StoredRecord};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LISTING_TTL: Duration = Duration::from_secs(30);
const SEARCH_HISTORY_CAP: usize = 50;

pub struct MetadataStore {
    store: Arc<dyn ObjectStore>,
    events: EventBus,
    blobs: Option<Arc<dyn SongBlobStore>>,
    songs_cache: TtlCache<Vec<Song>>,
    playlists_cache: TtlCache<Vec<Playlist>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| LibraryError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(record: &StoredRecord) -> Result<T> {
    Ok(record.decode_json()?)
}

impl MetadataStore {
    pub fn new(store: Arc<dyn ObjectStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            blobs: None,
            songs_cache: TtlCache::new(LISTING_TTL),
            playlists_cache: TtlCache::new(LISTING_TTL),
        }
    }

    /// Attaches the media cache used for cascade deletes.
    pub fn with_blob_store(mut self, blobs: Arc<dyn SongBlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    // ---- songs ----

    /// Inserts or updates a song.
    pub async fn save_song(&self, song: &Song) -> Result<()> {
        if song.id.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "id",
                message: "song id cannot be empty".to_string(),
            });
        }
        if song.title.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "title",
                message: "song title cannot be empty".to_string(),
            });
        }

        let existed = self.store.try_contains(Collection::Songs, &song.id).await?;

        self.store
            .try_put(
                Collection::Songs,
                &song.id,
                encode(song)?,
                Some("application/json".to_string()),
            )
            .await?;
        self.songs_cache.invalidate();

        if existed {
            debug!(song_id = %song.id, "Song updated");
            self.events
                .emit(CoreEvent::Library(LibraryEvent::SongUpdated {
                    song_id: song.id.clone(),
                }))
                .ok();
        } else {
            info!(song_id = %song.id, title = %song.title, "Song added to library");
            self.events
                .emit(CoreEvent::Library(LibraryEvent::SongAdded {
                    song_id: song.id.clone(),
                    title: song.title.clone(),
                    artist: song.artist.clone(),
                }))
                .ok();
        }

        Ok(())
    }

    pub async fn get_song(&self, id: &str) -> Result<Option<Song>> {
        if let Some(songs) = self.songs_cache.get() {
            return Ok(songs.iter().find(|s| s.id == id).cloned());
        }

        match self.store.try_get(Collection::Songs, id).await? {
            Some(record) => Ok(Some(decode(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn all_songs(&self) -> Result<Vec<Song>> {
        if let Some(songs) = self.songs_cache.get() {
            return Ok(songs.as_ref().clone());
        }

        let records = self.store.try_get_all(Collection::Songs).await?;
        let mut songs = Vec::with_capacity(records.len());
        for record in &records {
            songs.push(decode::<Song>(record)?);
        }
        songs.sort_by(|a, b| b.added_at.cmp(&a.added_at));

        Ok(self.songs_cache.set(songs).as_ref().clone())
    }

    /// Deletes a song and cascades into media payloads and playlists.
    ///
    /// Blob purge and playlist repair are best-effort; only the metadata
    /// record delete gates success. A failed cascade leaves orphans that are
    /// invisible to the library, never dangling references to them.
    pub async fn delete_song(&self, id: &str) -> Result<()> {
        let song = self
            .get_song(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity: "Song",
                id: id.to_string(),
            })?;

        if let Some(blobs) = &self.blobs {
            blobs.purge(id).await;
        }

        match self.all_playlists().await {
            Ok(playlists) => {
                for playlist in playlists {
                    if playlist.song_ids.iter().any(|s| s == id) {
                        if let Err(e) = self.remove_song_from_playlist(&playlist.id, id).await {
                            warn!(playlist_id = %playlist.id, song_id = id, error = %e,
                                  "Playlist repair failed during song delete");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(song_id = id, error = %e, "Playlist scan failed during song delete")
            }
        }

        // History entries key on the song id, so this is a plain delete
        if !self.store.delete(Collection::SearchHistory, id).await {
            warn!(song_id = id, "Search history cleanup failed during song delete");
        }

        self.store.try_delete(Collection::Songs, id).await?;
        self.songs_cache.invalidate();

        info!(song_id = id, title = %song.title, "Song deleted");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::SongDeleted {
                song_id: id.to_string(),
            }))
            .ok();

        Ok(())
    }

    /// Flips the favorite flag, returning the new state.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let mut song = self
            .get_song(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity: "Song",
                id: id.to_string(),
            })?;

        song.is_favorite = !song.is_favorite;
        song.updated_at = Utc::now().timestamp();

        self.store
            .try_put(
                Collection::Songs,
                id,
                encode(&song)?,
                Some("application/json".to_string()),
            )
            .await?;
        self.songs_cache.invalidate();

        self.events
            .emit(CoreEvent::Library(LibraryEvent::FavoriteToggled {
                song_id: id.to_string(),
                is_favorite: song.is_favorite,
            }))
            .ok();

        Ok(song.is_favorite)
    }

    /// Records a playback without emitting an update event.
    pub async fn mark_played(&self, id: &str) -> Result<()> {
        let mut song = self
            .get_song(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity: "Song",
                id: id.to_string(),
            })?;

        song.last_played_at = Some(Utc::now().timestamp());

        self.store
            .try_put(
                Collection::Songs,
                id,
                encode(&song)?,
                Some("application/json".to_string()),
            )
            .await?;
        self.songs_cache.invalidate();
        Ok(())
    }

    /// Case-insensitive substring search over title, artist and keywords.
    pub async fn search(&self, query: &str) -> Result<Vec<Song>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .all_songs()
            .await?
            .into_iter()
            .filter(|s| s.matches(query))
            .collect())
    }

    pub async fn favorites(&self) -> Result<Vec<Song>> {
        Ok(self
            .all_songs()
            .await?
            .into_iter()
            .filter(|s| s.is_favorite)
            .collect())
    }

    /// The newest additions, up to `limit`.
    pub async fn recently_added(&self, limit: usize) -> Result<Vec<Song>> {
        let mut songs = self.all_songs().await?;
        songs.truncate(limit);
        Ok(songs)
    }

    /// Whether the song's audio payload is cached. Always false without an
    /// attached blob store.
    pub async fn is_downloaded(&self, id: &str) -> bool {
        match &self.blobs {
            Some(blobs) => blobs.has_audio(id).await,
            None => false,
        }
    }

    /// Songs whose audio payload is cached, derived by blob existence.
    pub async fn downloaded_songs(&self) -> Result<Vec<Song>> {
        let blobs = match &self.blobs {
            Some(blobs) => blobs,
            None => return Ok(Vec::new()),
        };

        let mut downloaded = Vec::new();
        for song in self.all_songs().await? {
            if blobs.has_audio(&song.id).await {
                downloaded.push(song);
            }
        }
        Ok(downloaded)
    }

    // ---- playlists ----

    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        if name.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "name",
                message: "playlist name cannot be empty".to_string(),
            });
        }

        let playlist = Playlist::new(name.trim());
        self.write_playlist(&playlist).await?;

        info!(playlist_id = %playlist.id, name = %playlist.name, "Playlist created");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistCreated {
                playlist_id: playlist.id.clone(),
                name: playlist.name.clone(),
            }))
            .ok();

        Ok(playlist)
    }

    pub async fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        if let Some(playlists) = self.playlists_cache.get() {
            return Ok(playlists.iter().find(|p| p.id == id).cloned());
        }

        match self.store.try_get(Collection::Playlists, id).await? {
            Some(record) => Ok(Some(decode(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn all_playlists(&self) -> Result<Vec<Playlist>> {
        if let Some(playlists) = self.playlists_cache.get() {
            return Ok(playlists.as_ref().clone());
        }

        let records = self.store.try_get_all(Collection::Playlists).await?;
        let mut playlists = Vec::with_capacity(records.len());
        for record in &records {
            playlists.push(decode::<Playlist>(record)?);
        }
        playlists.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(self.playlists_cache.set(playlists).as_ref().clone())
    }

    pub async fn rename_playlist(&self, id: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "name",
                message: "playlist name cannot be empty".to_string(),
            });
        }

        let mut playlist = self.require_playlist(id).await?;
        playlist.name = name.trim().to_string();
        playlist.updated_at = Utc::now().timestamp();
        self.write_playlist(&playlist).await?;

        self.emit_playlist_updated(id, "renamed");
        Ok(())
    }

    /// Appends a song to a playlist. Adding a song twice is a no-op.
    pub async fn add_song_to_playlist(&self, playlist_id: &str, song_id: &str) -> Result<()> {
        if self.get_song(song_id).await?.is_none() {
            return Err(LibraryError::NotFound {
                entity: "Song",
                id: song_id.to_string(),
            });
        }

        let mut playlist = self.require_playlist(playlist_id).await?;
        if playlist.song_ids.iter().any(|s| s == song_id) {
            return Ok(());
        }

        playlist.song_ids.push(song_id.to_string());
        playlist.updated_at = Utc::now().timestamp();
        self.write_playlist(&playlist).await?;

        self.emit_playlist_updated(playlist_id, "song_added");
        Ok(())
    }

    pub async fn remove_song_from_playlist(&self, playlist_id: &str, song_id: &str) -> Result<()> {
        let mut playlist = self.require_playlist(playlist_id).await?;
        let before = playlist.song_ids.len();
        playlist.song_ids.retain(|s| s != song_id);

        if playlist.song_ids.len() == before {
            return Ok(());
        }

        playlist.updated_at = Utc::now().timestamp();
        self.write_playlist(&playlist).await?;

        self.emit_playlist_updated(playlist_id, "song_removed");
        Ok(())
    }

    pub async fn delete_playlist(&self, id: &str) -> Result<()> {
        self.require_playlist(id).await?;

        self.store.try_delete(Collection::Playlists, id).await?;
        self.playlists_cache.invalidate();

        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistDeleted {
                playlist_id: id.to_string(),
            }))
            .ok();
        Ok(())
    }

    async fn require_playlist(&self, id: &str) -> Result<Playlist> {
        self.get_playlist(id)
            .await?
            .ok_or_else(|| LibraryError::NotFound {
                entity: "Playlist",
                id: id.to_string(),
            })
    }

    async fn write_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.store
            .try_put(
                Collection::Playlists,
                &playlist.id,
                encode(playlist)?,
                Some("application/json".to_string()),
            )
            .await?;
        self.playlists_cache.invalidate();
        Ok(())
    }

    fn emit_playlist_updated(&self, playlist_id: &str, change: &str) {
        self.events
            .emit(CoreEvent::Library(LibraryEvent::PlaylistUpdated {
                playlist_id: playlist_id.to_string(),
                change: change.to_string(),
            }))
            .ok();
    }

    // ---- search history ----

    /// Remembers a song the user picked from search results. Picking the
    /// same song again refreshes its timestamp; the history is capped,
    /// evicting the oldest entries.
    pub async fn record_searched_song(&self, song: &Song) -> Result<()> {
        if song.id.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "id",
                message: "song id cannot be empty".to_string(),
            });
        }

        let entry = SearchHistoryEntry::from_song(song);
        self.store
            .try_put(
                Collection::SearchHistory,
                &entry.song_id,
                encode(&entry)?,
                Some("application/json".to_string()),
            )
            .await?;

        let mut entries = self.search_history().await?;
        if entries.len() > SEARCH_HISTORY_CAP {
            entries.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
            for stale in &entries[SEARCH_HISTORY_CAP..] {
                self.store
                    .try_delete(Collection::SearchHistory, &stale.song_id)
                    .await?;
            }
        }

        Ok(())
    }

    /// History entries, most recent first.
    pub async fn search_history(&self) -> Result<Vec<SearchHistoryEntry>> {
        let records = self.store.try_get_all(Collection::SearchHistory).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in &records {
            entries.push(decode::<SearchHistoryEntry>(record)?);
        }
        entries.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
        Ok(entries)
    }

    pub async fn clear_search_history(&self) -> Result<()> {
        self.store.try_clear(Collection::SearchHistory).await?;
        self.events
            .emit(CoreEvent::Library(LibraryEvent::SearchHistoryCleared))
            .ok();
        Ok(())
    }

    // ---- maintenance ----

    pub async fn stats(&self) -> Result<LibraryStats> {
        let songs = self.all_songs().await?;

        let mut downloaded_count = 0;
        if let Some(blobs) = &self.blobs {
            for song in &songs {
                if blobs.has_audio(&song.id).await {
                    downloaded_count += 1;
                }
            }
        }

        Ok(LibraryStats {
            song_count: songs.len() as u64,
            downloaded_count,
            favorite_count: songs.iter().filter(|s| s.is_favorite).count() as u64,
            playlist_count: self.store.count(Collection::Playlists).await?,
            search_history_count: self.store.count(Collection::SearchHistory).await?,
        })
    }

    /// Wipes all metadata and cached media.
    pub async fn clear_all_data(&self) -> Result<()> {
        if let Some(blobs) = &self.blobs {
            blobs.purge_all().await;
        }

        self.store.try_clear(Collection::Songs).await?;
        self.store.try_clear(Collection::Playlists).await?;
        self.store.try_clear(Collection::SearchHistory).await?;

        self.songs_cache.invalidate();
        self.playlists_cache.invalidate();

        info!("Library cleared");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::LibraryCleared))
            .ok();
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    songs: Vec<Song>,
    playlists: Vec<Playlist>,
}

#[async_trait]
impl SnapshotSource for MetadataStore {
    async fn snapshot(&self) -> core_store::Result<String> {
        let songs = self
            .all_songs()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let playlists = self
            .all_playlists()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        serde_json::to_string(&Snapshot { songs, playlists })
            .map_err(|e| StoreError::Corrupt(format!("Snapshot encode failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::EmbeddedObjectStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBlobStore {
        cached: Mutex<Vec<String>>,
        purged: Mutex<Vec<String>>,
        purged_all: Mutex<bool>,
    }

    #[async_trait]
    impl SongBlobStore for RecordingBlobStore {
        async fn has_audio(&self, song_id: &str) -> bool {
            self.cached.lock().unwrap().iter().any(|s| s == song_id)
        }

        async fn purge(&self, song_id: &str) {
            self.purged.lock().unwrap().push(song_id.to_string());
        }

        async fn purge_all(&self) {
            *self.purged_all.lock().unwrap() = true;
        }
    }

    async fn store_with_blobs() -> (MetadataStore, Arc<RecordingBlobStore>) {
        let object_store = Arc::new(EmbeddedObjectStore::in_memory().await.unwrap());
        let blobs = Arc::new(RecordingBlobStore::default());
        let store = MetadataStore::new(object_store, EventBus::default())
            .with_blob_store(blobs.clone());
        (store, blobs)
    }

    #[tokio::test]
    async fn test_save_and_get_song() {
        let (store, _) = store_with_blobs().await;

        let song = Song::new("s1", "Title", "Artist");
        store.save_song(&song).await.unwrap();

        let loaded = store.get_song("s1").await.unwrap().unwrap();
        assert_eq!(loaded, song);
        assert_eq!(store.all_songs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_empty_fields() {
        let (store, _) = store_with_blobs().await;

        assert!(store.save_song(&Song::new("", "T", "A")).await.is_err());
        assert!(store.save_song(&Song::new("id", " ", "A")).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_song_cascades() {
        let (store, blobs) = store_with_blobs().await;

        store.save_song(&Song::new("s1", "T", "A")).await.unwrap();
        let playlist = store.create_playlist("Mix").await.unwrap();
        store
            .add_song_to_playlist(&playlist.id, "s1")
            .await
            .unwrap();

        store.delete_song("s1").await.unwrap();

        assert!(store.get_song("s1").await.unwrap().is_none());
        assert_eq!(blobs.purged.lock().unwrap().as_slice(), ["s1"]);
        let playlist = store.get_playlist(&playlist.id).await.unwrap().unwrap();
        assert!(playlist.song_ids.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_song_is_not_found() {
        let (store, _) = store_with_blobs().await;
        assert!(matches!(
            store.delete_song("ghost").await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let (store, _) = store_with_blobs().await;
        store.save_song(&Song::new("s1", "T", "A")).await.unwrap();

        assert!(store.toggle_favorite("s1").await.unwrap());
        assert!(!store.toggle_favorite("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_matches_title_artist_keywords() {
        let (store, _) = store_with_blobs().await;

        let mut a = Song::new("a", "Midnight City", "M83");
        a.keywords = vec!["synthwave".to_string()];
        let b = Song::new("b", "Take Five", "Dave Brubeck");
        store.save_song(&a).await.unwrap();
        store.save_song(&b).await.unwrap();

        let hits = store.search("synthwave").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        assert!(store.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_playlist_membership_is_deduplicated() {
        let (store, _) = store_with_blobs().await;

        store.save_song(&Song::new("s1", "T", "A")).await.unwrap();
        let playlist = store.create_playlist("Mix").await.unwrap();

        store
            .add_song_to_playlist(&playlist.id, "s1")
            .await
            .unwrap();
        store
            .add_song_to_playlist(&playlist.id, "s1")
            .await
            .unwrap();

        let playlist = store.get_playlist(&playlist.id).await.unwrap().unwrap();
        assert_eq!(playlist.song_ids, vec!["s1"]);
    }

    #[tokio::test]
    async fn test_add_unknown_song_to_playlist_fails() {
        let (store, _) = store_with_blobs().await;
        let playlist = store.create_playlist("Mix").await.unwrap();

        assert!(matches!(
            store.add_song_to_playlist(&playlist.id, "ghost").await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_history_dedupes_on_song_id() {
        let (store, _) = store_with_blobs().await;

        let a = Song::new("a", "Midnight City", "M83");
        let b = Song::new("b", "Take Five", "Dave Brubeck");
        store.record_searched_song(&a).await.unwrap();
        store.record_searched_song(&b).await.unwrap();
        store.record_searched_song(&a).await.unwrap();

        let history = store.search_history().await.unwrap();
        // Picking the same song again refreshed the entry in place
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_song_removes_history_entries() {
        let (store, _) = store_with_blobs().await;

        let song = Song::new("s1", "T", "A");
        store.save_song(&song).await.unwrap();
        store.record_searched_song(&song).await.unwrap();

        store.delete_song("s1").await.unwrap();

        assert!(store.search_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_downloaded_songs_derived_from_blobs() {
        let (store, blobs) = store_with_blobs().await;

        store.save_song(&Song::new("s1", "T", "A")).await.unwrap();
        store.save_song(&Song::new("s2", "T2", "A")).await.unwrap();
        blobs.cached.lock().unwrap().push("s1".to_string());

        assert!(store.is_downloaded("s1").await);
        assert!(!store.is_downloaded("s2").await);

        let downloaded = store.downloaded_songs().await.unwrap();
        assert_eq!(downloaded.len(), 1);
        assert_eq!(downloaded[0].id, "s1");

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.downloaded_count, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _) = store_with_blobs().await;

        store.save_song(&Song::new("s1", "T", "A")).await.unwrap();
        store.save_song(&Song::new("s2", "T2", "A")).await.unwrap();
        store.toggle_favorite("s1").await.unwrap();
        store.create_playlist("Mix").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.song_count, 2);
        assert_eq!(stats.favorite_count, 1);
        assert_eq!(stats.playlist_count, 1);
    }

    #[tokio::test]
    async fn test_clear_all_data() {
        let (store, blobs) = store_with_blobs().await;

        let song = Song::new("s1", "T", "A");
        store.save_song(&song).await.unwrap();
        store.create_playlist("Mix").await.unwrap();
        store.record_searched_song(&song).await.unwrap();

        store.clear_all_data().await.unwrap();

        assert!(store.all_songs().await.unwrap().is_empty());
        assert!(store.all_playlists().await.unwrap().is_empty());
        assert!(store.search_history().await.unwrap().is_empty());
        assert!(*blobs.purged_all.lock().unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_contains_songs() {
        let (store, _) = store_with_blobs().await;
        store.save_song(&Song::new("s1", "T", "A")).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.contains("\"s1\""));
    }
}
