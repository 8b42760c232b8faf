//! Seam between library metadata and cached media payloads.
//!
//! The metadata store must purge a song's media when the song is deleted, but
//! media caching lives in a higher crate. This trait inverts that dependency:
//! the media cache implements it and is injected here.

use async_trait::async_trait;

/// Best-effort media payload operations keyed by song id.
///
/// All methods are fail-soft: implementations log their own failures. A
/// failed purge leaves an orphaned payload behind, which is storage waste
/// but never corruption.
#[async_trait]
pub trait SongBlobStore: Send + Sync {
    /// Whether an offline audio payload exists for the song.
    async fn has_audio(&self, song_id: &str) -> bool;

    /// Removes the song's audio and thumbnail payloads.
    async fn purge(&self, song_id: &str);

    /// Removes every cached payload.
    async fn purge_all(&self);
}
