//! Domain models for the offline music library.
//!
//! Records are persisted as JSON in the object store, so every model carries
//! serde derives with camelCase field names matching the stored payloads.
//! Fields added later use serde defaults so old records keep decoding.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cached song with its library metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Stable identifier assigned by the processing service
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Duration in whole seconds, when known
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Remote audio URL used as a streaming fallback
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Remote thumbnail URL used as a display fallback
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    /// Unix seconds when the song entered the library
    pub added_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub last_played_at: Option<i64>,
}

impl Song {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_secs: None,
            audio_url: None,
            thumbnail_url: None,
            keywords: Vec::new(),
            is_favorite: false,
            added_at: now,
            updated_at: now,
            last_played_at: None,
        }
    }

    /// Duration as "m:ss", or "--:--" when unknown.
    pub fn duration_formatted(&self) -> String {
        match self.duration_secs {
            Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
            None => "--:--".to_string(),
        }
    }

    /// Case-insensitive match against title, artist and keywords.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.title.to_lowercase().contains(&q)
            || self.artist.to_lowercase().contains(&q)
            || self
                .keywords
                .iter()
                .any(|k| k.to_lowercase().contains(&q))
    }
}

/// An ordered list of songs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Song ids in playback order. May reference songs that were deleted;
    /// membership is repaired on song deletion, best-effort.
    #[serde(default)]
    pub song_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            song_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A song the user picked from search results. Referenced entries are
/// removed when the song itself is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub song_id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub searched_at: i64,
}

impl SearchHistoryEntry {
    pub fn from_song(song: &Song) -> Self {
        Self {
            song_id: song.id.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            thumbnail_url: song.thumbnail_url.clone(),
            searched_at: Utc::now().timestamp(),
        }
    }
}

/// Aggregate counts over the library. Downloaded-ness is derived from blob
/// existence, so `downloaded_count <= song_count`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub song_count: u64,
    pub downloaded_count: u64,
    pub playlist_count: u64,
    pub favorite_count: u64,
    pub search_history_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatting() {
        let mut song = Song::new("id", "Title", "Artist");
        assert_eq!(song.duration_formatted(), "--:--");

        song.duration_secs = Some(245);
        assert_eq!(song.duration_formatted(), "4:05");

        song.duration_secs = Some(59);
        assert_eq!(song.duration_formatted(), "0:59");
    }

    #[test]
    fn test_search_matching() {
        let mut song = Song::new("id", "Midnight City", "M83");
        song.keywords = vec!["synthwave".to_string()];

        assert!(song.matches("midnight"));
        assert!(song.matches("m83"));
        assert!(song.matches("SYNTH"));
        assert!(!song.matches("jazz"));
    }

    #[test]
    fn test_old_records_decode_with_defaults() {
        // A record written before keywords/favorites existed
        let json = r#"{"id":"s1","title":"T","addedAt":1,"updatedAt":1}"#;
        let song: Song = serde_json::from_str(json).unwrap();
        assert!(song.keywords.is_empty());
        assert!(!song.is_favorite);
        assert_eq!(song.artist, "");
    }
}
