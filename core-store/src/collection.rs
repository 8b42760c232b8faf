//! Named collections of the offline cache.
//!
//! Every store operation targets a collection from this closed set. Passing a
//! name outside the set is a programming error and fails fast instead of
//! silently creating a new bucket.

use crate::error::{Result, StoreError};

/// The collections the offline cache persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Song metadata records
    Songs,
    /// Playlist records
    Playlists,
    /// Search history entries
    SearchHistory,
    /// Downloaded audio payloads
    AudioFiles,
    /// Downloaded thumbnail payloads
    ThumbnailFiles,
    /// Download task log
    Downloads,
}

impl Collection {
    /// All collections, in schema creation order.
    pub const ALL: [Collection; 6] = [
        Collection::Songs,
        Collection::Playlists,
        Collection::SearchHistory,
        Collection::AudioFiles,
        Collection::ThumbnailFiles,
        Collection::Downloads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Songs => "songs",
            Collection::Playlists => "playlists",
            Collection::SearchHistory => "search_history",
            Collection::AudioFiles => "audio_files",
            Collection::ThumbnailFiles => "thumbnail_files",
            Collection::Downloads => "downloads",
        }
    }

    /// SQL table name backing the collection.
    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }

    /// Resolves a collection by name, rejecting unknown names.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "songs" => Ok(Collection::Songs),
            "playlists" => Ok(Collection::Playlists),
            "search_history" => Ok(Collection::SearchHistory),
            "audio_files" => Ok(Collection::AudioFiles),
            "thumbnail_files" => Ok(Collection::ThumbnailFiles),
            "downloads" => Ok(Collection::Downloads),
            other => Err(StoreError::UnknownCollection(other.to_string())),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.as_str()), Ok(collection));
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = Collection::from_name("lyrics").unwrap_err();
        assert_eq!(err, StoreError::UnknownCollection("lyrics".to_string()));
    }
}
