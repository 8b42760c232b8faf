use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    /// The song has neither an offline payload nor a remote fallback.
    #[error("No playable media for song: {song_id}")]
    NotFound { song_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MediaError>;
