use crate::task::DownloadStatus;
use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Not a supported source URL: {0}")]
    InvalidSource(String),

    #[error("Source resolution failed: {0}")]
    RemoteResolution(String),

    /// Server-side processing has not finished; transfer cannot start yet.
    #[error("Media not ready for task: {task_id}")]
    NotReady { task_id: String },

    #[error("Transfer failed: {0}")]
    Transport(String),

    #[error("Server-side processing failed for task {task_id}: {message}")]
    ProcessingFailed { task_id: String, message: String },

    #[error("Server-side processing did not finish in time for task: {task_id}")]
    ProcessingTimeout { task_id: String },

    #[error("Download cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown download task: {0}")]
    TaskNotFound(String),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: DownloadStatus,
        to: DownloadStatus,
    },
}

impl DownloadError {
    /// Whether retrying the task may succeed without user intervention.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            DownloadError::RemoteResolution(_)
                | DownloadError::Transport(_)
                | DownloadError::ProcessingTimeout { .. }
                | DownloadError::Storage(_)
                | DownloadError::NotReady { .. }
        )
    }
}

impl From<StoreError> for DownloadError {
    fn from(e: StoreError) -> Self {
        DownloadError::Storage(e.to_string())
    }
}

impl From<core_media::MediaError> for DownloadError {
    fn from(e: core_media::MediaError) -> Self {
        DownloadError::Storage(e.to_string())
    }
}

impl From<core_library::LibraryError> for DownloadError {
    fn from(e: core_library::LibraryError) -> Self {
        DownloadError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
