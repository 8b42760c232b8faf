use thiserror::Error;

/// Errors produced by object store operations.
///
/// `Clone` is required so that a single failed store-open future can hand the
/// same error to every caller that awaited it. Backend errors are therefore
/// carried as strings rather than wrapped source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Store operation timed out: {op}")]
    Timeout { op: String },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
