use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
