use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Unknown schedule entry: {0}")]
    NotFound(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Queue serialization failed: {0}")]
    Serialization(String),
}

impl From<bridge_traits::BridgeError> for SchedulerError {
    fn from(e: bridge_traits::BridgeError) -> Self {
        SchedulerError::Settings(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
