use thiserror::Error;

/// Errors produced while assembling or validating the core configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required platform bridge was not injected. The message names the
    /// desktop implementation to use.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
