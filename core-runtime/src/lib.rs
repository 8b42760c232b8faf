//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the offline cache core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the core runtime utilities that other modules depend on.
//! It establishes the logging conventions, bridge injection patterns, and event
//! broadcasting mechanisms used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{
    CoreEvent, DownloadEvent, EventBus, EventSeverity, LibraryEvent, ScheduleEvent, StorageEvent,
};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
