//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the offline cache core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be provided differently per platform (desktop,
//! mobile, embedded host).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and streaming
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//! - [`StorageEnvironment`](storage::StorageEnvironment) - Durable-storage grants and quota estimates
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered network detection
//! - [`PowerMonitor`](power::PowerMonitor) - Battery level and charging state
//! - [`Notifier`](notification::Notifier) - User-facing notifications
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Platform implementations should convert platform-specific errors to
//! `BridgeError` and provide actionable error messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod http;
pub mod network;
pub mod notification;
pub mod power;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy, StreamedResponse};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use notification::{Notification, NotificationKind, Notifier};
pub use power::{PowerInfo, PowerMonitor};
pub use storage::{SettingsStore, StorageEnvironment, StorageEstimate};
