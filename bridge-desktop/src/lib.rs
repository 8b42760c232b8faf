//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of all bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest` with retry and streamed downloads
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `NetworkMonitor` using a TCP connectivity probe
//! - `PowerMonitor` as a no-report stub (desktops are mains-powered)
//! - `Notifier` mirroring notifications into the log stream
//! - `StorageEnvironment` over the local filesystem
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let settings = SqliteSettingsStore::new("/data/settings.db".into()).await?;
//!     // Inject into the core configuration
//! }
//! ```

mod http;
mod network;
mod notification;
mod power;
mod settings;
mod storage_env;

pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use notification::LogNotifier;
pub use power::DesktopPowerMonitor;
pub use settings::SqliteSettingsStore;
pub use storage_env::DesktopStorageEnvironment;
