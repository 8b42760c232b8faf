//! # Core Configuration Module
//!
//! Provides configuration management for the offline cache core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary host bridges and settings for the core
//! library. It enforces fail-fast validation to ensure all required bridges
//! are provided before initialization.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Required for the song processing API and media transfer
//! - `SettingsStore` - Required for queue and settings persistence
//! - `NetworkMonitor` - Required for the background scheduler's network gates
//!
//! ## Optional Dependencies
//!
//! - `PowerMonitor` - Battery gate for scheduled downloads (skipped when absent)
//! - `Notifier` - User-facing notifications (silent when absent)
//! - `StorageEnvironment` - Durable storage negotiation (skipped when absent)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/path/to/data")
//!     .api_base_url("https://api.example.com")
//!     .http_client(Arc::new(MyHttpClient))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .network_monitor(Arc::new(MyNetworkMonitor))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable
//! error messages when capabilities are missing.

use crate::error::{Error, Result};
use bridge_traits::{
    HttpClient, NetworkMonitor, Notifier, PowerMonitor, SettingsStore, StorageEnvironment,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Core configuration for the offline cache core.
///
/// This struct holds all bridges and settings required to initialize the
/// core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding the embedded object store and media payloads
    pub data_dir: PathBuf,

    /// Base URL of the song processing service
    pub api_base_url: String,

    /// Timeout for object store writes
    pub write_timeout: Duration,

    /// Timeout for object store reads
    pub read_timeout: Duration,

    /// Interval between server-side processing status polls
    pub poll_interval: Duration,

    /// Maximum number of status polls before a task is abandoned
    pub max_poll_attempts: u32,

    /// Maximum concurrent downloads driven by the scheduler
    pub max_concurrent_downloads: usize,

    /// Interval between scheduler queue evaluations
    pub scheduler_tick_interval: Duration,

    /// Delay before a failed scheduled download is retried
    pub retry_delay: Duration,

    /// Battery floor (percent) below which scheduled downloads are held
    pub min_battery_percent: u8,

    /// Retries before a scheduled download fails permanently
    pub max_schedule_retries: u32,

    /// HTTP client for API requests and media transfer (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Key-value persistence for queue state and settings (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Connectivity detection for scheduler gates (required)
    pub network_monitor: Arc<dyn NetworkMonitor>,

    /// Battery state for scheduler gates (optional)
    pub power_monitor: Option<Arc<dyn PowerMonitor>>,

    /// User-facing notifications (optional)
    pub notifier: Option<Arc<dyn Notifier>>,

    /// Durable storage negotiation (optional)
    pub storage_env: Option<Arc<dyn StorageEnvironment>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("api_base_url", &self.api_base_url)
            .field("write_timeout", &self.write_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("scheduler_tick_interval", &self.scheduler_tick_interval)
            .field("retry_delay", &self.retry_delay)
            .field("min_battery_percent", &self.min_battery_percent)
            .field("max_schedule_retries", &self.max_schedule_retries)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("network_monitor", &"NetworkMonitor { ... }")
            .field(
                "power_monitor",
                &self.power_monitor.as_ref().map(|_| "PowerMonitor { ... }"),
            )
            .field(
                "notifier",
                &self.notifier.as_ref().map(|_| "Notifier { ... }"),
            )
            .field(
                "storage_env",
                &self
                    .storage_env
                    .as_ref()
                    .map(|_| "StorageEnvironment { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.api_base_url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "API base URL must be http(s): {}",
                self.api_base_url
            )));
        }

        if self.write_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(Error::Config(
                "Store timeouts must be greater than zero".to_string(),
            ));
        }

        if self.poll_interval.is_zero() || self.max_poll_attempts == 0 {
            return Err(Error::Config(
                "Poll interval and attempt cap must be greater than zero".to_string(),
            ));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "Max concurrent downloads must be at least 1".to_string(),
            ));
        }

        if self.scheduler_tick_interval.is_zero() {
            return Err(Error::Config(
                "Scheduler tick interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then call
/// [`build()`](CoreConfigBuilder::build) to create the final config. The
/// builder validates required dependencies and provides helpful error
/// messages.
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    api_base_url: Option<String>,
    write_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    max_poll_attempts: Option<u32>,
    max_concurrent_downloads: Option<usize>,
    scheduler_tick_interval: Option<Duration>,
    retry_delay: Option<Duration>,
    min_battery_percent: Option<u8>,
    max_schedule_retries: Option<u32>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    power_monitor: Option<Arc<dyn PowerMonitor>>,
    notifier: Option<Arc<dyn Notifier>>,
    storage_env: Option<Arc<dyn StorageEnvironment>>,
}

impl CoreConfigBuilder {
    /// Sets the data directory.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the base URL of the song processing service.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the object store write timeout.
    ///
    /// Default: 5 seconds
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Sets the object store read timeout.
    ///
    /// Default: 3 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the interval between processing status polls.
    ///
    /// Default: 2 seconds
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the maximum number of status polls per task.
    ///
    /// Default: 150 (five minutes at the default interval)
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    /// Sets the maximum concurrent scheduled downloads.
    ///
    /// Default: 3
    pub fn max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = Some(max);
        self
    }

    /// Sets the scheduler tick interval.
    ///
    /// Default: 10 seconds
    pub fn scheduler_tick_interval(mut self, interval: Duration) -> Self {
        self.scheduler_tick_interval = Some(interval);
        self
    }

    /// Sets the delay before a failed scheduled download is retried.
    ///
    /// Default: 30 seconds
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the battery floor for scheduled downloads.
    ///
    /// Default: 20 percent
    pub fn min_battery_percent(mut self, percent: u8) -> Self {
        self.min_battery_percent = Some(percent);
        self
    }

    /// Sets the retries before a scheduled download fails permanently.
    ///
    /// Default: 3
    pub fn max_schedule_retries(mut self, retries: u32) -> Self {
        self.max_schedule_retries = Some(retries);
        self
    }

    /// Sets the HTTP client implementation (required).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the settings store implementation (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the network monitor implementation (required).
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the power monitor implementation (optional).
    ///
    /// Without it the scheduler's battery gate is skipped.
    pub fn power_monitor(mut self, monitor: Arc<dyn PowerMonitor>) -> Self {
        self.power_monitor = Some(monitor);
        self
    }

    /// Sets the notifier implementation (optional).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the storage environment implementation (optional).
    ///
    /// Without it durable storage negotiation is skipped entirely.
    pub fn storage_env(mut self, env: Arc<dyn StorageEnvironment>) -> Self {
        self.storage_env = Some(env);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Required bridges are missing (HttpClient, SettingsStore, NetworkMonitor)
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let http_client = self.http_client.ok_or_else(|| {
            capability_missing(
                "HttpClient",
                "HttpClient implementation is required for the song processing API. \
                 Desktop: inject bridge_desktop::ReqwestHttpClient.",
            )
        })?;

        let settings_store = self.settings_store.ok_or_else(|| {
            capability_missing(
                "SettingsStore",
                "SettingsStore implementation is required for queue persistence. \
                 Desktop: inject bridge_desktop::SqliteSettingsStore.",
            )
        })?;

        let network_monitor = self.network_monitor.ok_or_else(|| {
            capability_missing(
                "NetworkMonitor",
                "NetworkMonitor implementation is required for scheduler network gates. \
                 Desktop: inject bridge_desktop::DesktopNetworkMonitor.",
            )
        })?;

        let config = CoreConfig {
            data_dir,
            api_base_url,
            write_timeout: self.write_timeout.unwrap_or(Duration::from_secs(5)),
            read_timeout: self.read_timeout.unwrap_or(Duration::from_secs(3)),
            poll_interval: self.poll_interval.unwrap_or(Duration::from_secs(2)),
            max_poll_attempts: self.max_poll_attempts.unwrap_or(150),
            max_concurrent_downloads: self.max_concurrent_downloads.unwrap_or(3),
            scheduler_tick_interval: self
                .scheduler_tick_interval
                .unwrap_or(Duration::from_secs(10)),
            retry_delay: self.retry_delay.unwrap_or(Duration::from_secs(30)),
            min_battery_percent: self.min_battery_percent.unwrap_or(20),
            max_schedule_retries: self.max_schedule_retries.unwrap_or(3),
            http_client,
            settings_store,
            network_monitor,
            power_monitor: self.power_monitor,
            notifier: self.notifier,
            storage_env: self.storage_env,
        };

        config.validate()?;

        Ok(config)
    }
}
