//! Storage Abstractions
//!
//! Key-value settings storage and the durable-storage environment the host
//! grants (or refuses) to the application.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences/settings storage:
/// - Desktop: SQLite or config files
/// - Mobile: UserDefaults / SharedPreferences
///
/// Values are small: preferences, markers, and JSON snapshots. Bulk payloads
/// belong in the object store, not here.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;
}

/// Host storage quota estimate.
///
/// Either field may be absent when the platform does not report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageEstimate {
    pub quota_bytes: Option<u64>,
    pub usage_bytes: Option<u64>,
}

/// Durable-storage environment trait
///
/// Models the host's say over whether stored data survives storage pressure.
/// Browsers expose an explicit persistence grant; desktop hosts normally
/// grant it implicitly.
#[async_trait]
pub trait StorageEnvironment: Send + Sync {
    /// Ask the host to mark the application's storage as durable.
    ///
    /// Returns whether the grant was given. A denial is a real answer, not an
    /// error; callers must handle it rather than assume success.
    async fn request_persistence(&self) -> Result<bool>;

    /// Whether storage is currently marked durable.
    async fn is_persisted(&self) -> Result<bool>;

    /// Best-effort quota and usage estimate.
    async fn estimate(&self) -> Result<StorageEstimate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_estimate_default() {
        let estimate = StorageEstimate::default();
        assert_eq!(estimate.quota_bytes, None);
        assert_eq!(estimate.usage_bytes, None);
    }
}
