//! Durable storage negotiation and denial mitigation.
//!
//! Hosts may refuse to make the cache durable, or run in an ephemeral
//! environment where it will be wiped (private browsing, sandboxed guests).
//! The guard asks the host for durability once at bootstrap and, when denied,
//! drops into resilience mode: a marker is persisted, a debounced metadata
//! snapshot is kept in the settings store as a recovery point, and the user
//! gets a persistent warning.

use crate::error::{Result, StoreError};
use bridge_traits::{
    Notification, NotificationKind, Notifier, SettingsStore, StorageEnvironment,
};
use async_trait::async_trait;
use core_runtime::events::{CoreEvent, EventBus, StorageEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Quota below which the environment is probably ephemeral.
///
/// Real hosts grant gigabytes; private browsing modes typically report a few
/// megabytes. Ten megabytes would not hold a single song.
pub const PRIVATE_MODE_QUOTA_THRESHOLD: u64 = 10 * 1024 * 1024;

const RESILIENCE_MARKER_KEY: &str = "storage_resilience_mode";
const SNAPSHOT_KEY: &str = "metadata_backup_snapshot";

/// Source of the metadata snapshot written in resilience mode.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Serialized metadata snapshot as JSON.
    async fn snapshot(&self) -> Result<String>;
}

/// Storage durability and quota summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    pub persisted: bool,
    pub quota_bytes: Option<u64>,
    pub usage_bytes: Option<u64>,
    /// True when the reported quota is below [`PRIVATE_MODE_QUOTA_THRESHOLD`].
    /// An unreported quota is not treated as suspicious.
    pub private_mode_likely: bool,
}

pub struct PersistenceGuard {
    env: Arc<dyn StorageEnvironment>,
    settings: Arc<dyn SettingsStore>,
    snapshot_source: Arc<dyn SnapshotSource>,
    events: EventBus,
    notifier: Option<Arc<dyn Notifier>>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceGuard {
    pub fn new(
        env: Arc<dyn StorageEnvironment>,
        settings: Arc<dyn SettingsStore>,
        snapshot_source: Arc<dyn SnapshotSource>,
        events: EventBus,
    ) -> Self {
        Self {
            env,
            settings,
            snapshot_source,
            events,
            notifier: None,
            debounce: Duration::from_secs(2),
            pending: Mutex::new(None),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Asks the host to make storage durable.
    ///
    /// A denial is an answer, not an error: it returns `Ok(false)` after
    /// running the mitigation (resilience marker, snapshot, warning).
    pub async fn request_durable_storage(self: &Arc<Self>) -> Result<bool> {
        let already = self
            .env
            .is_persisted()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if already {
            self.events
                .emit(CoreEvent::Storage(StorageEvent::PersistenceGranted))
                .ok();
            return Ok(true);
        }

        let granted = self
            .env
            .request_persistence()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if granted {
            info!("Durable storage granted");
            self.events
                .emit(CoreEvent::Storage(StorageEvent::PersistenceGranted))
                .ok();
            return Ok(true);
        }

        warn!("Durable storage denied, entering resilience mode");

        let marker_ok = self
            .settings
            .set_bool(RESILIENCE_MARKER_KEY, true)
            .await
            .is_ok();

        self.schedule_snapshot().await;

        if let Some(notifier) = &self.notifier {
            notifier
                .show(
                    Notification::new(
                        NotificationKind::Warning,
                        "Offline storage at risk",
                        "The system declined to protect downloaded music. \
                         It may be removed under storage pressure.",
                    )
                    .persistent(),
                )
                .await;
        }

        self.events
            .emit(CoreEvent::Storage(StorageEvent::PersistenceDenied {
                mitigated: marker_ok,
            }))
            .ok();

        Ok(false)
    }

    /// Reports durability and quota, flagging suspiciously small quotas.
    pub async fn storage_info(&self) -> Result<StorageInfo> {
        let persisted = self
            .env
            .is_persisted()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let estimate = self
            .env
            .estimate()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let private_mode_likely = estimate
            .quota_bytes
            .map(|q| q < PRIVATE_MODE_QUOTA_THRESHOLD)
            .unwrap_or(false);

        if private_mode_likely {
            if let Some(quota) = estimate.quota_bytes {
                warn!(quota_bytes = quota, "Storage quota suggests private mode");
                self.events
                    .emit(CoreEvent::Storage(StorageEvent::LowQuota {
                        quota_bytes: quota,
                    }))
                    .ok();
            }
        }

        Ok(StorageInfo {
            persisted,
            quota_bytes: estimate.quota_bytes,
            usage_bytes: estimate.usage_bytes,
            private_mode_likely,
        })
    }

    /// True when a previous denial put the cache into resilience mode.
    pub async fn in_resilience_mode(&self) -> bool {
        self.settings
            .get_bool(RESILIENCE_MARKER_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or(false)
    }

    /// Schedules a debounced snapshot write, replacing any pending one.
    ///
    /// Called after metadata mutations while in resilience mode. Bursts of
    /// writes collapse into a single snapshot.
    pub async fn schedule_snapshot(self: &Arc<Self>) {
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let guard = Arc::clone(self);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(guard.debounce).await;
            if let Err(e) = guard.flush_snapshot().await {
                warn!(error = %e, "Snapshot write failed");
            }
        }));
    }

    /// Writes the snapshot immediately.
    pub async fn flush_snapshot(&self) -> Result<u64> {
        let snapshot = self.snapshot_source.snapshot().await?;
        let bytes = snapshot.len() as u64;

        self.settings
            .set_string(SNAPSHOT_KEY, &snapshot)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        self.events
            .emit(CoreEvent::Storage(StorageEvent::SnapshotSaved { bytes }))
            .ok();

        Ok(bytes)
    }

    /// Returns the last written snapshot, if any.
    pub async fn stored_snapshot(&self) -> Result<Option<String>> {
        self.settings
            .get_string(SNAPSHOT_KEY)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BridgeError, StorageEstimate};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeEnv {
        persisted: bool,
        grant: bool,
        quota: Option<u64>,
    }

    #[async_trait]
    impl StorageEnvironment for FakeEnv {
        async fn request_persistence(&self) -> std::result::Result<bool, BridgeError> {
            Ok(self.grant)
        }

        async fn is_persisted(&self) -> std::result::Result<bool, BridgeError> {
            Ok(self.persisted)
        }

        async fn estimate(&self) -> std::result::Result<StorageEstimate, BridgeError> {
            Ok(StorageEstimate {
                quota_bytes: self.quota,
                usage_bytes: Some(0),
            })
        }
    }

    #[derive(Default)]
    struct MemorySettings {
        values: StdMutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn set_string(
            &self,
            key: &str,
            value: &str,
        ) -> std::result::Result<(), BridgeError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> std::result::Result<Option<String>, BridgeError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_bool(&self, key: &str, value: bool) -> std::result::Result<(), BridgeError> {
            self.set_string(key, &value.to_string()).await
        }

        async fn get_bool(&self, key: &str) -> std::result::Result<Option<bool>, BridgeError> {
            Ok(self
                .get_string(key)
                .await?
                .and_then(|s| s.parse().ok()))
        }

        async fn set_i64(&self, key: &str, value: i64) -> std::result::Result<(), BridgeError> {
            self.set_string(key, &value.to_string()).await
        }

        async fn get_i64(&self, key: &str) -> std::result::Result<Option<i64>, BridgeError> {
            Ok(self
                .get_string(key)
                .await?
                .and_then(|s| s.parse().ok()))
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), BridgeError> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn has_key(&self, key: &str) -> std::result::Result<bool, BridgeError> {
            Ok(self.values.lock().unwrap().contains_key(key))
        }

        async fn list_keys(&self) -> std::result::Result<Vec<String>, BridgeError> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }

        async fn clear_all(&self) -> std::result::Result<(), BridgeError> {
            self.values.lock().unwrap().clear();
            Ok(())
        }
    }

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn snapshot(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("{\"songs\":[]}".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        shown: StdMutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn show(&self, notification: Notification) {
            self.shown.lock().unwrap().push(notification);
        }
    }

    fn guard_with(
        env: FakeEnv,
        settings: Arc<MemorySettings>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<PersistenceGuard> {
        Arc::new(
            PersistenceGuard::new(
                Arc::new(env),
                settings,
                Arc::new(CountingSource {
                    calls: AtomicU32::new(0),
                }),
                EventBus::default(),
            )
            .with_notifier(notifier)
            .with_debounce(Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn test_grant_is_clean() {
        let settings = Arc::new(MemorySettings::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = guard_with(
            FakeEnv {
                persisted: false,
                grant: true,
                quota: Some(1 << 30),
            },
            settings.clone(),
            notifier.clone(),
        );

        assert!(guard.request_durable_storage().await.unwrap());
        assert!(!guard.in_resilience_mode().await);
        assert!(notifier.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denial_runs_mitigation() {
        let settings = Arc::new(MemorySettings::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = guard_with(
            FakeEnv {
                persisted: false,
                grant: false,
                quota: Some(1 << 30),
            },
            settings.clone(),
            notifier.clone(),
        );

        let granted = guard.request_durable_storage().await.unwrap();
        assert!(!granted);
        assert!(guard.in_resilience_mode().await);

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, NotificationKind::Warning);
        assert!(shown[0].persistent);
    }

    #[tokio::test]
    async fn test_already_persisted_short_circuits() {
        let settings = Arc::new(MemorySettings::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = guard_with(
            FakeEnv {
                persisted: true,
                grant: false,
                quota: Some(1 << 30),
            },
            settings,
            notifier,
        );

        assert!(guard.request_durable_storage().await.unwrap());
    }

    #[tokio::test]
    async fn test_small_quota_flags_private_mode() {
        let settings = Arc::new(MemorySettings::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = guard_with(
            FakeEnv {
                persisted: true,
                grant: true,
                quota: Some(5 * 1024 * 1024),
            },
            settings,
            notifier,
        );

        let info = guard.storage_info().await.unwrap();
        assert!(info.private_mode_likely);
    }

    #[tokio::test]
    async fn test_unreported_quota_is_not_suspicious() {
        let settings = Arc::new(MemorySettings::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let guard = guard_with(
            FakeEnv {
                persisted: true,
                grant: true,
                quota: None,
            },
            settings,
            notifier,
        );

        let info = guard.storage_info().await.unwrap();
        assert!(!info.private_mode_likely);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_writes_are_debounced() {
        let settings = Arc::new(MemorySettings::default());
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let guard = Arc::new(
            PersistenceGuard::new(
                Arc::new(FakeEnv {
                    persisted: false,
                    grant: false,
                    quota: None,
                }),
                settings.clone(),
                source.clone(),
                EventBus::default(),
            )
            .with_debounce(Duration::from_millis(100)),
        );

        for _ in 0..5 {
            guard.schedule_snapshot().await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Let the spawned snapshot task run to completion
        tokio::task::yield_now().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(guard.stored_snapshot().await.unwrap().is_some());
    }
}
