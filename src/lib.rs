//! Offline media cache and download orchestration core.
//!
//! The workspace crates each own one concern: `core-store` persists records,
//! `core-library` manages song and playlist metadata, `core-media` caches
//! audio and thumbnail payloads, `core-download` drives downloads against the
//! processing service, and `core-scheduler` runs queued background
//! downloads. This crate wires them together behind [`CoreServices`] so a
//! host only has to provide its platform bridges via [`CoreConfig`].

use anyhow::Context;
use core_download::{EngineConfig, HttpSongProcessingApi};
use core_scheduler::SchedulerConfig;
use core_store::{EmbeddedObjectStore, SnapshotSource, StoreConfig};
use std::sync::Arc;
use tracing::{info, warn};

pub use bridge_desktop::{
    DesktopNetworkMonitor, DesktopPowerMonitor, DesktopStorageEnvironment, LogNotifier,
    ReqwestHttpClient, SqliteSettingsStore,
};
pub use bridge_traits::{
    BridgeError, HttpClient, NetworkMonitor, Notifier, PowerMonitor, SettingsStore,
    StorageEnvironment,
};
pub use core_download::{
    DownloadEngine, DownloadError, DownloadStatus, DownloadTask, SongInfo, SongProcessingApi,
};
pub use core_library::{LibraryError, LibraryStats, MetadataStore, Playlist, SearchHistoryEntry, Song};
pub use core_media::{MediaBlobCache, MediaError, MediaHandle, MediaUsage, PlayableRef, ThumbnailRef};
pub use core_runtime::{
    init_logging, CoreConfig, CoreConfigBuilder, CoreEvent, DownloadEvent, EventBus,
    EventSeverity, LibraryEvent, LogFormat, LogLevel, LoggingConfig, ScheduleEvent, StorageEvent,
};
pub use core_scheduler::{
    DownloadSchedule, ScheduleConditions, ScheduleQueue, ScheduleStatus, SchedulerError,
    TimeWindow,
};
pub use core_store::{Collection, ObjectStore, PersistenceGuard, StorageInfo, StoreCell, StoreError};

const DB_FILE: &str = "tunecache.db";
const SCHEMA_VERSION_KEY: &str = "storage_schema_version";
const SCHEMA_VERSION: i64 = 1;

/// All core services, wired and running.
///
/// Dropping the struct stops the scheduler ticker; in-flight downloads keep
/// their persisted state and resume as paused tasks on the next bootstrap.
pub struct CoreServices {
    pub events: EventBus,
    pub store: Arc<dyn ObjectStore>,
    pub library: Arc<MetadataStore>,
    pub media: Arc<MediaBlobCache>,
    pub downloads: Arc<DownloadEngine>,
    pub scheduler: Arc<ScheduleQueue>,
    pub persistence: Option<Arc<PersistenceGuard>>,
    store_cell: StoreCell,
}

impl CoreServices {
    /// Boots the core: opens the object store, restores persisted download
    /// and schedule state, starts the scheduler and negotiates durable
    /// storage when the host exposes it.
    pub async fn bootstrap(config: CoreConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid core configuration")?;
        info!(data_dir = %config.data_dir.display(), "Bootstrapping core services");

        let events = EventBus::new(256);

        let store_cell = StoreCell::new();
        let db_path = config.data_dir.join(DB_FILE);
        let store_config = StoreConfig::default()
            .with_write_timeout(config.write_timeout)
            .with_read_timeout(config.read_timeout);
        let store = store_cell
            .open_with_retry(move || {
                let db_path = db_path.clone();
                let store_config = store_config.clone();
                async move {
                    let store = EmbeddedObjectStore::new(db_path, store_config).await?;
                    Ok(Arc::new(store) as Arc<dyn ObjectStore>)
                }
            })
            .await
            .context("opening object store")?;

        check_schema_version(config.settings_store.as_ref()).await?;

        let media = Arc::new(MediaBlobCache::new(store.clone()));
        let library = Arc::new(
            MetadataStore::new(store.clone(), events.clone()).with_blob_store(media.clone()),
        );

        let api = Arc::new(HttpSongProcessingApi::new(
            config.http_client.clone(),
            config.api_base_url.clone(),
        ));
        let downloads = Arc::new(DownloadEngine::new(
            api,
            media.clone(),
            library.clone(),
            store.clone(),
            events.clone(),
            EngineConfig {
                poll_interval: config.poll_interval,
                max_poll_attempts: config.max_poll_attempts,
            },
        ));
        downloads
            .load_persisted()
            .await
            .context("restoring download tasks")?;

        let mut scheduler = ScheduleQueue::new(
            downloads.clone(),
            config.network_monitor.clone(),
            config.settings_store.clone(),
            events.clone(),
            SchedulerConfig {
                tick_interval: config.scheduler_tick_interval,
                retry_delay: config.retry_delay,
                max_concurrent: config.max_concurrent_downloads,
                min_battery_percent: config.min_battery_percent,
                max_retries: config.max_schedule_retries,
            },
        );
        if let Some(power) = &config.power_monitor {
            scheduler = scheduler.with_power_monitor(power.clone());
        }
        if let Some(notifier) = &config.notifier {
            scheduler = scheduler.with_notifier(notifier.clone());
        }
        let scheduler = Arc::new(scheduler);
        scheduler
            .load_persisted()
            .await
            .context("restoring schedule queue")?;
        scheduler.start();

        let persistence = match &config.storage_env {
            Some(env) => {
                let mut guard = PersistenceGuard::new(
                    env.clone(),
                    config.settings_store.clone(),
                    library.clone() as Arc<dyn SnapshotSource>,
                    events.clone(),
                );
                if let Some(notifier) = &config.notifier {
                    guard = guard.with_notifier(notifier.clone());
                }
                let guard = Arc::new(guard);
                match guard.request_durable_storage().await {
                    Ok(granted) => info!(granted, "Durable storage negotiated"),
                    Err(e) => warn!(error = %e, "Durable storage negotiation failed"),
                }
                Some(guard)
            }
            None => None,
        };

        info!("Core services ready");
        Ok(Self {
            events,
            store,
            library,
            media,
            downloads,
            scheduler,
            persistence,
            store_cell,
        })
    }

    /// Stops background work. Persisted state is already current since every
    /// mutation writes through.
    pub fn shutdown(&self) {
        self.scheduler.stop();
        info!("Core services stopped");
    }

    /// The shared handle to the open object store slot.
    pub fn store_cell(&self) -> &StoreCell {
        &self.store_cell
    }
}

/// Refuses to run against data written by a newer schema. First run stamps
/// the current version.
async fn check_schema_version(settings: &dyn SettingsStore) -> anyhow::Result<()> {
    match settings
        .get_i64(SCHEMA_VERSION_KEY)
        .await
        .context("reading schema version")?
    {
        Some(version) if version > SCHEMA_VERSION => anyhow::bail!(
            "data was written by a newer version (schema {} > {})",
            version,
            SCHEMA_VERSION
        ),
        Some(_) => Ok(()),
        None => {
            settings
                .set_i64(SCHEMA_VERSION_KEY, SCHEMA_VERSION)
                .await
                .context("stamping schema version")?;
            Ok(())
        }
    }
}
