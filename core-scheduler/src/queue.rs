//! Background download queue.
//!
//! Pending entries wait for their scheduled time and conditions (network
//! kind, battery, time window). A periodic tick dispatches eligible entries
//! to the download engine, highest priority first, FIFO within a priority.
//! The queue is persisted to settings storage after every mutation so queued
//! work survives a restart.

use crate::dispatch::{DispatchError, DownloadDispatcher};
use crate::error::{Result, SchedulerError};
use crate::schedule::{
    DownloadSchedule, ScheduleConditions, ScheduleStatus, DEFAULT_PRIORITY,
};
use bridge_traits::{
    NetworkInfo, NetworkMonitor, Notification, NotificationKind, Notifier, PowerInfo,
    PowerMonitor, SettingsStore,
};
use chrono::{Local, Utc};
use core_download::SongInfo;
use core_runtime::{CoreEvent, EventBus, ScheduleEvent};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const QUEUE_KEY: &str = "background_download_queue";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between dispatch ticks.
    pub tick_interval: Duration,
    /// Delay before a failed entry becomes eligible again.
    pub retry_delay: Duration,
    /// Scheduled plus user-initiated downloads running at once.
    pub max_concurrent: usize,
    /// Global battery floor; ticks are skipped below it unless charging.
    pub min_battery_percent: u8,
    /// Attempts before an entry fails permanently.
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            retry_delay: Duration::from_secs(30),
            max_concurrent: 3,
            min_battery_percent: 20,
            max_retries: 3,
        }
    }
}

pub struct ScheduleQueue {
    dispatcher: Arc<dyn DownloadDispatcher>,
    network: Arc<dyn NetworkMonitor>,
    settings: Arc<dyn SettingsStore>,
    power: Option<Arc<dyn PowerMonitor>>,
    notifier: Option<Arc<dyn Notifier>>,
    events: EventBus,
    config: SchedulerConfig,
    entries: Mutex<Vec<DownloadSchedule>>,
    next_seq: AtomicU64,
    /// Guards against overlapping ticks when a dispatch outlives the
    /// tick interval.
    tick_running: AtomicBool,
    ticker: StdMutex<Option<JoinHandle<()>>>,
}

impl ScheduleQueue {
    pub fn new(
        dispatcher: Arc<dyn DownloadDispatcher>,
        network: Arc<dyn NetworkMonitor>,
        settings: Arc<dyn SettingsStore>,
        events: EventBus,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            dispatcher,
            network,
            settings,
            power: None,
            notifier: None,
            events,
            config,
            entries: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            tick_running: AtomicBool::new(false),
            ticker: StdMutex::new(None),
        }
    }

    pub fn with_power_monitor(mut self, power: Arc<dyn PowerMonitor>) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Queues a song for background download.
    pub async fn schedule(
        &self,
        song: SongInfo,
        scheduled_at: i64,
        conditions: ScheduleConditions,
        priority: Option<u8>,
    ) -> Result<DownloadSchedule> {
        if song.id.trim().is_empty() {
            return Err(SchedulerError::InvalidSchedule(
                "song id must not be empty".to_string(),
            ));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = DownloadSchedule::new(
            song,
            scheduled_at,
            conditions,
            priority.unwrap_or(DEFAULT_PRIORITY),
            seq,
        );

        self.entries.lock().await.push(entry.clone());
        self.persist().await;

        info!(
            schedule_id = %entry.id,
            title = %entry.song.title,
            priority = entry.priority,
            "Download scheduled"
        );
        self.events
            .emit(CoreEvent::Schedule(ScheduleEvent::Scheduled {
                schedule_id: entry.id.clone(),
                title: entry.song.title.clone(),
                priority: entry.priority,
            }))
            .ok();
        Ok(entry)
    }

    /// Removes an entry. Entries already handed to the engine finish their
    /// current attempt but are gone from the queue afterwards.
    pub async fn cancel(&self, schedule_id: &str) -> Result<()> {
        let removed = {
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|e| e.id != schedule_id);
            entries.len() < before
        };
        if !removed {
            return Err(SchedulerError::NotFound(schedule_id.to_string()));
        }

        self.persist().await;
        self.events
            .emit(CoreEvent::Schedule(ScheduleEvent::Cancelled {
                schedule_id: schedule_id.to_string(),
            }))
            .ok();
        Ok(())
    }

    pub async fn entries(&self) -> Vec<DownloadSchedule> {
        self.entries.lock().await.clone()
    }

    pub async fn entry(&self, schedule_id: &str) -> Result<DownloadSchedule> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.id == schedule_id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))
    }

    pub async fn pending_count(&self) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.status == ScheduleStatus::Pending)
            .count()
    }

    /// Restores the persisted queue. Entries caught mid-dispatch by a crash
    /// go back to `Pending`.
    pub async fn load_persisted(&self) -> Result<()> {
        let raw = match self.settings.get_string(QUEUE_KEY).await? {
            Some(raw) => raw,
            None => return Ok(()),
        };
        let mut loaded: Vec<DownloadSchedule> =
            serde_json::from_str(&raw).map_err(|e| SchedulerError::Serialization(e.to_string()))?;

        for entry in &mut loaded {
            if entry.status == ScheduleStatus::Downloading {
                entry.status = ScheduleStatus::Pending;
            }
        }
        let max_seq = loaded.iter().map(|e| e.seq).max();
        if let Some(max_seq) = max_seq {
            self.next_seq.store(max_seq + 1, Ordering::Relaxed);
        }

        let count = loaded.len();
        *self.entries.lock().await = loaded;
        self.persist().await;
        debug!(count, "Schedule queue restored");
        Ok(())
    }

    /// Starts the periodic tick. Calling it again while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let queue = Arc::clone(self);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(queue.config.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                queue.tick().await;
            }
        }));
        info!(interval = ?self.config.tick_interval, "Schedule queue started");
    }

    pub fn stop(&self) {
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Schedule queue stopped");
        }
    }

    /// One dispatch pass. Public so hosts can force a pass outside the
    /// periodic tick, e.g. when the network comes back.
    pub async fn tick(&self) {
        if self
            .tick_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Tick still running, skipping");
            return;
        }
        self.run_tick().await;
        self.tick_running.store(false, Ordering::Release);
    }

    async fn run_tick(&self) {
        let network = match self.network.network_info().await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Network probe failed, skipping tick");
                return;
            }
        };
        if !network.is_connected() {
            return;
        }

        let power = self.power_snapshot().await;
        if power.below_threshold(self.config.min_battery_percent) {
            debug!("Battery below floor, skipping tick");
            return;
        }

        let active = self.dispatcher.active_download_count().await;
        let slots = self.config.max_concurrent.saturating_sub(active);
        if slots == 0 {
            return;
        }

        let batch = self.claim_eligible(slots, &network, &power).await;
        for entry in batch {
            self.dispatch(entry).await;
        }
    }

    /// Picks up to `slots` eligible pending entries, marks them
    /// `Downloading` and returns them, highest priority first.
    async fn claim_eligible(
        &self,
        slots: usize,
        network: &NetworkInfo,
        power: &PowerInfo,
    ) -> Vec<DownloadSchedule> {
        let now = Utc::now().timestamp();
        let local_time = Local::now().time();

        let mut entries = self.entries.lock().await;
        let mut eligible: Vec<&mut DownloadSchedule> = entries
            .iter_mut()
            .filter(|e| {
                e.status == ScheduleStatus::Pending
                    && e.scheduled_at <= now
                    && conditions_met(&e.conditions, network, power, local_time)
            })
            .collect();

        eligible.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));

        let mut claimed = Vec::new();
        for entry in eligible.into_iter().take(slots) {
            entry.status = ScheduleStatus::Downloading;
            claimed.push(entry.clone());
        }
        drop(entries);

        if !claimed.is_empty() {
            self.persist().await;
        }
        claimed
    }

    async fn dispatch(&self, entry: DownloadSchedule) {
        info!(schedule_id = %entry.id, title = %entry.song.title, "Dispatching scheduled download");
        self.events
            .emit(CoreEvent::Schedule(ScheduleEvent::Started {
                schedule_id: entry.id.clone(),
            }))
            .ok();

        match self.dispatcher.fetch_and_store(&entry.song).await {
            Ok(song_id) => {
                self.mark(&entry.id, |e| {
                    e.status = ScheduleStatus::Completed;
                    e.last_error = None;
                })
                .await;
                info!(schedule_id = %entry.id, song_id = %song_id, "Scheduled download completed");
                self.events
                    .emit(CoreEvent::Schedule(ScheduleEvent::Completed {
                        schedule_id: entry.id.clone(),
                    }))
                    .ok();
            }
            Err(e) => self.handle_failure(&entry, e).await,
        }
    }

    async fn handle_failure(&self, entry: &DownloadSchedule, e: DispatchError) {
        // The failed attempt counts; compare after incrementing so an entry
        // never gets more than max_retries dispatches.
        let retry_count = entry.retry_count + 1;
        if e.recoverable && retry_count < self.config.max_retries {
            let next_attempt_at = Utc::now().timestamp() + self.config.retry_delay.as_secs() as i64;
            self.mark(&entry.id, |en| {
                en.status = ScheduleStatus::Pending;
                en.retry_count = retry_count;
                en.scheduled_at = next_attempt_at;
                en.last_error = Some(e.message.clone());
            })
            .await;
            warn!(
                schedule_id = %entry.id,
                retry_count,
                error = %e,
                "Scheduled download failed, will retry"
            );
            self.events
                .emit(CoreEvent::Schedule(ScheduleEvent::Retrying {
                    schedule_id: entry.id.clone(),
                    retry_count,
                    next_attempt_at,
                }))
                .ok();
            return;
        }

        self.mark(&entry.id, |en| {
            en.status = ScheduleStatus::Failed;
            en.retry_count = retry_count;
            en.last_error = Some(e.message.clone());
        })
        .await;
        warn!(schedule_id = %entry.id, error = %e, "Scheduled download failed permanently");

        if let Some(notifier) = &self.notifier {
            notifier
                .show(Notification::new(
                    NotificationKind::Warning,
                    "Scheduled download failed",
                    format!("\"{}\" could not be downloaded.", entry.song.title),
                ))
                .await;
        }
        self.events
            .emit(CoreEvent::Schedule(ScheduleEvent::FailedPermanently {
                schedule_id: entry.id.clone(),
                message: e.message,
            }))
            .ok();
    }

    async fn mark(&self, schedule_id: &str, update: impl FnOnce(&mut DownloadSchedule)) {
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.iter_mut().find(|e| e.id == schedule_id) {
                update(entry);
            }
        }
        self.persist().await;
    }

    async fn power_snapshot(&self) -> PowerInfo {
        match &self.power {
            Some(power) => match power.power_info().await {
                Ok(info) => info,
                Err(e) => {
                    warn!(error = %e, "Power probe failed, treating as unconstrained");
                    PowerInfo::default()
                }
            },
            // No monitor: unknown battery never blocks work
            None => PowerInfo::default(),
        }
    }

    /// Writes the queue to settings storage. Failures are logged and
    /// swallowed; the in-memory queue stays authoritative.
    async fn persist(&self) {
        let snapshot = self.entries.lock().await.clone();
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = self.settings.set_string(QUEUE_KEY, &json).await {
                    warn!(error = %e, "Schedule queue persistence failed");
                }
            }
            Err(e) => warn!(error = %e, "Schedule queue serialization failed"),
        }
    }
}

fn conditions_met(
    conditions: &ScheduleConditions,
    network: &NetworkInfo,
    power: &PowerInfo,
    local_time: chrono::NaiveTime,
) -> bool {
    if conditions.wifi_only && !network.satisfies_wifi_only() {
        return false;
    }
    if let Some(min_battery) = conditions.min_battery {
        if power.below_threshold(min_battery) {
            return false;
        }
    }
    if let Some(window) = &conditions.window {
        if !window.contains(local_time) {
            return false;
        }
    }
    true
}

impl Drop for ScheduleQueue {
    fn drop(&mut self) {
        if let Some(handle) = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for ScheduleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleQueue")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
