//! # Event Bus System
//!
//! Provides an explicit pub/sub channel for the offline cache core using
//! `tokio::sync::broadcast`. Components that used to reach into each other
//! for change notifications instead emit typed events here; hosts and other
//! components subscribe independently.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, LibraryEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(CoreEvent::Library(LibraryEvent::SongAdded {
//!     song_id: "song-1".to_string(),
//!     title: "Title".to_string(),
//!     artist: "Artist".to_string(),
//! }))
//! .ok();
//!
//! let received = sub.recv().await.unwrap();
//! assert!(matches!(received, CoreEvent::Library(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n`
//!   events. Non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders were dropped; treat as shutdown.
//!
//! Dropping a receiver unsubscribes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Library content changes (songs, playlists, search history)
    Library(LibraryEvent),
    /// Download task lifecycle and progress
    Download(DownloadEvent),
    /// Scheduled background download lifecycle
    Schedule(ScheduleEvent),
    /// Storage durability and quota events
    Storage(StorageEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Schedule(e) => e.description(),
            CoreEvent::Storage(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Schedule(ScheduleEvent::FailedPermanently { .. }) => EventSeverity::Error,
            CoreEvent::Storage(StorageEvent::PersistenceDenied { .. }) => EventSeverity::Warning,
            CoreEvent::Storage(StorageEvent::LowQuota { .. }) => EventSeverity::Warning,
            CoreEvent::Schedule(ScheduleEvent::Retrying { .. }) => EventSeverity::Warning,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Schedule(ScheduleEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events related to library content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// New song added to library.
    SongAdded {
        song_id: String,
        title: String,
        artist: String,
    },
    /// Song metadata updated.
    SongUpdated { song_id: String },
    /// Song removed from library (cascade already attempted).
    SongDeleted { song_id: String },
    /// Favorite flag flipped.
    FavoriteToggled { song_id: String, is_favorite: bool },
    /// New playlist created.
    PlaylistCreated { playlist_id: String, name: String },
    /// Playlist modified (renamed, membership changed).
    PlaylistUpdated {
        playlist_id: String,
        /// What changed (e.g. "renamed", "song_added", "song_removed")
        change: String,
    },
    /// Playlist removed.
    PlaylistDeleted { playlist_id: String },
    /// Search history wiped.
    SearchHistoryCleared,
    /// All library data wiped.
    LibraryCleared,
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::SongAdded { .. } => "Song added to library",
            LibraryEvent::SongUpdated { .. } => "Song metadata updated",
            LibraryEvent::SongDeleted { .. } => "Song removed from library",
            LibraryEvent::FavoriteToggled { .. } => "Favorite toggled",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
            LibraryEvent::SearchHistoryCleared => "Search history cleared",
            LibraryEvent::LibraryCleared => "Library cleared",
        }
    }
}

/// Events related to download tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// Task created and queued for processing.
    TaskQueued { task_id: String, title: String },
    /// Task moved to a new lifecycle state ("pending", "processing", ...).
    StatusChanged { task_id: String, status: String },
    /// Transfer progress update.
    Progress {
        task_id: String,
        /// Overall percent (0-100) across all phases
        percent: u8,
        /// Current phase label (e.g. "downloading-audio")
        phase: String,
        /// Bytes moved within the current phase
        #[serde(default)]
        bytes_downloaded: u64,
        /// Expected phase total, when the transfer reports one
        #[serde(default)]
        bytes_total: Option<u64>,
    },
    /// Task finished and media persisted.
    Completed { task_id: String, song_id: String },
    /// Task failed.
    Failed {
        task_id: String,
        message: String,
        recoverable: bool,
    },
    /// Task removed by the user.
    Removed { task_id: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::TaskQueued { .. } => "Download task queued",
            DownloadEvent::StatusChanged { .. } => "Download status changed",
            DownloadEvent::Progress { .. } => "Download in progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Removed { .. } => "Download task removed",
        }
    }
}

/// Events related to scheduled background downloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ScheduleEvent {
    /// Entry added to the schedule queue.
    Scheduled {
        schedule_id: String,
        title: String,
        priority: u8,
    },
    /// Entry picked up by the processor.
    Started { schedule_id: String },
    /// Entry finished successfully.
    Completed { schedule_id: String },
    /// Entry failed and will be retried.
    Retrying {
        schedule_id: String,
        retry_count: u32,
        /// Unix timestamp of the next attempt
        next_attempt_at: i64,
    },
    /// Entry exhausted its retries.
    FailedPermanently { schedule_id: String, message: String },
    /// Entry cancelled by the user.
    Cancelled { schedule_id: String },
}

impl ScheduleEvent {
    fn description(&self) -> &str {
        match self {
            ScheduleEvent::Scheduled { .. } => "Download scheduled",
            ScheduleEvent::Started { .. } => "Scheduled download started",
            ScheduleEvent::Completed { .. } => "Scheduled download completed",
            ScheduleEvent::Retrying { .. } => "Scheduled download will retry",
            ScheduleEvent::FailedPermanently { .. } => "Scheduled download failed permanently",
            ScheduleEvent::Cancelled { .. } => "Scheduled download cancelled",
        }
    }
}

/// Events related to storage durability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StorageEvent {
    /// Host granted durable storage.
    PersistenceGranted,
    /// Host denied durable storage; mitigation ran.
    PersistenceDenied {
        /// Whether the resilience marker and backup snapshot were written
        mitigated: bool,
    },
    /// Reported quota is suspiciously small (private-mode heuristic).
    LowQuota { quota_bytes: u64 },
    /// Metadata backup snapshot written.
    SnapshotSaved { bytes: u64 },
}

impl StorageEvent {
    fn description(&self) -> &str {
        match self {
            StorageEvent::PersistenceGranted => "Durable storage granted",
            StorageEvent::PersistenceDenied { .. } => "Durable storage denied",
            StorageEvent::LowQuota { .. } => "Storage quota is low",
            StorageEvent::SnapshotSaved { .. } => "Metadata snapshot saved",
        }
    }
}

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none. Emitting with no subscribers is normal
    /// during startup; callers use `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Storage(StorageEvent::PersistenceGranted);

        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Download(DownloadEvent::Progress {
            task_id: "task-1".to_string(),
            percent: 42,
            phase: "downloading-audio".to_string(),
            bytes_downloaded: 1024,
            bytes_total: Some(4096),
        });

        bus.emit(event.clone()).ok();

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Download(DownloadEvent::Progress {
                task_id: "task-1".to_string(),
                percent: i,
                phase: "downloading-audio".to_string(),
                bytes_downloaded: 0,
                bytes_total: None,
            }))
            .ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_event_severity() {
        let error_event = CoreEvent::Download(DownloadEvent::Failed {
            task_id: "task-1".to_string(),
            message: "network".to_string(),
            recoverable: true,
        });
        assert_eq!(error_event.severity(), EventSeverity::Error);

        let warn_event = CoreEvent::Storage(StorageEvent::PersistenceDenied { mitigated: true });
        assert_eq!(warn_event.severity(), EventSeverity::Warning);

        let debug_event = CoreEvent::Download(DownloadEvent::Progress {
            task_id: "task-1".to_string(),
            percent: 10,
            phase: "processing".to_string(),
            bytes_downloaded: 0,
            bytes_total: None,
        });
        assert_eq!(debug_event.severity(), EventSeverity::Debug);
    }

    #[tokio::test]
    async fn test_event_serialization_round_trip() {
        let event = CoreEvent::Schedule(ScheduleEvent::Retrying {
            schedule_id: "sched-1".to_string(),
            retry_count: 2,
            next_attempt_at: 1_700_000_000,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("sched-1"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_dropping_receiver_unsubscribes() {
        let bus = EventBus::new(10);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
