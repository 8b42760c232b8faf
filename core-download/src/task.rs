//! Download task model and lifecycle.

use crate::error::{DownloadError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Queued, nothing has happened yet
    Pending,
    /// Waiting for server-side processing
    Processing,
    /// Transferring media to the device
    Downloading,
    /// Media and metadata saved
    Completed,
    /// Failed; `error` on the task says why
    Error,
    /// Stopped, resumable
    Paused,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Processing => "processing",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Error => "error",
            DownloadStatus::Paused => "paused",
        }
    }

    /// Terminal states never change on their own; only an explicit retry
    /// leaves `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Error)
    }

    /// States that count against the concurrency budget.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Pending | DownloadStatus::Processing | DownloadStatus::Downloading
        )
    }

    /// Whether a transition is allowed.
    ///
    /// `Error` is reachable from any non-terminal state. Pausing is only
    /// meaningful mid-transfer; loading persisted state maps in-flight tasks
    /// to `Paused` directly without going through this check.
    pub fn can_transition(&self, to: DownloadStatus) -> bool {
        use DownloadStatus::*;
        match (self, to) {
            (from, Error) => !from.is_terminal(),
            (Pending, Processing) => true,
            (Processing, Downloading) => true,
            (Downloading, Completed) => true,
            (Downloading, Paused) => true,
            (Paused, Pending) => true,
            (Error, Pending) => true,
            _ => false,
        }
    }
}

impl FromStr for DownloadStatus {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DownloadStatus::Pending),
            "processing" => Ok(DownloadStatus::Processing),
            "downloading" => Ok(DownloadStatus::Downloading),
            "completed" => Ok(DownloadStatus::Completed),
            "error" => Ok(DownloadStatus::Error),
            "paused" => Ok(DownloadStatus::Paused),
            other => Err(DownloadError::TaskNotFound(format!(
                "unknown status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer phase, used for progress reporting.
///
/// Overall percent is split across phases: processing holds at 0, the audio
/// transfer covers 0-70, the thumbnail 70-90, and the final save 90-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadPhase {
    Processing,
    DownloadingAudio,
    DownloadingThumbnail,
    Saving,
}

impl DownloadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadPhase::Processing => "processing",
            DownloadPhase::DownloadingAudio => "downloading-audio",
            DownloadPhase::DownloadingThumbnail => "downloading-thumbnail",
            DownloadPhase::Saving => "saving",
        }
    }
}

/// A download task as shown to the user and persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub id: String,
    pub source_url: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Song id assigned by the processing service
    pub song_id: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: DownloadStatus,
    /// Overall percent, 0-100
    #[serde(default)]
    pub progress: u8,
    /// Current transfer phase while the task is in flight
    #[serde(default)]
    pub phase: Option<DownloadPhase>,
    /// Bytes moved in the current phase, updated at phase boundaries
    #[serde(default)]
    pub bytes_downloaded: u64,
    #[serde(default)]
    pub bytes_total: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DownloadTask {
    pub fn new(source_url: impl Into<String>, song_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            title: title.into(),
            artist: String::new(),
            song_id: song_id.into(),
            thumbnail_url: None,
            duration_secs: None,
            keywords: Vec::new(),
            status: DownloadStatus::Pending,
            progress: 0,
            phase: None,
            bytes_downloaded: 0,
            bytes_total: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a transition, rejecting moves the lifecycle does not allow.
    pub fn transition(&mut self, to: DownloadStatus) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(DownloadError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now().timestamp();
        Ok(())
    }
}
