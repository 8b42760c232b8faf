//! Schedule entry model and download conditions.

use chrono::{NaiveTime, Timelike, Utc};
use core_download::SongInfo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;

/// Lifecycle state of a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    /// Waiting for its time and conditions
    Pending,
    /// Handed to the download engine
    Downloading,
    /// Media stored
    Completed,
    /// Retries exhausted or failure not worth retrying
    Failed,
}

impl ScheduleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Failed)
    }
}

/// A daily time-of-day window, "HH:MM" inclusive start, exclusive end.
///
/// A window whose start is later than its end matches nothing; overnight
/// windows are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

impl TimeWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        let (start, end) = match (parse_minutes(&self.start), parse_minutes(&self.end)) {
            (Some(start), Some(end)) => (start, end),
            // An unparseable window never blocks a download
            _ => return true,
        };
        let minute = time.hour() * 60 + time.minute();
        minute >= start && minute < end
    }
}

fn parse_minutes(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Conditions that must hold before a pending entry is dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConditions {
    /// Only download on WiFi or ethernet
    #[serde(default)]
    pub wifi_only: bool,
    /// Minimum battery percent unless charging
    #[serde(default)]
    pub min_battery: Option<u8>,
    /// Daily time-of-day window
    #[serde(default)]
    pub window: Option<TimeWindow>,
}

/// A queued background download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSchedule {
    pub id: String,
    pub song: SongInfo,
    /// Earliest dispatch time, unix seconds
    pub scheduled_at: i64,
    #[serde(default)]
    pub conditions: ScheduleConditions,
    pub status: ScheduleStatus,
    /// 1 (lowest) to 10 (highest)
    pub priority: u8,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Monotonic insertion order, breaks priority ties FIFO
    pub seq: u64,
    pub created_at: i64,
}

impl DownloadSchedule {
    pub fn new(
        song: SongInfo,
        scheduled_at: i64,
        conditions: ScheduleConditions,
        priority: u8,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            song,
            scheduled_at,
            conditions,
            status: ScheduleStatus::Pending,
            priority: priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            retry_count: 0,
            last_error: None,
            seq,
            created_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_window_contains() {
        let window = TimeWindow {
            start: "22:00".to_string(),
            end: "23:30".to_string(),
        };
        assert!(window.contains(at(22, 0)));
        assert!(window.contains(at(23, 29)));
        assert!(!window.contains(at(23, 30)));
        assert!(!window.contains(at(21, 59)));
    }

    #[test]
    fn test_inverted_window_matches_nothing() {
        let window = TimeWindow {
            start: "23:00".to_string(),
            end: "06:00".to_string(),
        };
        assert!(!window.contains(at(23, 30)));
        assert!(!window.contains(at(3, 0)));
        assert!(!window.contains(at(12, 0)));
    }

    #[test]
    fn test_malformed_window_never_blocks() {
        let window = TimeWindow {
            start: "soon".to_string(),
            end: "later".to_string(),
        };
        assert!(window.contains(at(12, 0)));
    }

    #[test]
    fn test_priority_is_clamped() {
        let song = SongInfo {
            id: "s".to_string(),
            title: "t".to_string(),
            artist: String::new(),
            thumbnail_url: None,
            duration_secs: None,
            keywords: Vec::new(),
        };
        let low = DownloadSchedule::new(song.clone(), 0, Default::default(), 0, 0);
        assert_eq!(low.priority, MIN_PRIORITY);
        let high = DownloadSchedule::new(song, 0, Default::default(), 99, 1);
        assert_eq!(high.priority, MAX_PRIORITY);
    }
}
