//! Power State Abstraction
//!
//! Exposes battery level and charging state where the platform reports them.

use async_trait::async_trait;

use crate::error::Result;

/// Power information snapshot.
///
/// Both fields are `None` on platforms that do not expose battery state
/// (typical for mains-powered desktops). Callers treat unknown as
/// unconstrained rather than blocking work on missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerInfo {
    /// Battery charge percentage (0-100), if known
    pub battery_percent: Option<u8>,
    /// Whether the device is charging, if known
    pub is_charging: Option<bool>,
}

impl PowerInfo {
    /// True when the battery is known to be below `threshold` and not charging.
    pub fn below_threshold(&self, threshold: u8) -> bool {
        match (self.battery_percent, self.is_charging) {
            (Some(pct), Some(true)) => {
                let _ = pct;
                false
            }
            (Some(pct), _) => pct < threshold,
            (None, _) => false,
        }
    }
}

/// Power monitor trait
#[async_trait]
pub trait PowerMonitor: Send + Sync {
    /// Get the current power state.
    async fn power_info(&self) -> Result<PowerInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold() {
        let low = PowerInfo {
            battery_percent: Some(10),
            is_charging: Some(false),
        };
        assert!(low.below_threshold(20));

        let low_but_charging = PowerInfo {
            battery_percent: Some(10),
            is_charging: Some(true),
        };
        assert!(!low_but_charging.below_threshold(20));

        let unknown = PowerInfo::default();
        assert!(!unknown.below_threshold(20));
    }
}
