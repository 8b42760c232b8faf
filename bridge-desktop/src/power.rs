//! Power State Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    power::{PowerInfo, PowerMonitor},
};

/// Desktop power monitor.
///
/// Desktops do not reliably expose battery state without platform-specific
/// APIs, so this implementation reports unknown. Consumers treat unknown as
/// unconstrained, which is correct for mains-powered machines.
pub struct DesktopPowerMonitor;

impl DesktopPowerMonitor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopPowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PowerMonitor for DesktopPowerMonitor {
    async fn power_info(&self) -> Result<PowerInfo> {
        Ok(PowerInfo::default())
    }
}
