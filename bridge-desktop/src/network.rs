//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Desktop network monitor implementation
///
/// Provides basic network connectivity detection via a TCP probe.
///
/// Note: Platform-specific implementations (Linux netlink, macOS
/// SystemConfiguration, Windows WinAPI) would be more robust but require
/// additional dependencies.
pub struct DesktopNetworkMonitor {
    cached_info: Arc<Mutex<Option<NetworkInfo>>>,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self {
            cached_info: Arc::new(Mutex::new(None)),
        }
    }

    /// Check connectivity by attempting a TCP connection to a public resolver
    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            std::time::Duration::from_secs(5),
            tokio::net::TcpStream::connect("8.8.8.8:53"),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn network_info(&self) -> Result<NetworkInfo> {
        let mut cached = self.cached_info.lock().await;

        let status = self.check_connectivity().await;

        let info = NetworkInfo {
            status,
            network_type: if status == NetworkStatus::Connected {
                // Desktops are wired or on WiFi; without platform APIs we
                // cannot tell which, so report Ethernet as the conservative
                // unmetered assumption.
                Some(NetworkType::Ethernet)
            } else {
                None
            },
            is_metered: false,
        };

        *cached = Some(info.clone());
        debug!(status = ?status, "Network info updated");

        Ok(info)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        // Simple implementation: poll periodically. A production
        // implementation would use platform-specific APIs to watch for changes.
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: Self::new(),
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;

            if let Ok(info) = self.monitor.network_info().await {
                if self.last_status != Some(info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}
