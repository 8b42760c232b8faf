//! Network Monitoring Abstraction
//!
//! Provides network connectivity and status information.

use async_trait::async_trait;

use crate::error::Result;

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network information
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// Whether the connection is metered (has data limits/costs)
    pub is_metered: bool,
}

impl NetworkInfo {
    pub fn is_connected(&self) -> bool {
        self.status == NetworkStatus::Connected
    }

    /// True when downloads that must avoid cellular data may proceed.
    ///
    /// Ethernet counts: it is at least as unmetered as WiFi.
    pub fn satisfies_wifi_only(&self) -> bool {
        self.is_connected()
            && matches!(
                self.network_type,
                Some(NetworkType::WiFi) | Some(NetworkType::Ethernet)
            )
    }
}

/// Network monitor trait
///
/// Provides network connectivity information so the core can:
/// - Skip scheduled downloads when offline
/// - Honor WiFi-only download conditions
/// - Adapt behavior on metered connections
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn network_info(&self) -> Result<NetworkInfo>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(
            self.network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of network info updates. Implementations should
    /// emit an event whenever network status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wifi_only_gate() {
        let wifi = NetworkInfo {
            status: NetworkStatus::Connected,
            network_type: Some(NetworkType::WiFi),
            is_metered: false,
        };
        assert!(wifi.satisfies_wifi_only());

        let ethernet = NetworkInfo {
            network_type: Some(NetworkType::Ethernet),
            ..wifi.clone()
        };
        assert!(ethernet.satisfies_wifi_only());

        let cellular = NetworkInfo {
            network_type: Some(NetworkType::Cellular),
            is_metered: true,
            ..wifi.clone()
        };
        assert!(!cellular.satisfies_wifi_only());

        let offline = NetworkInfo {
            status: NetworkStatus::Disconnected,
            network_type: None,
            is_metered: false,
        };
        assert!(!offline.satisfies_wifi_only());
    }
}
