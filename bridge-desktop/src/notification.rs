//! Notification Implementation

use async_trait::async_trait;
use bridge_traits::notification::{Notification, NotificationKind, Notifier};
use tracing::{error, info, warn};

/// Notifier that mirrors notifications into the log stream.
///
/// Useful for headless deployments and as a default when no UI host is
/// attached. Hosts with a real notification surface inject their own
/// [`Notifier`] instead.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => error!(
                title = %notification.title,
                persistent = notification.persistent,
                "{}",
                notification.message
            ),
            NotificationKind::Warning => warn!(
                title = %notification.title,
                persistent = notification.persistent,
                "{}",
                notification.message
            ),
            NotificationKind::Info | NotificationKind::Success => info!(
                title = %notification.title,
                "{}",
                notification.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_show_does_not_panic() {
        let notifier = LogNotifier::new();
        notifier
            .show(Notification::new(
                NotificationKind::Info,
                "Download",
                "Completed",
            ))
            .await;
    }
}
