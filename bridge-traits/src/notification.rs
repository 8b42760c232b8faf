//! User Notification Abstraction
//!
//! Fire-and-forget notifications surfaced by the host platform.

use async_trait::async_trait;

/// Notification category, mapped by hosts to their own styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// An action button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    /// Stable identifier reported back when the user activates the action
    pub id: String,
    /// Human-readable label
    pub label: String,
}

/// A user-facing notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Persistent notifications stay until dismissed by the user
    pub persistent: bool,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            persistent: false,
            actions: Vec::new(),
        }
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn action(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.actions.push(NotificationAction {
            id: id.into(),
            label: label.into(),
        });
        self
    }
}

/// Notification sink trait.
///
/// Delivery is fire-and-forget: implementations swallow and log their own
/// failures, the core never blocks on notification outcomes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: Notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_builder() {
        let n = Notification::new(NotificationKind::Warning, "Storage", "Quota low")
            .persistent()
            .action("open-settings", "Open Settings");

        assert_eq!(n.kind, NotificationKind::Warning);
        assert!(n.persistent);
        assert_eq!(n.actions.len(), 1);
        assert_eq!(n.actions[0].id, "open-settings");
    }
}
