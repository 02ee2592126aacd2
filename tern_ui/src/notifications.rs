//! Status messages and error dialogs raised by the bridge.
//!
//! Status messages are transient; errors stay until the editor takes them
//! to show a dialog.

use std::time::{Duration, Instant};
use tern_bridge_client::BridgeEvent;

/// Type of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    /// One-line status message.
    Status,
    /// Failure the user has to acknowledge.
    Error,
}

/// A single notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub notification_type: NotificationType,
    pub created_at: Instant,
    /// How long a status message stays visible.
    pub duration: Duration,
}

impl Notification {
    /// Creates a new notification.
    pub fn new(message: impl Into<String>, notification_type: NotificationType) -> Self {
        Self {
            message: message.into(),
            notification_type,
            created_at: Instant::now(),
            duration: Duration::from_secs(3),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Returns whether this notification has expired. Errors never expire.
    pub fn is_expired(&self) -> bool {
        self.notification_type == NotificationType::Status && self.created_at.elapsed() >= self.duration
    }
}

impl From<BridgeEvent> for Notification {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Status(message) => Notification::new(message, NotificationType::Status),
            BridgeEvent::Error(message) => Notification::new(message, NotificationType::Error),
        }
    }
}

/// Manages notifications for the editor.
#[derive(Debug)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    /// Maximum number of kept status messages.
    max_status: usize,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
            max_status: 5,
        }
    }

    /// Adds a notification.
    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);

        // Drop the oldest status messages beyond the limit
        let status_count = self.status_messages().count();
        if status_count > self.max_status {
            let mut excess = status_count - self.max_status;
            self.notifications.retain(|n| {
                if excess > 0 && n.notification_type == NotificationType::Status {
                    excess -= 1;
                    return false;
                }
                true
            });
        }
    }

    pub fn status(&mut self, message: impl Into<String>) {
        self.notify(Notification::new(message, NotificationType::Status));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(Notification::new(message, NotificationType::Error));
    }

    /// Adds one notification per bridge event.
    pub fn extend(&mut self, events: impl IntoIterator<Item = BridgeEvent>) {
        for event in events {
            self.notify(event.into());
        }
    }

    /// Removes expired status messages and returns whether anything is left.
    pub fn update(&mut self) -> bool {
        self.notifications.retain(|n| !n.is_expired());
        !self.notifications.is_empty()
    }

    fn status_messages(&self) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .filter(|n| n.notification_type == NotificationType::Status)
    }

    /// Returns the message for the status line: the latest status message.
    pub fn status_line(&self) -> Option<&str> {
        self.status_messages().last().map(|n| n.message.as_str())
    }

    /// Removes and returns the errors waiting for a dialog, oldest first.
    pub fn take_errors(&mut self) -> Vec<Notification> {
        let (errors, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.notifications)
            .into_iter()
            .partition(|n| n.notification_type == NotificationType::Error);
        self.notifications = rest;
        errors
    }

    pub fn has_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }
}
