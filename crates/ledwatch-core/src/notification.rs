// ── Transient user notifications ──
//
// Outcomes the user should see briefly (registry results, validation
// messages, relay loss). Fan-out via broadcast; nobody listening is fine.

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

const NOTIFICATION_CHANNEL_SIZE: usize = 64;

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub at: DateTime<Local>,
}

impl Notification {
    pub fn new(level: NotificationLevel, msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level,
            at: Local::now(),
        }
    }

    pub fn success(msg: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, msg)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, msg)
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, msg)
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, msg)
    }
}

/// Broadcast sender for [`Notification`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn notify(&self, notification: Notification) {
        tracing::debug!(level = ?notification.level, message = %notification.message, "notify");
        // No receivers is not an error.
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
