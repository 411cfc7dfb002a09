//! Notification boundary
//!
//! The engine never talks to a platform notification facility directly;
//! it goes through the `Notifier` trait. Permission is queried once at
//! engine startup and must never block it.

use crate::error::Result;

/// Availability of the user-visible notification facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// No notification facility exists in this environment.
    Unsupported,
}

pub trait Notifier: Send + Sync {
    /// Current permission state. Queried once at startup.
    fn permission(&self) -> NotificationPermission;

    /// Show a user-visible alert with a title and body.
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Default notifier: reports deliveries through the log. Used where no
/// platform facility is wired up, and as the headless stand-in.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn notify(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!("Notification: {} - {}", title, body);
        Ok(())
    }
}
