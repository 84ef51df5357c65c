// User-facing outcome messages, queued for the host shell to display

use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Alert(String),
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Notification::Success(msg) | Notification::Alert(msg) => msg,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, Notification::Alert(_))
    }
}

#[derive(Debug, Default)]
pub struct Notifier {
    pending: Vec<Notification>,
}

impl Notifier {
    pub fn success(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(notification = %message, "Success");
        self.pending.push(Notification::Success(message));
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(notification = %message, "Alert");
        self.pending.push(Notification::Alert(message));
    }

    pub fn pending(&self) -> &[Notification] {
        &self.pending
    }

    /// Hand every queued notification to the caller, oldest first
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }
}
