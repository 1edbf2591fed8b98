//! System notifications
//!
//! The timer hands notifications to a background worker over a bounded
//! channel and never waits for delivery. The worker may be missing or
//! lagging; a dropped notification is logged and otherwise ignored.

use serde::Serialize;
use tokio::{process::Command, sync::mpsc};
use tracing::{debug, info, warn};

use crate::error::NotifyError;

/// Best-effort, fire-and-forget notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
}

/// Sending half of the worker channel
#[derive(Debug, Clone)]
pub struct NotificationRelay {
    tx: mpsc::Sender<NotificationMessage>,
}

impl NotificationRelay {
    /// Create a relay and the receiver the notification worker drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Notifier for NotificationRelay {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let message = NotificationMessage {
            title: title.to_string(),
            body: body.to_string(),
        };
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotifyError::WorkerUnavailable,
        })
    }
}

/// Shows desktop notifications through an external command (`notify-send`)
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    app_name: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            app_name: "focus-timer".to_string(),
        }
    }

    pub async fn show(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        debug!("Showing notification: {}", message.title);

        let output = Command::new(&self.program)
            .args(["--app-name", &self.app_name, &message.title, &message.body])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }
        Ok(())
    }
}

/// Notifier that only logs; used when no worker is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        info!(title, body, "notification");
        Ok(())
    }
}
