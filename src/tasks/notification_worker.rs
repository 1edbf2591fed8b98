//! Notification worker background task

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::{CommandNotifier, NotificationMessage};

/// Background task that shows queued notifications one at a time
pub async fn notification_worker_task(
    mut rx: mpsc::Receiver<NotificationMessage>,
    notifier: CommandNotifier,
) {
    info!("Starting notification worker task");

    while let Some(message) = rx.recv().await {
        if let Err(e) = notifier.show(&message).await {
            warn!("Failed to show notification '{}': {}", message.title, e);
        }
    }

    info!("Notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{NotificationRelay, Notifier};

    #[cfg(unix)]
    #[tokio::test]
    async fn worker_shows_every_queued_notification_then_stops() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("shown.log");
        let script = dir.path().join("notify.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$3|$4\" >> '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (relay, rx) = NotificationRelay::channel(8);
        let worker = tokio::spawn(notification_worker_task(
            rx,
            CommandNotifier::new(script.to_string_lossy()),
        ));

        relay
            .notify("Focus time completed!", "Time for a short break!")
            .unwrap();
        relay
            .notify("Short break completed!", "Ready to focus again?")
            .unwrap();
        drop(relay);
        worker.await.unwrap();

        let shown = std::fs::read_to_string(&log).unwrap();
        assert_eq!(
            shown.lines().collect::<Vec<_>>(),
            vec![
                "Focus time completed!|Time for a short break!",
                "Short break completed!|Ready to focus again?",
            ]
        );
    }

    #[tokio::test]
    async fn failing_command_does_not_stop_the_worker() {
        let (relay, rx) = NotificationRelay::channel(8);
        let worker = tokio::spawn(notification_worker_task(
            rx,
            CommandNotifier::new("/nonexistent/notify-send"),
        ));

        relay.notify("one", "first").unwrap();
        relay.notify("two", "second").unwrap();
        drop(relay);
        worker.await.unwrap();
    }
}
