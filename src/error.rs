//! Error types shared across the crate

use thiserror::Error;

use crate::state::{Lifecycle, Phase};

/// Errors raised by the timer state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("invalid timer settings: {0}")]
    InvalidSettings(String),

    #[error("cannot {action} while the timer is {lifecycle} ({phase})")]
    InvalidTransition {
        action: &'static str,
        lifecycle: Lifecycle,
        phase: Phase,
    },
}

/// Errors raised by the key/value persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the task provider
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("estimated pomodoros must be at least 1")]
    InvalidEstimate,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised when a notification cannot be handed off
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification worker is unavailable")]
    WorkerUnavailable,

    #[error("notification queue is full")]
    QueueFull,

    #[error("failed to run notification command: {0}")]
    Command(#[from] std::io::Error),
}

/// Errors raised by the alarm and music backends
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio asset not found: {0}")]
    MissingAsset(String),

    #[error("failed to spawn audio player: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("music playback needs a running async runtime")]
    NoRuntime,
}
