//! Collaborator services module
//!
//! This module contains the collaborators the timer calls into on phase
//! completion (audio, notifications, streaks, tasks) and the dispatcher
//! that drives them.

pub mod audio;
pub mod completion;
pub mod notifications;
pub mod streak;
pub mod tasks;

// Re-export main types
pub use audio::{AudioPlayer, CommandAudioPlayer, FocusMusic, MusicPlayer};
pub use completion::{CompletionDispatcher, DispatchOutcome, DispatchStep};
pub use notifications::{CommandNotifier, LogNotifier, NotificationMessage, NotificationRelay, Notifier};
pub use streak::{StreakData, StreakRecorder, StreakTracker, StreakUpdate};
pub use tasks::{Task, TaskBoard, TaskId, TaskProgress, TaskProvider};
