//! Focus Timer - A persisted Pomodoro timer daemon
//! 
//! This library provides a focus/short-break/long-break timer whose
//! countdown is anchored to the wall clock and survives restarts, plus the
//! side effects fired when a phase completes (alarm, notification, streak
//! and task credit) and an HTTP surface to drive it.

pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
