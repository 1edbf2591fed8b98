//! State management module
//!
//! This module contains the timer settings, the persisted runtime state,
//! the phase state machine and the shared application state that wires
//! them to storage and collaborators.

pub mod settings;
pub mod timer_state;
pub mod machine;
pub mod events;
pub mod app_state;

// Re-export main types
pub use settings::{format_clock, Phase, SettingsPatch, TimerSettings};
pub use timer_state::{Lifecycle, TimerRuntimeState};
pub use machine::{Completion, CompletionReport, TimerEngine, TimerSnapshot};
pub use events::TimerEvent;
pub use app_state::{AppState, Collaborators, EngineOptions};
