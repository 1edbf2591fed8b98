//! Events broadcast to connected clients

use serde::Serialize;

use super::{Phase, TimerSnapshot};

/// User-visible timer events (the in-page toast stream)
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    #[serde(rename_all = "camelCase")]
    StateChanged { timer: TimerSnapshot },
    #[serde(rename_all = "camelCase")]
    PhaseCompleted {
        completed: Phase,
        next: Phase,
        title: String,
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    TaskCompleted { task_id: String, title: String },
    #[serde(rename_all = "camelCase")]
    StreakMilestone { days: u32 },
}

impl TimerEvent {
    /// Name used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::StateChanged { .. } => "stateChanged",
            TimerEvent::PhaseCompleted { .. } => "phaseCompleted",
            TimerEvent::TaskCompleted { .. } => "taskCompleted",
            TimerEvent::StreakMilestone { .. } => "streakMilestone",
        }
    }
}
