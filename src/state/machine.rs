//! Phase state machine
//!
//! Owns the idle/running/paused/finished lifecycle and the focus → break →
//! focus cycling rule. Every transition takes the wall-clock `now` so the
//! machine itself never reads a clock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::{format_clock, Lifecycle, Phase, SettingsPatch, TimerRuntimeState, TimerSettings};
use crate::error::TimerError;

/// Read model of the timer handed to callers
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub lifecycle: Lifecycle,
    pub time_remaining_seconds: u64,
    pub display: String,
    pub progress: f64,
    pub completed_focus_count: u32,
    pub is_timer_active: bool,
}

/// Emitted when a running countdown reaches zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub phase: Phase,
    pub epoch: u64,
}

/// Everything the completion side effects need, captured under the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub completed: Phase,
    pub next: Phase,
    pub auto_start: bool,
    pub alarm: Option<String>,
    pub finished_at: DateTime<Utc>,
    pub epoch: u64,
}

impl CompletionReport {
    pub fn title(&self) -> &'static str {
        self.completed.completion_title()
    }

    pub fn body(&self) -> &'static str {
        self.next.upcoming_message()
    }
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: TimerSettings,
    runtime: TimerRuntimeState,
    /// Bumped by every control operation; cancels stale delayed advances
    epoch: u64,
}

impl TimerEngine {
    pub fn new(settings: TimerSettings, runtime: TimerRuntimeState) -> Self {
        Self {
            settings,
            runtime,
            epoch: 0,
        }
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn runtime(&self) -> &TimerRuntimeState {
        &self.runtime
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.runtime.lifecycle
    }

    pub fn phase(&self) -> Phase {
        self.runtime.phase
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let remaining = self.runtime.current_remaining(now);
        TimerSnapshot {
            phase: self.runtime.phase,
            lifecycle: self.runtime.lifecycle,
            time_remaining_seconds: remaining,
            display: format_clock(remaining),
            progress: self.settings.progress(self.runtime.phase, remaining),
            completed_focus_count: self.runtime.completed_focus_count,
            is_timer_active: self.runtime.lifecycle == Lifecycle::Running,
        }
    }

    /// Stamp the persistence time and hand back the state to write
    pub fn prepare_persist(&mut self, now: DateTime<Utc>) -> TimerRuntimeState {
        self.runtime.time_remaining_seconds = self.runtime.current_remaining(now);
        self.runtime.last_persisted_at = now;
        self.runtime.clone()
    }

    fn invalid(&self, action: &'static str) -> TimerError {
        TimerError::InvalidTransition {
            action,
            lifecycle: self.runtime.lifecycle,
            phase: self.runtime.phase,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        match self.runtime.lifecycle {
            Lifecycle::Idle | Lifecycle::Paused => {
                let remaining = self.runtime.time_remaining_seconds;
                self.epoch += 1;
                self.runtime.lifecycle = Lifecycle::Running;
                self.runtime.anchor(remaining, now);
                info!(phase = %self.runtime.phase, remaining, "timer started");
                Ok(())
            }
            Lifecycle::Running | Lifecycle::Finished => Err(self.invalid("start")),
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        if self.runtime.lifecycle != Lifecycle::Running {
            return Err(self.invalid("pause"));
        }
        let remaining = self.runtime.current_remaining(now);
        self.epoch += 1;
        self.runtime.lifecycle = Lifecycle::Paused;
        self.runtime.time_remaining_seconds = remaining;
        self.runtime.anchor_wall_clock = None;
        self.runtime.snapshot_remaining = Some(remaining);
        info!(phase = %self.runtime.phase, remaining, "timer paused");
        Ok(())
    }

    /// Back to idle at the full duration of the current phase
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.enter_idle(self.runtime.phase);
        info!(phase = %self.runtime.phase, "timer reset");
    }

    /// Switch phase manually; the countdown goes idle at the full duration
    pub fn set_mode(&mut self, phase: Phase) {
        self.epoch += 1;
        self.enter_idle(phase);
        info!(%phase, "timer mode changed");
    }

    pub fn start_focus_from_beginning(&mut self, now: DateTime<Utc>) {
        self.epoch += 1;
        self.enter_running(Phase::Focus, now);
        info!("focus started from the beginning");
    }

    /// Advance one phase without crediting the interval as completed
    pub fn skip(&mut self, now: DateTime<Utc>) -> Phase {
        let skipped = self.runtime.phase;
        self.epoch += 1;
        let next = self.next_phase_after(skipped);
        if self.settings.auto_start_after(skipped) {
            self.enter_running(next, now);
        } else {
            self.enter_idle(next);
        }
        info!(%skipped, %next, lifecycle = %self.runtime.lifecycle, "phase skipped");
        next
    }

    /// Recompute remaining time; enters `finished` when the countdown hits zero
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        if self.runtime.lifecycle != Lifecycle::Running {
            return None;
        }
        let remaining = self.runtime.current_remaining(now);
        self.runtime.time_remaining_seconds = remaining;
        if remaining > 0 {
            return None;
        }
        self.runtime.lifecycle = Lifecycle::Finished;
        self.runtime.completion_dispatched = false;
        self.runtime.clear_anchor();
        info!(phase = %self.runtime.phase, "countdown finished");
        Some(Completion {
            phase: self.runtime.phase,
            epoch: self.epoch,
        })
    }

    /// Hand out the completion of the current `finished` state at most once
    pub fn claim_completion(&mut self, now: DateTime<Utc>) -> Option<CompletionReport> {
        if self.runtime.lifecycle != Lifecycle::Finished || self.runtime.completion_dispatched {
            return None;
        }
        self.runtime.completion_dispatched = true;
        let completed = self.runtime.phase;
        Some(CompletionReport {
            completed,
            next: self.peek_next_phase(completed),
            auto_start: self.settings.auto_start_after(completed),
            alarm: self
                .settings
                .alarm_enabled
                .then(|| self.settings.selected_alarm.clone()),
            finished_at: now,
            epoch: self.epoch,
        })
    }

    /// Leave `finished` for the next phase, unless a control op intervened
    pub fn advance_after_completion(&mut self, epoch: u64, now: DateTime<Utc>) -> Option<Phase> {
        if self.runtime.lifecycle != Lifecycle::Finished || self.epoch != epoch {
            debug!(
                epoch,
                current = self.epoch,
                lifecycle = %self.runtime.lifecycle,
                "completion advance superseded"
            );
            return None;
        }
        let completed = self.runtime.phase;
        let next = self.next_phase_after(completed);
        self.epoch += 1;
        if self.settings.auto_start_after(completed) {
            self.enter_running(next, now);
        } else {
            self.enter_idle(next);
        }
        info!(%completed, %next, lifecycle = %self.runtime.lifecycle, "phase advanced");
        Some(next)
    }

    /// Replace settings; only an idle countdown picks up the new duration
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<&TimerSettings, TimerError> {
        let next = self.settings.apply(patch)?;
        self.settings = next;
        if self.runtime.lifecycle == Lifecycle::Idle {
            self.runtime.time_remaining_seconds = self.settings.duration_for(self.runtime.phase);
        }
        info!(lifecycle = %self.runtime.lifecycle, "timer settings updated");
        Ok(&self.settings)
    }

    fn peek_next_phase(&self, completed: Phase) -> Phase {
        match completed {
            Phase::Focus => {
                let count = self.runtime.completed_focus_count.saturating_add(1);
                if count % self.settings.long_break_interval.max(1) == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        }
    }

    fn next_phase_after(&mut self, completed: Phase) -> Phase {
        let next = self.peek_next_phase(completed);
        if completed == Phase::Focus {
            self.runtime.completed_focus_count = self.runtime.completed_focus_count.saturating_add(1);
        }
        next
    }

    fn enter_idle(&mut self, phase: Phase) {
        self.runtime.phase = phase;
        self.runtime.lifecycle = Lifecycle::Idle;
        self.runtime.time_remaining_seconds = self.settings.duration_for(phase);
        self.runtime.completion_dispatched = false;
        self.runtime.clear_anchor();
    }

    fn enter_running(&mut self, phase: Phase, now: DateTime<Utc>) {
        let duration = self.settings.duration_for(phase);
        self.runtime.phase = phase;
        self.runtime.lifecycle = Lifecycle::Running;
        self.runtime.completion_dispatched = false;
        self.runtime.anchor(duration, now);
    }
}
