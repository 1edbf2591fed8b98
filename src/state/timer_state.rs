//! Timer runtime state and the wall-clock anchored countdown

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use super::{Phase, TimerSettings};

/// Running status of the countdown, independent of phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    Idle,
    Running,
    Paused,
    Finished,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Running => "running",
            Lifecycle::Paused => "paused",
            Lifecycle::Finished => "finished",
        };
        write!(f, "{label}")
    }
}

/// Live machine state, persisted after every mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerRuntimeState {
    pub phase: Phase,
    pub lifecycle: Lifecycle,
    pub time_remaining_seconds: u64,
    pub completed_focus_count: u32,
    /// When the current running interval was (re)started
    pub anchor_wall_clock: Option<DateTime<Utc>>,
    /// Remaining seconds at `anchor_wall_clock`
    pub snapshot_remaining: Option<u64>,
    pub last_persisted_at: DateTime<Utc>,
    /// Set once the completion for the current `finished` state was claimed
    #[serde(default)]
    pub completion_dispatched: bool,
}

impl TimerRuntimeState {
    /// Idle focus phase at full duration
    pub fn fresh(settings: &TimerSettings, now: DateTime<Utc>) -> Self {
        Self::idle_at(Phase::Focus, 0, settings, now)
    }

    pub fn idle_at(
        phase: Phase,
        completed_focus_count: u32,
        settings: &TimerSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            phase,
            lifecycle: Lifecycle::Idle,
            time_remaining_seconds: settings.duration_for(phase),
            completed_focus_count,
            anchor_wall_clock: None,
            snapshot_remaining: None,
            last_persisted_at: now,
            completion_dispatched: false,
        }
    }

    /// Start measuring a running interval from `now`
    pub fn anchor(&mut self, remaining_seconds: u64, now: DateTime<Utc>) {
        self.anchor_wall_clock = Some(now);
        self.snapshot_remaining = Some(remaining_seconds);
        self.time_remaining_seconds = remaining_seconds;
    }

    pub fn clear_anchor(&mut self) {
        self.anchor_wall_clock = None;
        self.snapshot_remaining = None;
    }

    /// Remaining seconds derived from the anchor, never from tick counts
    pub fn current_remaining(&self, now: DateTime<Utc>) -> u64 {
        if self.lifecycle != Lifecycle::Running {
            return self.time_remaining_seconds;
        }
        match (self.anchor_wall_clock, self.snapshot_remaining) {
            (Some(anchor), Some(snapshot)) => {
                snapshot.saturating_sub(elapsed_whole_seconds(anchor, now))
            }
            _ => self.time_remaining_seconds,
        }
    }

    /// Rebuild live state from a persisted snapshot.
    ///
    /// Only a `running` snapshot advances on its own; it may come back as
    /// `finished` if the countdown expired while nothing was running.
    pub fn rehydrate(
        stored: TimerRuntimeState,
        settings: &TimerSettings,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Self {
        if stored.lifecycle != Lifecycle::Running {
            return stored;
        }

        let since_persist = now.signed_duration_since(stored.last_persisted_at);
        if since_persist > stale_after {
            info!(
                phase = %stored.phase,
                age_secs = since_persist.num_seconds(),
                "persisted timer is stale, starting idle"
            );
            return Self::idle_at(stored.phase, stored.completed_focus_count, settings, now);
        }

        let remaining = match (stored.anchor_wall_clock, stored.snapshot_remaining) {
            (Some(anchor), Some(snapshot)) => {
                snapshot.saturating_sub(elapsed_whole_seconds(anchor, now))
            }
            _ => stored
                .time_remaining_seconds
                .saturating_sub(elapsed_whole_seconds(stored.last_persisted_at, now)),
        };

        let mut state = stored;
        state.last_persisted_at = now;
        if remaining == 0 {
            info!(phase = %state.phase, "timer expired while unloaded");
            state.lifecycle = Lifecycle::Finished;
            state.time_remaining_seconds = 0;
            state.completion_dispatched = false;
            state.clear_anchor();
        } else {
            info!(phase = %state.phase, remaining, "resuming running timer");
            state.anchor(remaining, now);
        }
        state
    }

    /// Parse and rehydrate a stored JSON snapshot, falling back to a fresh
    /// idle state when it cannot be read.
    pub fn restore(
        raw: Option<&str>,
        settings: &TimerSettings,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Self {
        let Some(raw) = raw else {
            return Self::fresh(settings, now);
        };
        match serde_json::from_str::<TimerRuntimeState>(raw) {
            Ok(stored) => Self::rehydrate(stored, settings, now, stale_after),
            Err(e) => {
                warn!(error = %e, "persisted timer state is corrupt, starting fresh");
                Self::fresh(settings, now)
            }
        }
    }
}

/// Whole seconds from `from` to `to`; a backwards clock counts as zero
fn elapsed_whole_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from(to.signed_duration_since(from).num_seconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn running(remaining: u64) -> TimerRuntimeState {
        let settings = TimerSettings::default();
        let mut state = TimerRuntimeState::fresh(&settings, t0());
        state.lifecycle = Lifecycle::Running;
        state.anchor(remaining, t0());
        state
    }

    fn stale_after() -> Duration {
        Duration::hours(6)
    }

    #[test]
    fn current_remaining_uses_wall_clock_delta() {
        let state = running(1500);
        assert_eq!(state.current_remaining(t0()), 1500);
        assert_eq!(state.current_remaining(t0() + Duration::milliseconds(999)), 1500);
        assert_eq!(state.current_remaining(t0() + Duration::seconds(61)), 1439);
        assert_eq!(state.current_remaining(t0() + Duration::seconds(4000)), 0);
    }

    #[test]
    fn current_remaining_ignores_backwards_clock() {
        let state = running(300);
        assert_eq!(state.current_remaining(t0() - Duration::seconds(30)), 300);
    }

    #[test]
    fn rehydrate_past_the_deadline_finishes() {
        let remaining = 1200;
        let state = TimerRuntimeState::rehydrate(
            running(remaining),
            &TimerSettings::default(),
            t0() + Duration::seconds(remaining as i64 + 5),
            stale_after(),
        );
        assert_eq!(state.lifecycle, Lifecycle::Finished);
        assert_eq!(state.time_remaining_seconds, 0);
        assert!(!state.completion_dispatched);
        assert!(state.anchor_wall_clock.is_none());
    }

    #[test]
    fn rehydrate_midway_keeps_running_and_reanchors() {
        let remaining = 1200;
        let now = t0() + Duration::seconds(remaining as i64 / 2);
        let state = TimerRuntimeState::rehydrate(
            running(remaining),
            &TimerSettings::default(),
            now,
            stale_after(),
        );
        assert_eq!(state.lifecycle, Lifecycle::Running);
        assert!(state.time_remaining_seconds.abs_diff(remaining / 2) <= 1);
        assert_eq!(state.anchor_wall_clock, Some(now));
        assert_eq!(state.snapshot_remaining, Some(state.time_remaining_seconds));
    }

    #[test]
    fn rehydrate_without_anchor_measures_from_last_persist() {
        let mut stored = running(600);
        stored.clear_anchor();
        let state = TimerRuntimeState::rehydrate(
            stored,
            &TimerSettings::default(),
            t0() + Duration::seconds(100),
            stale_after(),
        );
        assert_eq!(state.lifecycle, Lifecycle::Running);
        assert_eq!(state.time_remaining_seconds, 500);
    }

    #[test]
    fn rehydrate_restores_paused_state_verbatim() {
        let settings = TimerSettings::default();
        let mut stored = TimerRuntimeState::fresh(&settings, t0());
        stored.lifecycle = Lifecycle::Paused;
        stored.time_remaining_seconds = 900;
        stored.completed_focus_count = 2;
        let state = TimerRuntimeState::rehydrate(
            stored.clone(),
            &settings,
            t0() + Duration::hours(30),
            stale_after(),
        );
        assert_eq!(state, stored);
    }

    #[test]
    fn rehydrate_abandons_stale_running_sessions() {
        let settings = TimerSettings::default();
        let mut stored = running(300);
        stored.phase = Phase::ShortBreak;
        stored.completed_focus_count = 3;
        let state = TimerRuntimeState::rehydrate(
            stored,
            &settings,
            t0() + Duration::hours(7),
            stale_after(),
        );
        assert_eq!(state.lifecycle, Lifecycle::Idle);
        assert_eq!(state.phase, Phase::ShortBreak);
        assert_eq!(state.time_remaining_seconds, settings.short_break_duration);
        assert_eq!(state.completed_focus_count, 3);
    }

    #[test]
    fn restore_falls_back_to_fresh_state_on_corrupt_json() {
        let settings = TimerSettings::default();
        let state = TimerRuntimeState::restore(Some("{not json"), &settings, t0(), stale_after());
        assert_eq!(state, TimerRuntimeState::fresh(&settings, t0()));
    }

    #[test]
    fn serialized_shape_is_flat_camel_case() {
        let value = serde_json::to_value(running(42)).unwrap();
        assert_eq!(value["lifecycle"], "running");
        assert_eq!(value["phase"], "focus");
        assert_eq!(value["snapshotRemaining"], 42);
        assert!(value.get("lastPersistedAt").is_some());
    }
}
