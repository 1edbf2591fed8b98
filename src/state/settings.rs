//! Timer settings, phase durations and progress

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TimerError;

/// Which duration applies to the current countdown
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Focus)
    }

    /// Title of the notification shown when this phase ends
    pub fn completion_title(self) -> &'static str {
        match self {
            Phase::Focus => "Focus time completed!",
            Phase::ShortBreak => "Short break completed!",
            Phase::LongBreak => "Long break completed!",
        }
    }

    /// Body of the notification announcing this phase as the next one
    pub fn upcoming_message(self) -> &'static str {
        match self {
            Phase::Focus => "Ready to focus again?",
            Phase::ShortBreak => "Time for a short break!",
            Phase::LongBreak => "Time for a long break!",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Focus
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        };
        write!(f, "{label}")
    }
}

/// User-configurable timer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    /// Focus phase length in seconds
    pub focus_duration: u64,
    /// Short break length in seconds
    pub short_break_duration: u64,
    /// Long break length in seconds
    pub long_break_duration: u64,
    /// Every Nth completed focus phase is followed by a long break
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    pub alarm_enabled: bool,
    pub selected_alarm: String,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_duration: 25 * 60,
            short_break_duration: 5 * 60,
            long_break_duration: 15 * 60,
            long_break_interval: 4,
            auto_start_breaks: true,
            auto_start_pomodoros: true,
            alarm_enabled: true,
            selected_alarm: "Alarm Bell.mp3".to_string(),
        }
    }
}

/// Partial settings update; missing fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub focus_duration: Option<u64>,
    pub short_break_duration: Option<u64>,
    pub long_break_duration: Option<u64>,
    pub long_break_interval: Option<u32>,
    pub auto_start_breaks: Option<bool>,
    pub auto_start_pomodoros: Option<bool>,
    pub alarm_enabled: Option<bool>,
    pub selected_alarm: Option<String>,
}

impl TimerSettings {
    /// Configured duration of `phase` in seconds
    pub fn duration_for(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Focus => self.focus_duration,
            Phase::ShortBreak => self.short_break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }

    /// Completion percentage of `phase` given the seconds still remaining.
    ///
    /// Clamped to `[0, 100]`: a remaining value above the configured
    /// duration (settings shrank mid-phase) reads as 0.
    pub fn progress(&self, phase: Phase, remaining_seconds: u64) -> f64 {
        let total = self.duration_for(phase);
        if total == 0 {
            return 0.0;
        }
        let elapsed = total as f64 - remaining_seconds as f64;
        (elapsed / total as f64).clamp(0.0, 1.0) * 100.0
    }

    /// Whether the phase following `completed` starts without manual input
    pub fn auto_start_after(&self, completed: Phase) -> bool {
        match completed {
            Phase::Focus => self.auto_start_breaks,
            Phase::ShortBreak | Phase::LongBreak => self.auto_start_pomodoros,
        }
    }

    pub fn validate(&self) -> Result<(), TimerError> {
        let durations = [
            ("focusDuration", self.focus_duration),
            ("shortBreakDuration", self.short_break_duration),
            ("longBreakDuration", self.long_break_duration),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(TimerError::InvalidSettings(format!(
                "{name} must be greater than zero"
            )));
        }
        if self.long_break_interval == 0 {
            return Err(TimerError::InvalidSettings(
                "longBreakInterval must be at least 1".to_string(),
            ));
        }
        if self.selected_alarm.trim().is_empty() {
            return Err(TimerError::InvalidSettings(
                "selectedAlarm must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge `patch` into a copy of these settings, rejecting invalid results
    pub fn apply(&self, patch: SettingsPatch) -> Result<TimerSettings, TimerError> {
        let mut next = self.clone();
        if let Some(value) = patch.focus_duration {
            next.focus_duration = value;
        }
        if let Some(value) = patch.short_break_duration {
            next.short_break_duration = value;
        }
        if let Some(value) = patch.long_break_duration {
            next.long_break_duration = value;
        }
        if let Some(value) = patch.long_break_interval {
            next.long_break_interval = value;
        }
        if let Some(value) = patch.auto_start_breaks {
            next.auto_start_breaks = value;
        }
        if let Some(value) = patch.auto_start_pomodoros {
            next.auto_start_pomodoros = value;
        }
        if let Some(value) = patch.alarm_enabled {
            next.alarm_enabled = value;
        }
        if let Some(value) = patch.selected_alarm {
            next.selected_alarm = value;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Format seconds as `MM:SS`
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASES: [Phase; 3] = [Phase::Focus, Phase::ShortBreak, Phase::LongBreak];

    #[test]
    fn every_phase_resolves_to_a_positive_duration() {
        let settings = TimerSettings::default();
        for phase in PHASES {
            assert!(settings.duration_for(phase) > 0, "{phase} had zero duration");
        }
        assert_eq!(settings.duration_for(Phase::ShortBreak), 300);
    }

    #[test]
    fn progress_spans_zero_to_one_hundred() {
        let settings = TimerSettings::default();
        for phase in PHASES {
            let total = settings.duration_for(phase);
            assert_eq!(settings.progress(phase, total), 0.0);
            assert_eq!(settings.progress(phase, 0), 100.0);
            for remaining in [1, total / 3, total / 2, total - 1] {
                let pct = settings.progress(phase, remaining);
                assert!((0.0..=100.0).contains(&pct));
            }
        }
        assert_eq!(settings.progress(Phase::Focus, 750), 50.0);
    }

    #[test]
    fn progress_clamps_when_remaining_exceeds_duration() {
        let settings = TimerSettings {
            focus_duration: 600,
            ..TimerSettings::default()
        };
        assert_eq!(settings.progress(Phase::Focus, 1500), 0.0);
    }

    #[test]
    fn apply_rejects_zero_durations_and_keeps_prior_values() {
        let settings = TimerSettings::default();
        let err = settings
            .apply(SettingsPatch {
                short_break_duration: Some(0),
                ..SettingsPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, TimerError::InvalidSettings(msg) if msg.contains("shortBreakDuration")));

        let err = settings
            .apply(SettingsPatch {
                long_break_interval: Some(0),
                ..SettingsPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, TimerError::InvalidSettings(_)));
        assert_eq!(settings, TimerSettings::default());
    }

    #[test]
    fn apply_merges_only_present_fields() {
        let settings = TimerSettings::default();
        let next = settings
            .apply(SettingsPatch {
                focus_duration: Some(600),
                auto_start_breaks: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(next.focus_duration, 600);
        assert!(!next.auto_start_breaks);
        assert_eq!(next.long_break_duration, settings.long_break_duration);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults_when_deserializing() {
        let settings: TimerSettings =
            serde_json::from_str(r#"{"focusDuration": 1200, "alarmEnabled": false}"#).unwrap();
        assert_eq!(settings.focus_duration, 1200);
        assert!(!settings.alarm_enabled);
        assert_eq!(settings.selected_alarm, "Alarm Bell.mp3");
        assert_eq!(settings.long_break_interval, 4);
    }

    #[test]
    fn clock_formatting_pads_minutes_and_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
    }
}
