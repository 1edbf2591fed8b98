//! Side effects fired when a phase completes
//!
//! Each step runs on its own; a failing step is logged and recorded in the
//! outcome but never stops the steps after it.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{AudioPlayer, MusicPlayer, Notifier, StreakRecorder, TaskProvider};
use crate::state::{CompletionReport, Phase, TimerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    Alarm,
    Notification,
    Streak,
    Task,
}

/// What the dispatcher managed to do for one completion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub music_faded: bool,
    pub alarm_played: bool,
    pub notified: bool,
    pub streak_recorded: bool,
    pub task_credited: Option<String>,
    pub task_completed: Option<String>,
    pub failures: Vec<(DispatchStep, String)>,
}

impl DispatchOutcome {
    fn fail(&mut self, step: DispatchStep, error: impl std::fmt::Display) {
        warn!(?step, "completion step failed: {}", error);
        self.failures.push((step, error.to_string()));
    }
}

pub struct CompletionDispatcher {
    music: Arc<dyn MusicPlayer>,
    alarm: Arc<dyn AudioPlayer>,
    notifier: Arc<dyn Notifier>,
    streak: Arc<dyn StreakRecorder>,
    tasks: Arc<dyn TaskProvider>,
    events: broadcast::Sender<TimerEvent>,
}

impl CompletionDispatcher {
    pub fn new(
        music: Arc<dyn MusicPlayer>,
        alarm: Arc<dyn AudioPlayer>,
        notifier: Arc<dyn Notifier>,
        streak: Arc<dyn StreakRecorder>,
        tasks: Arc<dyn TaskProvider>,
        events: broadcast::Sender<TimerEvent>,
    ) -> Self {
        Self {
            music,
            alarm,
            notifier,
            streak,
            tasks,
            events,
        }
    }

    /// Run steps 1-4 for `report`; advancing the phase is left to the caller
    pub fn dispatch(&self, report: &CompletionReport) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        info!(completed = %report.completed, next = %report.next, "dispatching completion");

        if self.music.is_playing() {
            self.music.fade_out();
            outcome.music_faded = true;
        }

        if let Some(alarm) = &report.alarm {
            match self.alarm.play(alarm) {
                Ok(()) => outcome.alarm_played = true,
                Err(e) => outcome.fail(DispatchStep::Alarm, e),
            }
        }

        self.publish(TimerEvent::PhaseCompleted {
            completed: report.completed,
            next: report.next,
            title: report.title().to_string(),
            body: report.body().to_string(),
        });
        match self.notifier.notify(report.title(), report.body()) {
            Ok(()) => outcome.notified = true,
            Err(e) => outcome.fail(DispatchStep::Notification, e),
        }

        if report.completed == Phase::Focus {
            self.credit_streak(report, &mut outcome);
            self.credit_task(&mut outcome);
        }

        outcome
    }

    fn credit_streak(&self, report: &CompletionReport, outcome: &mut DispatchOutcome) {
        let day = report.finished_at.date_naive();
        match self.streak.record_completed_focus_session(day) {
            Ok(update) => {
                outcome.streak_recorded = update.newly_recorded;
                if let Some(days) = update.milestone {
                    info!(days, "streak milestone reached");
                    self.publish(TimerEvent::StreakMilestone { days });
                }
            }
            Err(e) => outcome.fail(DispatchStep::Streak, e),
        }
    }

    fn credit_task(&self, outcome: &mut DispatchOutcome) {
        let Some(task_id) = self.tasks.active_task_id() else {
            debug!("no active task to credit");
            return;
        };
        let progress = match self.tasks.increment_completed_pomodoros(&task_id) {
            Ok(progress) => progress,
            Err(e) => return outcome.fail(DispatchStep::Task, e),
        };
        outcome.task_credited = Some(task_id.clone());
        if !progress.reached_estimate() {
            return;
        }
        match self.tasks.mark_task_complete(&task_id) {
            Ok(()) => {
                outcome.task_completed = Some(task_id.clone());
                self.publish(TimerEvent::TaskCompleted {
                    task_id,
                    title: progress.title,
                });
            }
            Err(e) => outcome.fail(DispatchStep::Task, e),
        }
    }

    fn publish(&self, event: TimerEvent) {
        // No subscribers is normal when no client is listening
        if self.events.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}
