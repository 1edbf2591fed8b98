//! Main application state management

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::{
    CompletionReport, Lifecycle, Phase, SettingsPatch, TimerEngine, TimerEvent,
    TimerRuntimeState, TimerSettings, TimerSnapshot,
};
use crate::{
    error::TimerError,
    services::{
        AudioPlayer, CompletionDispatcher, DispatchOutcome, MusicPlayer, Notifier, StreakTracker,
        TaskBoard,
    },
    storage::{load_json, save_json, KeyValueStore, TIMER_SETTINGS_KEY, TIMER_STATE_KEY},
    utils::Clock,
};

/// Timing knobs of the engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How often a running countdown is re-derived from the anchor
    pub tick_interval: Duration,
    /// Pause in `finished` before an auto-started phase begins
    pub advance_delay: Duration,
    /// Running snapshots older than this are abandoned on load
    pub stale_after: chrono::Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            advance_delay: Duration::from_millis(1500),
            stale_after: chrono::Duration::hours(6),
        }
    }
}

/// Collaborators the timer calls into, built once by the application root
#[derive(Clone)]
pub struct Collaborators {
    pub music: Arc<dyn MusicPlayer>,
    pub alarm: Arc<dyn AudioPlayer>,
    pub notifier: Arc<dyn Notifier>,
    pub tasks: Arc<TaskBoard>,
    pub streak: Arc<StreakTracker>,
}

/// Main application state that owns the timer engine and its collaborators
pub struct AppState {
    /// The phase state machine; never held across an await
    engine: Mutex<TimerEngine>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    dispatcher: CompletionDispatcher,
    /// Settings changed but not yet written successfully
    settings_dirty: AtomicBool,
    pub options: EngineOptions,
    pub music: Arc<dyn MusicPlayer>,
    pub tasks: Arc<TaskBoard>,
    pub streak: Arc<StreakTracker>,
    /// Server metadata
    pub start_time: Instant,
    /// Last action tracking
    pub last_action: Mutex<Option<(String, DateTime<Utc>)>>,
    /// User-visible events (toasts)
    pub events_tx: broadcast::Sender<TimerEvent>,
    /// Latest timer snapshot; the ticker watches it for lifecycle changes
    pub timer_update_tx: watch::Sender<TimerSnapshot>,
    /// Keep the receiver alive to prevent channel closure
    pub _timer_update_rx: watch::Receiver<TimerSnapshot>,
}

impl AppState {
    /// Load settings and runtime state from `store` and rehydrate the timer
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
        options: EngineOptions,
    ) -> Self {
        let now = clock.now();
        let settings = load_settings(store.as_ref());
        let raw_state = store.get(TIMER_STATE_KEY).unwrap_or_else(|e| {
            warn!("Failed to read timer state, starting fresh: {}", e);
            None
        });
        let runtime =
            TimerRuntimeState::restore(raw_state.as_deref(), &settings, now, options.stale_after);
        info!(
            phase = %runtime.phase,
            lifecycle = %runtime.lifecycle,
            remaining = runtime.time_remaining_seconds,
            completed = runtime.completed_focus_count,
            "timer state loaded"
        );

        let engine = TimerEngine::new(settings, runtime);
        let snapshot = engine.snapshot(now);
        let (events_tx, _) = broadcast::channel(100);
        let (timer_update_tx, timer_update_rx) = watch::channel(snapshot);

        let dispatcher = CompletionDispatcher::new(
            collaborators.music.clone(),
            collaborators.alarm,
            collaborators.notifier,
            collaborators.streak.clone(),
            collaborators.tasks.clone(),
            events_tx.clone(),
        );

        let state = Self {
            engine: Mutex::new(engine),
            store,
            clock,
            dispatcher,
            settings_dirty: AtomicBool::new(true),
            options,
            music: collaborators.music,
            tasks: collaborators.tasks,
            streak: collaborators.streak,
            start_time: Instant::now(),
            last_action: Mutex::new(None),
            events_tx,
            timer_update_tx,
            _timer_update_rx: timer_update_rx,
        };
        {
            let mut guard = state.lock_engine();
            state.persist_locked(&mut guard, now);
        }
        state
    }

    fn lock_engine(&self) -> MutexGuard<'_, TimerEngine> {
        self.engine.lock().unwrap_or_else(|poisoned| {
            error!("Timer engine lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Write runtime state (and settings if a previous write failed).
    /// Called with the engine locked so writes land in mutation order.
    fn persist_locked(&self, engine: &mut TimerEngine, now: DateTime<Utc>) {
        if self.settings_dirty.load(Ordering::SeqCst) {
            match save_json(self.store.as_ref(), TIMER_SETTINGS_KEY, engine.settings()) {
                Ok(()) => self.settings_dirty.store(false, Ordering::SeqCst),
                Err(e) => warn!("Failed to save timer settings, will retry: {}", e),
            }
        }
        let runtime = engine.prepare_persist(now);
        if let Err(e) = save_json(self.store.as_ref(), TIMER_STATE_KEY, &runtime) {
            warn!("Failed to save timer state, will retry: {}", e);
        }
    }

    /// Apply a control operation, persist, and publish the new snapshot
    fn mutate<F>(&self, action: &str, op: F) -> Result<TimerSnapshot, TimerError>
    where
        F: FnOnce(&mut TimerEngine, DateTime<Utc>) -> Result<(), TimerError>,
    {
        let now = self.clock.now();
        let snapshot = {
            let mut engine = self.lock_engine();
            op(&mut *engine, now)?;
            self.persist_locked(&mut engine, now);
            engine.snapshot(now)
        };

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some((action.to_string(), now));
        }
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    fn publish(&self, snapshot: TimerSnapshot) {
        self.timer_update_tx.send_replace(snapshot.clone());
        if self
            .events_tx
            .send(TimerEvent::StateChanged { timer: snapshot })
            .is_err()
        {
            debug!("no event subscribers");
        }
    }

    pub fn start_timer(&self) -> Result<TimerSnapshot, TimerError> {
        self.mutate("start", |engine, now| engine.start(now))
    }

    pub fn pause_timer(&self) -> Result<TimerSnapshot, TimerError> {
        self.mutate("pause", |engine, now| engine.pause(now))
    }

    pub fn reset_timer(&self) -> Result<TimerSnapshot, TimerError> {
        self.mutate("reset", |engine, _| {
            engine.reset();
            Ok(())
        })
    }

    pub fn skip_timer(&self) -> Result<TimerSnapshot, TimerError> {
        self.mutate("skip", |engine, now| {
            engine.skip(now);
            Ok(())
        })
    }

    pub fn set_timer_mode(&self, phase: Phase) -> Result<TimerSnapshot, TimerError> {
        self.mutate("mode", |engine, _| {
            engine.set_mode(phase);
            Ok(())
        })
    }

    pub fn start_focus_from_beginning(&self) -> Result<TimerSnapshot, TimerError> {
        self.mutate("focus", |engine, now| {
            engine.start_focus_from_beginning(now);
            Ok(())
        })
    }

    /// Validate and apply a settings patch; invalid patches keep prior settings
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<TimerSettings, TimerError> {
        let mut settings = None;
        self.mutate("settings", |engine, _| {
            settings = Some(engine.update_settings(patch)?.clone());
            self.settings_dirty.store(true, Ordering::SeqCst);
            Ok(())
        })?;
        Ok(settings.unwrap_or_else(|| self.settings()))
    }

    pub fn settings(&self) -> TimerSettings {
        self.lock_engine().settings().clone()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let now = self.clock.now();
        self.lock_engine().snapshot(now)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lock_engine().lifecycle()
    }

    pub fn subscribe_timer(&self) -> watch::Receiver<TimerSnapshot> {
        self.timer_update_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.events_tx.subscribe()
    }

    /// Re-derive remaining time. When the countdown hits zero the completion
    /// is claimed under the same lock, so no control op can slip in between.
    pub fn tick(&self) -> Option<CompletionReport> {
        let now = self.clock.now();
        let (report, snapshot) = {
            let mut engine = self.lock_engine();
            if engine.lifecycle() != Lifecycle::Running {
                return None;
            }
            let before = engine.runtime().time_remaining_seconds;
            let report = match engine.tick(now) {
                Some(_) => engine.claim_completion(now),
                None => None,
            };
            let snapshot = engine.snapshot(now);
            if report.is_none() && snapshot.time_remaining_seconds == before {
                return None;
            }
            self.persist_locked(&mut engine, now);
            (report, snapshot)
        };
        self.publish(snapshot);
        report
    }

    /// Claim the pending completion, if any; at most one caller gets it
    pub fn claim_completion(&self) -> Option<CompletionReport> {
        let now = self.clock.now();
        let mut engine = self.lock_engine();
        let report = engine.claim_completion(now)?;
        self.persist_locked(&mut engine, now);
        Some(report)
    }

    /// Run the completion side effects for a claimed report
    pub fn dispatch_completion(&self, report: &CompletionReport) -> DispatchOutcome {
        self.dispatcher.dispatch(report)
    }

    /// Move past a finished phase unless a control op superseded it
    pub fn advance_after_completion(&self, epoch: u64) -> Option<TimerSnapshot> {
        let now = self.clock.now();
        let snapshot = {
            let mut engine = self.lock_engine();
            engine.advance_after_completion(epoch, now)?;
            self.persist_locked(&mut engine, now);
            engine.snapshot(now)
        };
        self.publish(snapshot.clone());
        Some(snapshot)
    }

    /// Finished state whose completion was already claimed before a restart
    pub fn claimed_finish_epoch(&self) -> Option<u64> {
        let engine = self.lock_engine();
        let runtime = engine.runtime();
        (runtime.lifecycle == Lifecycle::Finished && runtime.completion_dispatched)
            .then(|| engine.epoch())
    }

    /// Final persist on teardown; stops background music
    pub fn shutdown(&self) {
        let now = self.clock.now();
        {
            let mut engine = self.lock_engine();
            self.persist_locked(&mut engine, now);
        }
        self.music.pause();
        info!("Timer state saved");
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }
}

/// Stored settings merged over defaults; unreadable or invalid settings fall back
fn load_settings(store: &dyn KeyValueStore) -> TimerSettings {
    match load_json::<TimerSettings>(store, TIMER_SETTINGS_KEY) {
        Ok(Some(settings)) => match settings.validate() {
            Ok(()) => settings,
            Err(e) => {
                warn!("Stored settings rejected, using defaults: {}", e);
                TimerSettings::default()
            }
        },
        Ok(None) => TimerSettings::default(),
        Err(e) => {
            warn!("Failed to load timer settings, using defaults: {}", e);
            TimerSettings::default()
        }
    }
}
