#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use chrono::{DateTime, TimeZone, Utc};
use focus_timer::{
    error::{AudioError, NotifyError},
    services::{AudioPlayer, MusicPlayer, Notifier, StreakTracker, TaskBoard},
    state::{AppState, Collaborators, EngineOptions},
    storage::{KeyValueStore, MemoryStore},
    utils::ManualClock,
};

#[derive(Default)]
pub struct RecordingAlarm {
    pub played: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl AudioPlayer for RecordingAlarm {
    fn play(&self, asset: &str) -> Result<(), AudioError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AudioError::MissingAsset(asset.to_string()));
        }
        self.played.lock().unwrap().push(asset.to_string());
        Ok(())
    }
}

impl RecordingAlarm {
    pub fn count(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::WorkerUnavailable);
        }
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMusic {
    pub playing: AtomicBool,
    pub fades_out: AtomicUsize,
}

impl MusicPlayer for FakeMusic {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn play(&self) -> Result<(), AudioError> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn fade_out(&self) {
        self.fades_out.fetch_add(1, Ordering::SeqCst);
        self.pause();
    }

    fn fade_in(&self) -> Result<(), AudioError> {
        self.play()
    }
}

/// Everything a test needs to poke at around one `AppState`
pub struct Harness {
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<ManualClock>,
    pub alarm: Arc<RecordingAlarm>,
    pub notifier: Arc<RecordingNotifier>,
    pub music: Arc<FakeMusic>,
    pub tasks: Arc<TaskBoard>,
    pub streak: Arc<StreakTracker>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(start_time())))
    }

    pub fn with_store(store: Arc<dyn KeyValueStore>, clock: Arc<ManualClock>) -> Self {
        Self {
            tasks: Arc::new(TaskBoard::load(store.clone())),
            streak: Arc::new(StreakTracker::load(store.clone())),
            store,
            clock,
            alarm: Arc::new(RecordingAlarm::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            music: Arc::new(FakeMusic::default()),
        }
    }

    /// A second process start against the same store and clock
    pub fn restart(&self) -> Self {
        Self::with_store(self.store.clone(), self.clock.clone())
    }

    pub fn app(&self) -> Arc<AppState> {
        Arc::new(AppState::load(
            self.store.clone(),
            self.clock.clone(),
            Collaborators {
                music: self.music.clone(),
                alarm: self.alarm.clone(),
                notifier: self.notifier.clone(),
                tasks: self.tasks.clone(),
                streak: self.streak.clone(),
            },
            EngineOptions::default(),
        ))
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }
}
