//! Alarm playback and background focus music

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    process::{Child, Command},
    runtime::Handle,
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::error::AudioError;

/// One-shot sound playback (alarm)
pub trait AudioPlayer: Send + Sync {
    fn play(&self, asset: &str) -> Result<(), AudioError>;
}

/// Looping background music with volume fades
pub trait MusicPlayer: Send + Sync {
    fn is_playing(&self) -> bool;

    fn play(&self) -> Result<(), AudioError>;

    fn pause(&self);

    /// Ramp the volume down to silence, then pause
    fn fade_out(&self);

    /// Start playback silent and ramp up to the target volume
    fn fade_in(&self) -> Result<(), AudioError>;
}

/// Plays assets by spawning an external player, e.g. `paplay <asset>`.
///
/// Music volume is passed as `--volume=<0..65536>` (the `paplay` scale).
#[derive(Debug, Clone)]
pub struct CommandAudioPlayer {
    program: String,
    assets_dir: PathBuf,
}

impl CommandAudioPlayer {
    pub fn new(program: impl Into<String>, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            assets_dir: assets_dir.into(),
        }
    }

    fn spawn(&self, asset: &str, volume: Option<f32>) -> Result<Child, AudioError> {
        let path = self.assets_dir.join(asset);
        if !path.is_file() {
            return Err(AudioError::MissingAsset(path.display().to_string()));
        }
        let mut command = Command::new(&self.program);
        if let Some(volume) = volume {
            command.arg(volume_arg(volume));
        }
        debug!("Spawning {} {}", self.program, path.display());
        let child = command
            .arg(&path)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

fn volume_arg(volume: f32) -> String {
    format!("--volume={}", (volume.clamp(0.0, 1.0) * 65536.0).round() as u32)
}

impl AudioPlayer for CommandAudioPlayer {
    fn play(&self, asset: &str) -> Result<(), AudioError> {
        let mut child = self.spawn(asset, None)?;
        let asset = asset.to_string();
        // Reap the player in the background so playback never blocks the caller
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => warn!("Alarm {} exited with {}", asset, status),
                Ok(_) => debug!("Alarm {} finished", asset),
                Err(e) => warn!("Failed to wait for alarm {}: {}", asset, e),
            }
        });
        Ok(())
    }
}

/// Target volume reached by a fade-in
pub const MUSIC_VOLUME: f32 = 0.7;
const FADE_STEPS: u32 = 20;
/// A track that ends sooner than this means the player itself failed
const MIN_TRACK_RUN: Duration = Duration::from_secs(1);

/// Volume levels visited by a fade from `from` to `to`, ending exactly at `to`
pub fn fade_levels(from: f32, to: f32, steps: u32) -> Vec<f32> {
    let steps = steps.max(1);
    let step = (to - from) / steps as f32;
    (1..=steps)
        .map(|i| if i == steps { to } else { (from + step * i as f32).clamp(0.0, 1.0) })
        .collect()
}

#[derive(Default)]
struct MusicState {
    playing: bool,
    volume: f32,
    /// Bumped whenever the playback task is replaced or stopped
    generation: u64,
    playback: Option<JoinHandle<()>>,
    fade: Option<JoinHandle<()>>,
}

/// Background music handle, owned by the application root and shared by reference.
///
/// The track loops until paused. The spawned player only takes a volume at
/// launch, so every fade step relaunches it at the new level.
#[derive(Clone)]
pub struct FocusMusic {
    player: CommandAudioPlayer,
    track: String,
    fade_out_duration: Duration,
    fade_in_duration: Duration,
    state: Arc<Mutex<MusicState>>,
}

fn lock_state(state: &Mutex<MusicState>) -> MutexGuard<'_, MusicState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl FocusMusic {
    pub fn new(player: CommandAudioPlayer, track: impl Into<String>) -> Self {
        Self {
            player,
            track: track.into(),
            fade_out_duration: Duration::from_secs(5),
            fade_in_duration: Duration::from_secs(2),
            state: Arc::new(Mutex::new(MusicState {
                volume: MUSIC_VOLUME,
                ..MusicState::default()
            })),
        }
    }

    pub fn volume(&self) -> f32 {
        lock_state(&self.state).volume
    }

    /// (Re)start the looping player at the current volume
    fn launch(&self, state: &mut MusicState) -> Result<(), AudioError> {
        let runtime = Handle::try_current().map_err(|_| AudioError::NoRuntime)?;
        if let Some(previous) = state.playback.take() {
            previous.abort();
        }
        state.generation += 1;
        let child = match self.player.spawn(&self.track, Some(state.volume)) {
            Ok(child) => child,
            Err(e) => {
                state.playing = false;
                return Err(e);
            }
        };
        state.playing = true;
        state.playback = Some(runtime.spawn(loop_track(
            self.player.clone(),
            self.track.clone(),
            Arc::clone(&self.state),
            state.generation,
            child,
        )));
        Ok(())
    }

    /// Replace any running fade with a ramp to `target`
    fn start_fade(&self, target: f32, duration: Duration, pause_at_end: bool) {
        let mut state = lock_state(&self.state);
        if let Some(fade) = state.fade.take() {
            fade.abort();
        }
        let levels = fade_levels(state.volume, target, FADE_STEPS);
        let interval = (duration / FADE_STEPS).max(Duration::from_millis(1));

        let Ok(runtime) = Handle::try_current() else {
            state.volume = target;
            if pause_at_end {
                stop_playback(&mut state);
            }
            return;
        };

        let music = self.clone();
        state.fade = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            let last = levels.len().saturating_sub(1);
            for (i, level) in levels.into_iter().enumerate() {
                ticker.tick().await;
                let mut state = lock_state(&music.state);
                state.volume = level;
                if i == last && pause_at_end {
                    stop_playback(&mut state);
                    debug!("Music faded out");
                } else if state.playing {
                    if let Err(e) = music.launch(&mut state) {
                        warn!("Music stopped during fade: {}", e);
                        break;
                    }
                }
            }
        }));
    }
}

/// Keep the track looping until this playback generation is replaced
async fn loop_track(
    player: CommandAudioPlayer,
    track: String,
    state: Arc<Mutex<MusicState>>,
    generation: u64,
    mut child: Child,
) {
    loop {
        let started = Instant::now();
        let status = child.wait().await;
        let ran_long_enough = started.elapsed() >= MIN_TRACK_RUN;

        let mut guard = lock_state(&state);
        if guard.generation != generation {
            return;
        }
        match status {
            Ok(status) if status.success() && ran_long_enough => {}
            Ok(status) => {
                warn!("Music player exited early with {}", status);
                guard.playing = false;
                return;
            }
            Err(e) => {
                warn!("Failed to wait for music player: {}", e);
                guard.playing = false;
                return;
            }
        }
        match player.spawn(&track, Some(guard.volume)) {
            Ok(next) => child = next,
            Err(e) => {
                warn!("Failed to loop music: {}", e);
                guard.playing = false;
                return;
            }
        }
    }
}

fn stop_playback(state: &mut MusicState) {
    state.playing = false;
    state.generation += 1;
    // Dropping the task drops its child, which is killed on drop
    if let Some(playback) = state.playback.take() {
        playback.abort();
    }
}

impl MusicPlayer for FocusMusic {
    fn is_playing(&self) -> bool {
        lock_state(&self.state).playing
    }

    fn play(&self) -> Result<(), AudioError> {
        let mut state = lock_state(&self.state);
        if state.playing {
            return Ok(());
        }
        if state.volume == 0.0 {
            state.volume = MUSIC_VOLUME;
        }
        self.launch(&mut state)?;
        info!("Music started: {}", self.track);
        Ok(())
    }

    fn pause(&self) {
        let mut state = lock_state(&self.state);
        if let Some(fade) = state.fade.take() {
            fade.abort();
        }
        stop_playback(&mut state);
    }

    fn fade_out(&self) {
        {
            let state = lock_state(&self.state);
            if !state.playing || state.volume == 0.0 {
                return;
            }
        }
        info!("Fading music out");
        self.start_fade(0.0, self.fade_out_duration, true);
    }

    fn fade_in(&self) -> Result<(), AudioError> {
        {
            let mut state = lock_state(&self.state);
            if !state.playing {
                state.volume = 0.0;
                self.launch(&mut state)?;
            }
        }
        info!("Fading music in");
        self.start_fade(MUSIC_VOLUME, self.fade_in_duration, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_levels_end_exactly_at_the_target() {
        let down = fade_levels(0.7, 0.0, 20);
        assert_eq!(down.len(), 20);
        assert_eq!(*down.last().unwrap(), 0.0);
        assert!(down.windows(2).all(|w| w[0] >= w[1]));

        let up = fade_levels(0.0, MUSIC_VOLUME, 20);
        assert_eq!(*up.last().unwrap(), MUSIC_VOLUME);
        assert!(up.iter().all(|v| (0.0..=MUSIC_VOLUME).contains(v)));
    }

    #[test]
    fn missing_assets_are_reported_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let player = CommandAudioPlayer::new("paplay", dir.path());
        assert!(matches!(
            player.play("Alarm Bell.mp3"),
            Err(AudioError::MissingAsset(_))
        ));
    }

    fn track_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("focus.mp3"), b"").unwrap();
        dir
    }

    /// Player script that logs its volume argument and then runs `body`
    #[cfg(unix)]
    fn logging_player(dir: &tempfile::TempDir, body: &str) -> (CommandAudioPlayer, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.path().join("runs.log");
        let script = dir.path().join("player.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$1\" >> '{}'\n{}\n", log.display(), body),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (
            CommandAudioPlayer::new(script.to_string_lossy(), dir.path()),
            log,
        )
    }

    fn logged_volumes(log: &PathBuf) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn volume_uses_the_paplay_scale() {
        assert_eq!(volume_arg(0.0), "--volume=0");
        assert_eq!(volume_arg(MUSIC_VOLUME), "--volume=45875");
        assert_eq!(volume_arg(2.0), "--volume=65536");
    }

    #[tokio::test]
    async fn exited_player_is_no_longer_reported_as_playing() {
        let dir = track_dir();
        let music = FocusMusic::new(CommandAudioPlayer::new("true", dir.path()), "focus.mp3");
        music.play().unwrap();
        assert!(music.is_playing());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!music.is_playing());

        music.play().unwrap();
        assert!(music.is_playing());
        music.pause();
        assert!(!music.is_playing());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn track_loops_at_the_music_volume() {
        let dir = track_dir();
        let (player, log) = logging_player(&dir, "sleep 1.1");
        let music = FocusMusic::new(player, "focus.mp3");
        music.play().unwrap();

        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert!(music.is_playing());
        music.pause();

        let runs = logged_volumes(&log);
        assert!(runs.len() >= 2, "track did not loop: {:?}", runs);
        assert!(runs.iter().all(|arg| arg == "--volume=45875"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fade_in_relaunches_the_player_at_rising_volume() {
        let dir = track_dir();
        let (player, log) = logging_player(&dir, "sleep 30");
        let music = FocusMusic::new(player, "focus.mp3");
        music.fade_in().unwrap();
        assert_eq!(music.volume(), 0.0);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(music.volume(), MUSIC_VOLUME);
        assert!(music.is_playing());
        music.pause();

        let runs = logged_volumes(&log);
        assert_eq!(runs.first().map(String::as_str), Some("--volume=0"));
        assert_eq!(runs.last().map(String::as_str), Some("--volume=45875"));
        assert!(runs.len() > 2);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn fade_out_ends_stopped_at_zero_volume() {
        let dir = track_dir();
        let (player, _) = logging_player(&dir, "sleep 30");
        let music = FocusMusic::new(player, "focus.mp3");
        music.play().unwrap();

        music.fade_out();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!music.is_playing());
        assert_eq!(music.volume(), 0.0);

        music.play().unwrap();
        assert_eq!(music.volume(), MUSIC_VOLUME);
        music.pause();
    }

    #[test]
    fn fade_out_is_a_no_op_when_nothing_plays() {
        let dir = tempfile::tempdir().unwrap();
        let music = FocusMusic::new(CommandAudioPlayer::new("paplay", dir.path()), "ambient.mp3");
        music.fade_out();
        assert!(!music.is_playing());
        assert_eq!(music.volume(), MUSIC_VOLUME);
    }
}
