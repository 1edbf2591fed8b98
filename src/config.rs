//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::state::EngineOptions;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "focus-timer")]
#[command(about = "A persisted Pomodoro timer daemon with an HTTP control surface")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding the persisted settings, timer state, tasks and streak
    #[arg(long, default_value = "./focus-timer-data")]
    pub data_dir: PathBuf,

    /// Countdown refresh period in milliseconds
    #[arg(long, default_value = "500")]
    pub tick_ms: u64,

    /// Delay before an auto-started phase begins, in milliseconds
    #[arg(long, default_value = "1500")]
    pub advance_delay_ms: u64,

    /// Running timers persisted longer ago than this are abandoned on start
    #[arg(long, default_value = "6")]
    pub stale_after_hours: i64,

    /// Directory containing alarm sounds and music tracks
    #[arg(long, default_value = "./sounds")]
    pub assets_dir: PathBuf,

    /// Program used to play sounds; receives the asset path
    #[arg(long, default_value = "paplay")]
    pub audio_command: String,

    /// Program used to show desktop notifications; empty to only log them
    #[arg(long, default_value = "notify-send")]
    pub notify_command: String,

    /// Background music track inside the assets directory
    #[arg(long, default_value = "focus-music.mp3")]
    pub music_track: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Timing options for the engine; zero tick periods are bumped to 1ms
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            advance_delay: Duration::from_millis(self.advance_delay_ms),
            stale_after: chrono::TimeDelta::try_hours(self.stale_after_hours.max(0))
                .unwrap_or_else(|| EngineOptions::default().stale_after),
        }
    }
}
