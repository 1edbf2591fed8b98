//! Focus Timer - A persisted Pomodoro timer daemon
//! 
//! This is the main entry point for the focus-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use focus_timer::{
    api::create_router,
    config::Config,
    services::{
        CommandAudioPlayer, CommandNotifier, FocusMusic, LogNotifier, NotificationRelay,
        Notifier, StreakTracker, TaskBoard,
    },
    state::{AppState, Collaborators},
    storage::{JsonFileStore, KeyValueStore},
    tasks::{notification_worker_task, resume_after_restart, timer_ticker_task},
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("focus_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting focus-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_dir={}, tick={}ms",
        config.host,
        config.port,
        config.data_dir.display(),
        config.tick_ms
    );

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.data_dir)?);

    // Notifications go through a worker so the timer never waits on them
    let notifier: Arc<dyn Notifier> = if config.notify_command.is_empty() {
        info!("No notification command configured, notifications are only logged");
        Arc::new(LogNotifier)
    } else {
        let (relay, notifications_rx) = NotificationRelay::channel(16);
        tokio::spawn(notification_worker_task(
            notifications_rx,
            CommandNotifier::new(config.notify_command.clone()),
        ));
        Arc::new(relay)
    };

    let player = CommandAudioPlayer::new(config.audio_command.clone(), config.assets_dir.clone());
    let collaborators = Collaborators {
        music: Arc::new(FocusMusic::new(player.clone(), config.music_track.clone())),
        alarm: Arc::new(player),
        notifier,
        tasks: Arc::new(TaskBoard::load(store.clone())),
        streak: Arc::new(StreakTracker::load(store.clone())),
    };

    // Create application state
    let state = Arc::new(AppState::load(
        store,
        Arc::new(SystemClock),
        collaborators,
        config.engine_options(),
    ));

    // A countdown that ran out while we were stopped still gets its completion
    tokio::spawn(resume_after_restart(Arc::clone(&state)));

    // Start the timer ticker background task
    let ticker_state = Arc::clone(&state);
    tokio::spawn(async move {
        timer_ticker_task(ticker_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET   /timer         - Current timer state");
    info!("  POST  /timer/start   - Start or resume");
    info!("  POST  /timer/pause   - Pause");
    info!("  POST  /timer/reset   - Reset current phase");
    info!("  POST  /timer/skip    - Skip to next phase");
    info!("  POST  /timer/mode    - Switch phase");
    info!("  POST  /timer/focus   - Start focus from the beginning");
    info!("  GET   /settings      - Read settings");
    info!("  PATCH /settings      - Update settings");
    info!("  GET   /tasks         - List tasks");
    info!("  POST  /tasks         - Add task");
    info!("  POST  /tasks/active  - Choose active task");
    info!("  GET   /streak        - Focus streak");
    info!("  POST  /music/on      - Fade music in");
    info!("  POST  /music/off     - Fade music out");
    info!("  GET   /events        - Event stream (SSE)");
    info!("  GET   /health        - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
