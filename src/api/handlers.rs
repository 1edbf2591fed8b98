//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    error::TimerError,
    services::{StreakData, Task, TaskId},
    state::{AppState, Phase, SettingsPatch, TimerEvent, TimerSettings, TimerSnapshot},
};
use super::responses::{
    task_error, timer_error, ApiError, ApiResponse, ErrorResponse, HealthResponse, StatusResponse,
};

fn control_response(
    action: &str,
    result: Result<TimerSnapshot, TimerError>,
) -> Result<Json<ApiResponse>, ApiError> {
    match result {
        Ok(timer) => {
            info!(action, phase = %timer.phase, lifecycle = %timer.lifecycle, "timer control");
            Ok(Json(ApiResponse::ok(format!("Timer {}", action), timer)))
        }
        Err(e) => {
            warn!("Rejected timer {}: {}", action, e);
            Err(timer_error(e))
        }
    }
}

/// Handle GET /timer - Current timer snapshot
pub async fn timer_status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();
    Json(StatusResponse {
        timer: state.snapshot(),
        active_task: state.tasks.active_task(),
        uptime: state.get_uptime(),
        last_action,
        last_action_time,
    })
}

/// Handle POST /timer/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    control_response("started", state.start_timer())
}

/// Handle POST /timer/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    control_response("paused", state.pause_timer())
}

/// Handle POST /timer/reset
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    control_response("reset", state.reset_timer())
}

/// Handle POST /timer/skip - Jump to the next phase without side effects
pub async fn skip_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    control_response("skipped", state.skip_timer())
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: Phase,
}

/// Handle POST /timer/mode - Switch phase, idle at full duration
pub async fn mode_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    control_response("mode changed", state.set_timer_mode(request.mode))
}

/// Handle POST /timer/focus - Start a fresh focus session
pub async fn focus_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    control_response("focus started", state.start_focus_from_beginning())
}

/// Handle GET /settings
pub async fn get_settings_handler(State(state): State<Arc<AppState>>) -> Json<TimerSettings> {
    Json(state.settings())
}

/// Handle PATCH /settings - Partial update, rejected whole when invalid
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<TimerSettings>, ApiError> {
    match state.update_settings(patch) {
        Ok(settings) => Ok(Json(settings)),
        Err(e) => {
            warn!("Rejected settings update: {}", e);
            Err(timer_error(e))
        }
    }
}

/// Handle GET /tasks
pub async fn list_tasks_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.tasks.list())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRequest {
    pub title: String,
    #[serde(default = "default_estimate")]
    pub estimated_pomodoros: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_estimate() -> u32 {
    1
}

/// Handle POST /tasks - Add a task
pub async fn add_task_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(ErrorResponse::with_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            "task title must not be empty",
        ));
    }
    state
        .tasks
        .add_task(title, request.estimated_pomodoros, request.notes)
        .map(|task| (StatusCode::CREATED, Json(task)))
        .map_err(|e| {
            error!("Failed to add task: {}", e);
            task_error(e)
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTaskRequest {
    pub task_id: Option<TaskId>,
}

/// Handle POST /tasks/active - Choose the task credited for focus sessions
pub async fn set_active_task_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActiveTaskRequest>,
) -> Result<Json<Option<Task>>, ApiError> {
    state
        .tasks
        .set_active_task(request.task_id)
        .map_err(task_error)?;
    Ok(Json(state.tasks.active_task()))
}

/// Handle GET /streak
pub async fn streak_handler(State(state): State<Arc<AppState>>) -> Json<StreakData> {
    Json(state.streak.data())
}

/// Handle POST /music/on - Fade background music in
pub async fn music_on_handler(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    match state.music.fade_in() {
        Ok(()) => {
            info!("Music on endpoint called");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to start music: {}", e);
            Err(ErrorResponse::with_status(
                StatusCode::SERVICE_UNAVAILABLE,
                e.to_string(),
            ))
        }
    }
}

/// Handle POST /music/off - Fade background music out
pub async fn music_off_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.music.fade_out();
    info!("Music off endpoint called");
    StatusCode::NO_CONTENT
}

/// Handle GET /events - Server-sent stream of timer events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe_events();
    let current = TimerEvent::StateChanged {
        timer: state.snapshot(),
    };

    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let events = stream::once(async move { current })
        .chain(updates)
        .filter_map(|event| async move {
            match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    error!("Failed to encode event: {}", e);
                    None
                }
            }
        });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
