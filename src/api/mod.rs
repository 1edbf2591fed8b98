//! HTTP API module
//! 
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timer", get(timer_status_handler))
        .route("/timer/start", post(start_handler))
        .route("/timer/pause", post(pause_handler))
        .route("/timer/reset", post(reset_handler))
        .route("/timer/skip", post(skip_handler))
        .route("/timer/mode", post(mode_handler))
        .route("/timer/focus", post(focus_handler))
        .route("/settings", get(get_settings_handler).patch(update_settings_handler))
        .route("/tasks", get(list_tasks_handler).post(add_task_handler))
        .route("/tasks/active", post(set_active_task_handler))
        .route("/streak", get(streak_handler))
        .route("/music/on", post(music_on_handler))
        .route("/music/off", post(music_off_handler))
        .route("/events", get(events_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
