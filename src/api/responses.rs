//! API response structures

use axum::{http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{TaskError, TimerError},
    services::Task,
    state::TimerSnapshot,
};

/// API response structure for timer control endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerSnapshot,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: impl Into<String>, timer: TimerSnapshot) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Response reflecting the new timer state after a control operation
    pub fn ok(message: impl Into<String>, timer: TimerSnapshot) -> Self {
        Self::new("ok", message, timer)
    }
}

/// Timer status with server metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub timer: TimerSnapshot,
    pub active_task: Option<Task>,
    pub uptime: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Error body returned with any non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl ErrorResponse {
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> ApiError {
        (
            status,
            Json(Self {
                status: "error".to_string(),
                message: message.into(),
                timestamp: Utc::now(),
            }),
        )
    }
}

impl From<TimerError> for ErrorResponse {
    fn from(error: TimerError) -> Self {
        Self {
            status: "error".to_string(),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Map a timer error onto its HTTP status
pub fn timer_error(error: TimerError) -> ApiError {
    let status = match error {
        TimerError::InvalidSettings(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TimerError::InvalidTransition { .. } => StatusCode::CONFLICT,
    };
    (status, Json(ErrorResponse::from(error)))
}

/// Map a task error onto its HTTP status
pub fn task_error(error: TaskError) -> ApiError {
    let status = match error {
        TaskError::NotFound(_) => StatusCode::NOT_FOUND,
        TaskError::InvalidEstimate => StatusCode::UNPROCESSABLE_ENTITY,
        TaskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ErrorResponse::with_status(status, error.to_string())
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
