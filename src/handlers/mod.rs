pub mod widgets;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

// ─── GET /ping ───────────────────────────────────────────────────

pub async fn ping() -> &'static str {
    "pong"
}

// ─── GET /actuator/health ────────────────────────────────────────

/// Never tracked: `/actuator` is on the default exclusion list.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}
