use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use request_tracker::context;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::AppState;

use super::AppError;

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Widget {
    pub id: u64,
    pub name: String,
    pub color: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateWidgetRequest {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "grey".into()
}

// ─── POST /widgets ───────────────────────────────────────────────

pub async fn create_widget(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWidgetRequest>,
) -> Result<(StatusCode, Json<Widget>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("widget name must not be empty".into()));
    }

    let widget = Widget {
        id: state.next_widget_id.fetch_add(1, Ordering::Relaxed),
        name: req.name,
        color: req.color,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    // Shows up as `meta` on this request's tracking record.
    context::put("widgetId", widget.id);
    context::put("color", widget.color.clone());

    Ok((StatusCode::CREATED, Json(widget)))
}

// ─── GET /widgets/:id ────────────────────────────────────────────

pub async fn get_widget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Widget>, AppError> {
    context::put("widgetId", id);

    if id == 0 || id >= state.next_widget_id.load(Ordering::Relaxed) {
        return Err(AppError::NotFound(format!("widget '{id}' not found")));
    }

    Ok(Json(Widget {
        id,
        name: format!("widget-{id}"),
        color: default_color(),
        created_at: chrono::Utc::now().to_rfc3339(),
    }))
}
