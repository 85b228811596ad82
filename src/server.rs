use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use request_tracker::{track_requests, Tracker};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::AppState;

/// Builds the sample `Router` with every route wrapped by the tracking middleware.
pub fn create_router(state: Arc<AppState>, tracker: Arc<Tracker>) -> Router {
    Router::new()
        // ── Widget endpoints ────────────────────────────────────
        .route("/widgets", post(handlers::widgets::create_widget))
        .route("/widgets/:id", get(handlers::widgets::get_widget))
        // ── Misc ────────────────────────────────────────────────
        .route("/ping", get(handlers::ping))
        .route("/actuator/health", get(handlers::health))
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(tracker, track_requests))
        .layer(CorsLayer::permissive())
}
