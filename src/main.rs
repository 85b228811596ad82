use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use anyhow::Context;
use request_tracker::{Tracker, TrackingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod handlers;
mod server;

const DEFAULT_CONFIG_PATH: &str = "tracking.toml";
const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Source of widget ids.
    pub next_widget_id: AtomicU64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("request_tracker=debug,sample_service=info")),
        )
        .init();

    // ── 1. Resolve tracking config ───────────────────────────────
    let config_path = std::env::var("TRACKING_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = if config_path.exists() {
        TrackingConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        info!(path = %config_path.display(), "no tracking config found, using defaults");
        TrackingConfig::default()
    };

    // ── 2. Build the tracker ─────────────────────────────────────
    let tracker = Arc::new(Tracker::from_config(&config)?);
    info!(
        service = %config.service_name,
        collector = %config.collector.url(),
        rate_limit = config.rate_limiter.enabled.then_some(config.rate_limiter.requests_per_second),
        "tracking enabled"
    );

    // ── 3. Build shared state & router ───────────────────────────
    let state = Arc::new(AppState {
        next_widget_id: AtomicU64::new(1),
    });
    let app = server::create_router(state, tracker);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let addr = std::env::var("TRACKING_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "sample service listening");
    axum::serve(listener, app).await.context("server exited with error")?;
    Ok(())
}
