use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{stream, FutureExt, StreamExt};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::{TrackingConfig, DEFAULT_EXCLUDED_PATHS};
use crate::context;
use crate::dispatch::{LogDispatcher, RecordSender};
use crate::error::Result;
use crate::model::TrackingRecord;
use crate::rate::FixedWindowRateLimiter;

/// Status recorded when the client goes away before the handler finishes
/// (the request future is dropped mid-flight).
const STATUS_CLIENT_CLOSED: u16 = 499;

// ─── Tracker ─────────────────────────────────────────────────────

/// Shared state behind [`track_requests`]: who we are, what to skip, the
/// optional limiter and where finished records go.
pub struct Tracker {
    service_name: String,
    excluded_paths: Vec<String>,
    rate_limiter: Option<FixedWindowRateLimiter>,
    sender: Arc<dyn RecordSender>,
    clock: Arc<dyn Clock>,
}

impl Tracker {
    /// Tracker with no rate limiter, the system clock and the default
    /// excluded paths.
    pub fn new(service_name: impl Into<String>, sender: Arc<dyn RecordSender>) -> Self {
        Self {
            service_name: service_name.into(),
            excluded_paths: DEFAULT_EXCLUDED_PATHS.iter().map(|p| p.to_string()).collect(),
            rate_limiter: None,
            sender,
            clock: Arc::new(SystemClock),
        }
    }

    /// Build the full pipeline (limiter + HTTP dispatcher) from config.
    pub fn from_config(config: &TrackingConfig) -> Result<Self> {
        config.validate()?;

        let sender = Arc::new(LogDispatcher::new(&config.collector)?);
        let mut tracker = Self::new(config.service_name.clone(), sender)
            .with_excluded_paths(config.excluded_paths.iter().cloned());

        if config.rate_limiter.enabled {
            let limiter = FixedWindowRateLimiter::new(config.rate_limiter.requests_per_second)?;
            tracker = tracker.with_rate_limiter(limiter);
        }

        Ok(tracker)
    }

    pub fn with_rate_limiter(mut self, limiter: FixedWindowRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_excluded_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// One tracked request/response cycle.  Must run inside a
    /// [`context::scope`].
    async fn track(self: Arc<Self>, req: Request, next: Next) -> Response {
        let timestamp = self.clock.now();
        let started = Instant::now();

        let rate_limit_hit = self
            .rate_limiter
            .as_ref()
            .map(FixedWindowRateLimiter::hit)
            .unwrap_or(false);

        // Armed before the first await so an aborted upload is still recorded.
        let declared = content_length(req.headers());
        let mut finalizer = Finalizer {
            tracker: self.clone(),
            pending: Some(Pending {
                endpoint: req.uri().path().to_owned(),
                method: req.method().to_string(),
                request_size: declared.unwrap_or(0),
                timestamp,
                started,
                rate_limit_hit,
            }),
        };

        // ── Buffer the request body so we can count it and replay it ──
        let (parts, body) = req.into_parts();
        let drained = drain(body).await;
        if let Some(err) = &drained.error {
            debug!(error = %err, path = %parts.uri.path(), "could not buffer request body");
        }
        finalizer.set_request_size(drained.size(declared));

        let req = Request::from_parts(parts, drained.into_body());

        // The limiter is advisory only: the handler always runs.
        let response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                finalizer.finish(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), 0);
                std::panic::resume_unwind(panic);
            }
        };

        // ── Buffer the response body, record, then replay it ─────────
        let (mut parts, body) = response.into_parts();
        let declared = content_length(&parts.headers);
        let drained = drain(body).await;
        if let Some(err) = &drained.error {
            debug!(error = %err, "could not buffer response body");
            parts.headers.remove(header::CONTENT_LENGTH);
        }

        finalizer.finish(parts.status.as_u16(), drained.size(declared));

        Response::from_parts(parts, drained.into_body())
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("service_name", &self.service_name)
            .field("excluded_paths", &self.excluded_paths)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

// ─── Middleware entry point ──────────────────────────────────────

/// Axum middleware that measures each request and ships a
/// [`TrackingRecord`] through the tracker's sender.
///
/// ```ignore
/// let app = Router::new()
///     .route("/widgets", post(create_widget))
///     .layer(axum::middleware::from_fn_with_state(tracker, track_requests));
/// ```
///
/// Excluded paths pass through untouched.  Everything else is buffered,
/// timed and recorded exactly once, including when the handler panics
/// (recorded as 500, then the panic continues) or the request is dropped
/// before completion (recorded as 499).
pub async fn track_requests(
    State(tracker): State<Arc<Tracker>>,
    req: Request,
    next: Next,
) -> Response {
    if tracker.is_excluded(req.uri().path()) {
        return next.run(req).await;
    }

    context::scope(tracker.track(req, next)).await
}

// ─── Finalization ────────────────────────────────────────────────

/// Everything known about the request before the handler runs.
struct Pending {
    endpoint: String,
    method: String,
    request_size: u64,
    timestamp: DateTime<Utc>,
    started: Instant,
    rate_limit_hit: bool,
}

/// Builds and sends the record exactly once.  If the request future is
/// dropped before `finish` is called, `Drop` sends it instead.
struct Finalizer {
    tracker: Arc<Tracker>,
    pending: Option<Pending>,
}

impl Finalizer {
    fn set_request_size(&mut self, size: u64) {
        if let Some(pending) = self.pending.as_mut() {
            pending.request_size = size;
        }
    }

    fn finish(&mut self, status_code: u16, response_size: u64) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let latency_ms = u64::try_from(pending.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        trace!(
            endpoint = %pending.endpoint,
            method = %pending.method,
            status = status_code,
            latency_ms,
            rate_limit_hit = pending.rate_limit_hit,
            "tracking record"
        );

        let record = TrackingRecord {
            service_name: self.tracker.service_name.clone(),
            endpoint: pending.endpoint,
            method: pending.method,
            request_size: pending.request_size,
            response_size,
            status_code,
            timestamp: pending.timestamp,
            latency_ms,
            rate_limit_hit: pending.rate_limit_hit,
            meta: context::snapshot(),
        };

        self.tracker.sender.send(record);
        context::clear();
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if self.pending.is_some() {
            debug!("request dropped before completion; recording as client-closed");
            self.finish(STATUS_CLIENT_CLOSED, 0);
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// A body read to the end (or to its first error), kept for replay.
struct Drained {
    chunks: Vec<Bytes>,
    error: Option<axum::Error>,
}

async fn drain(body: Body) -> Drained {
    let mut data = body.into_data_stream();
    let mut chunks = Vec::new();
    while let Some(chunk) = data.next().await {
        match chunk {
            Ok(chunk) => chunks.push(chunk),
            Err(err) => {
                return Drained {
                    chunks,
                    error: Some(err),
                }
            }
        }
    }
    Drained {
        chunks,
        error: None,
    }
}

impl Drained {
    fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Captured bytes count only when the body was read completely.
    fn size(&self, declared: Option<u64>) -> u64 {
        if self.error.is_some() {
            declared.unwrap_or(0)
        } else {
            resolve_size(self.len(), declared)
        }
    }

    /// A body yielding exactly what was read, including the error that
    /// ended it.
    fn into_body(self) -> Body {
        let Some(err) = self.error else {
            return Body::from(concat(self.chunks));
        };
        let replay = self
            .chunks
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(err)));
        Body::from_stream(stream::iter(replay))
    }
}

fn concat(chunks: Vec<Bytes>) -> Bytes {
    if chunks.len() <= 1 {
        return chunks.into_iter().next().unwrap_or_default();
    }
    let total = chunks.iter().map(Bytes::len).sum();
    let mut buf = Vec::with_capacity(total);
    for chunk in &chunks {
        buf.extend_from_slice(chunk);
    }
    Bytes::from(buf)
}

/// Prefer the bytes we actually saw; fall back to the declared length.
fn resolve_size(captured: usize, declared: Option<u64>) -> u64 {
    if captured > 0 {
        captured as u64
    } else {
        declared.unwrap_or(0)
    }
}
