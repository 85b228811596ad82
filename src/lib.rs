//! Request tracking for axum services.
//!
//! Every request that passes through [`track_requests`] is timed, its
//! request and response bodies are counted, an advisory per-second rate
//! limiter is consulted, and a [`TrackingRecord`] is shipped to a remote
//! collector on a detached task.  Delivery is best effort: collector
//! failures are logged and dropped, never surfaced to the request.
//!
//! ```ignore
//! let tracker = Arc::new(Tracker::from_config(&TrackingConfig::default())?);
//! let app = Router::new()
//!     .route("/widgets", post(create_widget))
//!     .layer(axum::middleware::from_fn_with_state(tracker, track_requests));
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod model;
pub mod rate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CollectorConfig, RateLimiterConfig, TrackingConfig};
pub use dispatch::{LogDispatcher, RecordSender};
pub use error::{Result, TrackingError};
pub use middleware::{track_requests, Tracker};
pub use model::TrackingRecord;
pub use rate::FixedWindowRateLimiter;
