//! Error types for the tracking client.

use thiserror::Error;

/// Errors raised while building the tracking pipeline.
///
/// Nothing in the request path returns these; they surface only when a
/// [`Tracker`](crate::Tracker) or one of its parts is constructed.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("rate limiter threshold must be positive, got {0}")]
    InvalidThreshold(u64),

    #[error("invalid tracking configuration: {0}")]
    Config(String),

    #[error("failed to read tracking config: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse tracking config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to build collector client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
