//! Tracking client configuration, loadable from a `tracking.toml`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// Path prefixes that are never instrumented.
pub const DEFAULT_EXCLUDED_PATHS: &[&str] = &["/actuator", "/favicon", "/error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Reported as `serviceName` on every record
    pub service_name: String,
    pub collector: CollectorConfig,
    pub rate_limiter: RateLimiterConfig,
    /// Requests whose path starts with any of these are passed through untouched
    pub excluded_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub base_url: String,
    /// Path the records are POSTed to, relative to `base_url`
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub enabled: bool,
    pub requests_per_second: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".into(),
            collector: CollectorConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            excluded_paths: DEFAULT_EXCLUDED_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            endpoint: "/logs".into(),
            connect_timeout_ms: 2_000,
            response_timeout_ms: 5_000,
        }
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100,
        }
    }
}

impl CollectorConfig {
    /// Full URL records are POSTed to.
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint.is_empty() {
            base.to_string()
        } else if self.endpoint.starts_with('/') {
            format!("{base}{}", self.endpoint)
        } else {
            format!("{base}/{}", self.endpoint)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl TrackingConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TrackingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limiter.enabled && self.rate_limiter.requests_per_second == 0 {
            return Err(TrackingError::InvalidThreshold(0));
        }
        let base = &self.collector.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TrackingError::Config(format!(
                "collector base_url must be an http(s) URL, got {base:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TrackingConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.collector.url(), "http://localhost:8080/logs");
        assert_eq!(config.collector.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.collector.response_timeout(), Duration::from_secs(5));
        assert!(config.rate_limiter.enabled);
        assert_eq!(config.rate_limiter.requests_per_second, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml() {
        let config = TrackingConfig::from_toml_str(
            r#"
service_name = "orders"

[collector]
base_url = "http://collector:9000/"

[rate_limiter]
requests_per_second = 5
"#,
        )
        .unwrap();
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.collector.url(), "http://collector:9000/logs");
        assert_eq!(config.collector.connect_timeout_ms, 2_000);
        assert!(config.rate_limiter.enabled);
        assert_eq!(config.rate_limiter.requests_per_second, 5);
        assert_eq!(config.excluded_paths.len(), 3);
    }

    #[test]
    fn zero_threshold_fails_validation() {
        let err = TrackingConfig::from_toml_str("[rate_limiter]\nrequests_per_second = 0\n")
            .unwrap_err();
        assert!(matches!(err, TrackingError::InvalidThreshold(0)));
    }

    #[test]
    fn zero_threshold_is_fine_when_disabled() {
        let config = TrackingConfig::from_toml_str(
            "[rate_limiter]\nenabled = false\nrequests_per_second = 0\n",
        )
        .unwrap();
        assert!(!config.rate_limiter.enabled);
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let err = TrackingConfig::from_toml_str("[collector]\nbase_url = \"collector:9000\"\n")
            .unwrap_err();
        assert!(matches!(err, TrackingError::Config(_)));
    }

    #[test]
    fn endpoint_without_leading_slash() {
        let collector = CollectorConfig {
            endpoint: "ingest".into(),
            ..CollectorConfig::default()
        };
        assert_eq!(collector.url(), "http://localhost:8080/ingest");
    }
}
