use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One completed request, as shipped to the collector.
/// Built once by the middleware, handed to the dispatcher, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub service_name: String,
    /// Request path, without the query string
    pub endpoint: String,
    pub method: String,
    /// Request body size in bytes
    pub request_size: u64,
    /// Response body size in bytes
    pub response_size: u64,
    pub status_code: u16,
    /// Wall-clock time the request entered the middleware
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
    /// true when this request pushed the per-second counter over its limit
    pub rate_limit_hit: bool,
    /// Annotations from the request's metadata context; absent when none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}
