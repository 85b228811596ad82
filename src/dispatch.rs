//! Fire-and-forget delivery of tracking records to the collector.
//!
//! There is no delivery guarantee and no backpressure: each record gets one
//! POST on a detached task, and whatever happens to it is logged and dropped.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, trace, warn};

use crate::config::CollectorConfig;
use crate::error::Result;
use crate::model::TrackingRecord;

/// Sink for finished records.
///
/// `send` is called on the request path and must return promptly; it must
/// never panic and has no way to report failure.
pub trait RecordSender: Send + Sync {
    fn send(&self, record: TrackingRecord);
}

impl<T: RecordSender + ?Sized> RecordSender for Arc<T> {
    fn send(&self, record: TrackingRecord) {
        (**self).send(record)
    }
}

/// Posts each record as JSON to `{base_url}{endpoint}`.
#[derive(Debug, Clone)]
pub struct LogDispatcher {
    client: Client,
    url: Arc<str>,
}

impl LogDispatcher {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.response_timeout())
            .build()?;

        Ok(Self::with_client(client, config.url()))
    }

    /// Use a pre-built client, e.g. one shared with the host service.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform one delivery attempt and swallow the outcome.
    async fn deliver(client: Client, url: Arc<str>, record: TrackingRecord) {
        match client.post(&*url).json(&record).send().await {
            Ok(resp) if resp.status().is_success() => {
                trace!(status = resp.status().as_u16(), "tracking record delivered");
            }
            Ok(resp) => {
                debug!(
                    status = resp.status().as_u16(),
                    endpoint = %record.endpoint,
                    "collector answered tracking record with non-success status"
                );
            }
            Err(err) => {
                warn!(
                    error = %err,
                    url = %url,
                    endpoint = %record.endpoint,
                    "failed to send tracking record"
                );
            }
        }
    }
}

impl RecordSender for LogDispatcher {
    fn send(&self, record: TrackingRecord) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(endpoint = %record.endpoint, "no tokio runtime available; tracking record dropped");
            return;
        };

        runtime.spawn(Self::deliver(self.client.clone(), self.url.clone(), record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn record() -> TrackingRecord {
        TrackingRecord {
            service_name: "sample-service".into(),
            endpoint: "/widgets".into(),
            method: "POST".into(),
            request_size: 7,
            response_size: 11,
            status_code: 201,
            timestamp: "2024-01-01T00:00:00Z".parse().unwrap(),
            latency_ms: 3,
            rate_limit_hit: false,
            meta: None,
        }
    }

    /// Starts a throwaway collector that forwards every posted record.
    async fn fake_collector() -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/logs",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    axum::http::StatusCode::ACCEPTED
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn url_joins_base_and_endpoint() {
        let dispatcher = LogDispatcher::new(&CollectorConfig {
            base_url: "http://collector:9000/".into(),
            ..CollectorConfig::default()
        })
        .unwrap();
        assert_eq!(dispatcher.url(), "http://collector:9000/logs");
    }

    #[tokio::test]
    async fn posts_record_as_json() {
        let (base_url, mut rx) = fake_collector().await;
        let dispatcher = LogDispatcher::new(&CollectorConfig {
            base_url,
            ..CollectorConfig::default()
        })
        .unwrap();

        dispatcher.send(record());

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("collector never received the record")
            .unwrap();
        assert_eq!(body["serviceName"], "sample-service");
        assert_eq!(body["requestSize"], 7);
        assert_eq!(body["statusCode"], 201);
        assert!(body.get("meta").is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        // Nothing listens on port 1; the connect is refused.
        let dispatcher = LogDispatcher::new(&CollectorConfig {
            base_url: "http://127.0.0.1:1".into(),
            connect_timeout_ms: 200,
            response_timeout_ms: 500,
            ..CollectorConfig::default()
        })
        .unwrap();

        LogDispatcher::deliver(dispatcher.client.clone(), dispatcher.url.clone(), record()).await;
        dispatcher.send(record());
    }

    #[test]
    fn send_without_runtime_drops_record() {
        let dispatcher = LogDispatcher::new(&CollectorConfig::default()).unwrap();
        dispatcher.send(record());
    }
}
