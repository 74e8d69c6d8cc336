//! Wire contract with the collector and the built-in HTTP transport.
//!
//! The transport is an injected capability: embedders (and tests) supply
//! their own [`Transport`] and the client never probes its environment for
//! one. The built-in [`HttpTransport`] (feature `http`, on by default)
//! POSTs one JSON [`BatchPayload`] per delivery attempt.
//!
//! Response classification:
//! - 2xx: accepted; the body may carry a [`BatchReceipt`] naming rejected
//!   event indices (absent/empty body means fully accepted).
//! - 408 / 429 / 5xx / connection failure: transient, worth retrying.
//! - any other 4xx, or a payload that fails to serialize: permanent.

use crate::event::{now_ms, Event};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One delivery attempt's worth of events, drawn from the queue head.
///
/// Built transiently per batch; never persisted. The `batch_id` is reused
/// across retry attempts of the same batch so the collector can detect
/// duplicate sends.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPayload {
    pub project_id: String,
    pub batch_id: Uuid,
    pub sent_at_ms: u64,
    pub events: Vec<Event>,
}

impl BatchPayload {
    pub fn new(project_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            project_id: project_id.into(),
            batch_id: Uuid::new_v4(),
            sent_at_ms: now_ms(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Collector acknowledgement for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchReceipt {
    /// Indices into the batch's `events` that the collector rejected.
    /// Empty means the whole batch was accepted.
    #[serde(default)]
    pub rejected: Vec<usize>,
}

impl BatchReceipt {
    pub fn accepted_all(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Transport-level failures, split by whether a retry can help.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure before or during the exchange.
    #[error("network error: {0}")]
    Network(String),
    /// The collector answered with a retryable status (408, 429, 5xx).
    #[error("collector returned retryable status {status}")]
    Retryable { status: u16 },
    /// The collector rejected the request outright (other 4xx).
    #[error("collector rejected batch with status {status}")]
    Rejected { status: u16 },
    /// The batch could not be serialized to the wire format.
    #[error("payload serialization failed: {0}")]
    Serialize(String),
}

impl TransportError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Network(_) | TransportError::Retryable { .. })
    }
}

/// Capability that ships one batch to the collector.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn send(&self, payload: &BatchPayload) -> Result<BatchReceipt, TransportError>;
}

/// Default collector endpoint used when the config carries no override.
pub const DEFAULT_API_URL: &str = "https://ingest.flyingrobots.dev/v1/batch";

/// JSON-over-HTTP transport backed by `reqwest`.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }

    /// Reuse an existing `reqwest::Client` (connection pools are shared).
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &BatchPayload) -> Result<BatchReceipt, TransportError> {
        let body =
            serde_json::to_vec(payload).map_err(|e| TransportError::Serialize(e.to_string()))?;

        let response = self
            .client
            .post(self.endpoint.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            // Empty or non-JSON bodies mean fully accepted.
            return Ok(response.json::<BatchReceipt>().await.unwrap_or_default());
        }

        let code = status.as_u16();
        if status.is_server_error()
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            Err(TransportError::Retryable { status: code })
        } else {
            Err(TransportError::Rejected { status: code })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Properties, TrackLevel};

    #[test]
    fn payload_serializes_wire_shape() {
        let events = vec![
            Event::new("a", TrackLevel::Essential, Properties::new(), 1),
            Event::new("b", TrackLevel::Standard, Properties::new(), 2),
        ];
        let payload = BatchPayload::new("p1", events);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["project_id"], "p1");
        assert!(value["batch_id"].is_string());
        assert_eq!(value["events"].as_array().unwrap().len(), 2);
        assert_eq!(value["events"][0]["sequence"], 1);
    }

    #[test]
    fn receipt_defaults_to_fully_accepted() {
        let receipt: BatchReceipt = serde_json::from_str("{}").unwrap();
        assert!(receipt.accepted_all());

        let receipt: BatchReceipt = serde_json::from_str(r#"{"rejected":[0,2]}"#).unwrap();
        assert_eq!(receipt.rejected, vec![0, 2]);
        assert!(!receipt.accepted_all());
    }

    #[test]
    fn transient_classification() {
        assert!(TransportError::Network("refused".into()).is_transient());
        assert!(TransportError::Retryable { status: 503 }.is_transient());
        assert!(!TransportError::Rejected { status: 400 }.is_transient());
        assert!(!TransportError::Serialize("bad".into()).is_transient());
    }
}
