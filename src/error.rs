//! Error types for the beacon client.
//!
//! Nothing in this crate panics or lets an error escape into producer call
//! sites. `track()` is infallible by contract; every failure on the drain
//! side is either reflected in a return value (`flush()`) or absorbed and
//! surfaced through the configured [`ErrorCallback`] and `tracing`.

use std::sync::Arc;
use std::time::Duration;

use crate::delivery::DeliveryError;

/// Callback invoked for every absorbed failure when configured.
///
/// Runs on whichever task observed the failure; keep it fast and
/// non-blocking.
pub type ErrorCallback = Arc<dyn Fn(&BeaconError) + Send + Sync>;

/// Errors that prevent a client from being constructed.
///
/// The client stays un-constructed; callers may fix the config and call
/// `init` again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// `project_id` was empty or whitespace.
    #[error("project_id must be a non-empty identifier")]
    MissingProjectId,
    /// `batch_size` must be greater than zero.
    #[error("batch_size must be > 0 (got {0})")]
    InvalidBatchSize(usize),
    /// `queue_capacity` must be greater than zero.
    #[error("queue_capacity must be > 0 (got {0})")]
    InvalidQueueCapacity(usize),
    /// `flush_interval` must be non-zero.
    #[error("flush_interval must be non-zero")]
    InvalidFlushInterval,
    /// `max_attempts` counts total delivery attempts and must be > 0.
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
    /// The collector endpoint override was empty.
    #[error("api_url must be a non-empty endpoint")]
    InvalidApiUrl,
}

/// Failures absorbed by the client and reported through the error callback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BeaconError {
    /// The queue was at capacity and the oldest events were evicted to
    /// admit newer ones. Recency wins under memory pressure; the loss is
    /// reported here rather than surfaced to the producer.
    #[error("event queue full (capacity {capacity}); evicted {evicted} oldest event(s)")]
    QueueOverflow { capacity: usize, evicted: usize },
    /// A batch was dropped after delivery failed permanently or exhausted
    /// its retry budget.
    #[error("dropped {count} event(s): {source}")]
    BatchDropped { count: usize, source: DeliveryError },
    /// The final drain at shutdown ran out of time; whatever was still
    /// queued has been discarded.
    #[error("shutdown drain ended after {timeout:?} with {discarded} event(s) undelivered")]
    ShutdownTimeout { timeout: Duration, discarded: usize },
}

/// Routes absorbed failures to the error callback and `tracing`.
///
/// In debug mode failures are promoted to `warn!`; otherwise they stay at
/// `debug!` so production hosts remain quiet unless a callback is supplied.
#[derive(Clone)]
pub(crate) struct Reporter {
    on_error: Option<ErrorCallback>,
    debug: bool,
}

impl Reporter {
    pub(crate) fn new(on_error: Option<ErrorCallback>, debug: bool) -> Self {
        Self { on_error, debug }
    }

    pub(crate) fn report(&self, error: &BeaconError) {
        if self.debug {
            tracing::warn!(%error, "beacon error");
        } else {
            tracing::debug!(%error, "beacon error");
        }
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.debug
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("on_error", &self.on_error.as_ref().map(|_| "<callback>"))
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn init_error_display() {
        let err = InitError::InvalidBatchSize(0);
        assert!(format!("{}", err).contains("batch_size"));
        assert_eq!(InitError::MissingProjectId, InitError::MissingProjectId);
    }

    #[test]
    fn batch_dropped_exposes_source() {
        use std::error::Error;
        let err = BeaconError::BatchDropped {
            count: 3,
            source: DeliveryError::Permanent(TransportError::Rejected { status: 400 }),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("3"));
        assert!(err.source().is_some());
    }

    #[test]
    fn reporter_invokes_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let reporter = Reporter::new(
            Some(Arc::new(move |_err: &BeaconError| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })),
            false,
        );

        reporter.report(&BeaconError::QueueOverflow { capacity: 10, evicted: 1 });
        reporter.report(&BeaconError::QueueOverflow { capacity: 10, evicted: 2 });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = Reporter::new(None, true);
        reporter.report(&BeaconError::ShutdownTimeout {
            timeout: Duration::from_secs(3),
            discarded: 7,
        });
        assert!(reporter.debug_enabled());
    }
}
