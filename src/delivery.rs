//! Batch delivery with bounded retry.
//!
//! Semantics:
//! - `max_attempts` counts total sends (initial try + retries).
//! - Only transient transport errors (network, 408/429/5xx) are retried;
//!   permanent ones return immediately.
//! - Backoff calculates the delay per retry; jitter randomizes it so a
//!   fleet of clients recovering from the same outage does not stampede
//!   the collector.
//! - The sleeper controls how delays are applied (production uses
//!   [`TokioSleeper`]; tests inject instant/recording sleepers).
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`; `send_batch` always returns
//!   within the retry/backoff budget.
//! - Partial acceptance is a successful attempt: the receipt names the
//!   rejected subset and no further retry happens here. Retrying rejected
//!   events is the queue's job on a later cycle.

use crate::backoff::Backoff;
use crate::jitter::Jitter;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::transport::{BatchPayload, BatchReceipt, Transport, TransportError};
use std::sync::Arc;

/// Delivery failure after the retry policy has run its course.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    /// Transient failures exhausted the attempt budget.
    #[error("delivery gave up after {attempts} attempt(s); last error: {last}")]
    Exhausted { attempts: usize, last: TransportError },
    /// The collector will never accept this batch.
    #[error("batch permanently rejected: {0}")]
    Permanent(TransportError),
}

/// Sends batches through a [`Transport`] with retry, backoff, and jitter.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn Transport>,
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("transport", &self.transport)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl DeliveryClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        max_attempts: usize,
        backoff: Backoff,
        jitter: Jitter,
    ) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
            backoff,
            jitter,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper (deterministic retry timing in tests).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attempt delivery of one batch, retrying transient failures.
    ///
    /// The payload (and its batch id) is identical across attempts so the
    /// collector can deduplicate client-side retries.
    pub async fn send_batch(&self, payload: &BatchPayload) -> Result<BatchReceipt, DeliveryError> {
        let mut attempt = 0;
        loop {
            match self.transport.send(payload).await {
                Ok(receipt) => {
                    tracing::trace!(
                        batch_id = %payload.batch_id,
                        events = payload.len(),
                        rejected = receipt.rejected.len(),
                        "batch delivered"
                    );
                    return Ok(receipt);
                }
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(DeliveryError::Exhausted { attempts: attempt, last: err });
                    }
                    let delay = self.jitter.apply(self.backoff.delay(attempt));
                    tracing::debug!(
                        batch_id = %payload.batch_id,
                        attempt,
                        ?delay,
                        error = %err,
                        "transient delivery failure; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(err) => return Err(DeliveryError::Permanent(err)),
            }
        }
    }
}
