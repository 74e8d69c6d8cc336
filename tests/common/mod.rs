#![allow(dead_code)]

use async_trait::async_trait;
use beacon::{BatchPayload, BatchReceipt, BeaconError, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted transport response.
#[derive(Debug)]
pub enum Outcome {
    Ok(BatchReceipt),
    Err(TransportError),
    /// Wait, then accept the batch (for overlapping-operation tests).
    SlowOk(Duration),
}

/// Transport that replays a script of outcomes and records every payload
/// it was asked to send. Once the script is exhausted it accepts
/// everything.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    sent: Mutex<Vec<BatchPayload>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Every payload handed to `send`, including failed attempts.
    pub fn sent(&self) -> Vec<BatchPayload> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Event names per recorded batch, in send order.
    pub fn sent_names(&self) -> Vec<Vec<String>> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|payload| payload.events.iter().map(|event| event.name.clone()).collect())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, payload: &BatchPayload) -> Result<BatchReceipt, TransportError> {
        self.sent.lock().unwrap().push(payload.clone());
        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            None => Ok(BatchReceipt::default()),
            Some(Outcome::Ok(receipt)) => Ok(receipt),
            Some(Outcome::Err(error)) => Err(error),
            Some(Outcome::SlowOk(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(BatchReceipt::default())
            }
        }
    }
}

/// Collects every error the client reports through its callback.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<BeaconError>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, error: &BeaconError) {
        self.errors.lock().unwrap().push(error.clone());
    }

    pub fn all(&self) -> Vec<BeaconError> {
        self.errors.lock().unwrap().clone()
    }
}

/// Poll until `condition` holds or `timeout` elapses.
pub async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
