//! Client configuration.
//!
//! Built once via [`ClientConfig::builder`] and handed to `Beacon::init`,
//! which validates it and fails fast on nonsense values. Configuration is
//! immutable for the lifetime of one client instance, except the track
//! level, which stays runtime-mutable through the client handle.

use crate::backoff::Backoff;
use crate::error::ErrorCallback;
use crate::event::TrackLevel;
use crate::jitter::Jitter;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::transport::DEFAULT_API_URL;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for one client instance.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) project_id: String,
    pub(crate) track_level: TrackLevel,
    pub(crate) api_url: String,
    pub(crate) batch_size: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) max_attempts: usize,
    pub(crate) backoff: Backoff,
    pub(crate) jitter: Jitter,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) debug: bool,
    pub(crate) disabled: bool,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl ClientConfig {
    /// Start building a config for the given project.
    pub fn builder(project_id: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(project_id)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn track_level(&self) -> TrackLevel {
        self.track_level
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("project_id", &self.project_id)
            .field("track_level", &self.track_level)
            .field("api_url", &self.api_url)
            .field("batch_size", &self.batch_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("flush_interval", &self.flush_interval)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("debug", &self.debug)
            .field("disabled", &self.disabled)
            .field("on_error", &self.on_error.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Builder for [`ClientConfig`] with production defaults.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                project_id: project_id.into(),
                track_level: TrackLevel::default(),
                api_url: DEFAULT_API_URL.to_owned(),
                batch_size: DEFAULT_BATCH_SIZE,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                flush_interval: DEFAULT_FLUSH_INTERVAL,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                backoff: Backoff::Exponential {
                    base: Duration::from_millis(500),
                    max: Some(Duration::from_secs(30)),
                },
                jitter: Jitter::Full,
                sleeper: Arc::new(TokioSleeper),
                shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
                debug: false,
                disabled: false,
                on_error: None,
            },
        }
    }

    /// Initial verbosity tier (default `Standard`).
    pub fn track_level(mut self, level: TrackLevel) -> Self {
        self.config.track_level = level;
        self
    }

    /// Override the collector endpoint.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Events per delivery attempt; reaching it triggers an immediate flush.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Maximum queued events before the oldest are evicted.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Periodic flush cadence.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Total delivery attempts per batch (initial send + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Retry delay strategy.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Retry delay randomization.
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Replace the retry sleeper (deterministic timing in tests).
    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.config.sleeper = Arc::new(sleeper);
        self
    }

    /// Bound on the best-effort final drain at shutdown.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Promote drop/overflow/delivery-failure reports to `warn!` logs.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Master kill switch: reject every event at admission.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.config.disabled = disabled;
        self
    }

    /// Callback invoked for every absorbed failure.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&crate::error::BeaconError) + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
