//! Client lifecycle and the public tracking API.
//!
//! A [`Beacon`] is an explicit owned handle returned by `init`, not a
//! module-level global: callers keep it (clones are cheap and share one
//! instance) and tests can run several independent instances in-process.
//! Lifecycle is an explicit state machine with guarded transitions:
//! construction is the only way to reach `Ready`, `shutdown` is the only
//! way out, and duplicate lifecycle signals (double shutdown, racing
//! clones) collapse to a single side effect.
//!
//! `track()` is fire-and-forget and never blocks beyond a short mutex
//! critical section: admission is a filter check plus a bounded enqueue.
//! Producers can keep tracking while a flush is in flight.

use crate::config::ClientConfig;
use crate::delivery::DeliveryClient;
use crate::error::{BeaconError, InitError, Reporter};
use crate::event::{Event, Properties, TrackLevel};
use crate::filter::TrackFilter;
use crate::queue::EventQueue;
use crate::transport::Transport;
use crate::worker::{Command, Shared, Worker};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};

/// Lifecycle of one client instance.
///
/// `Ready` is entered by construction; `shutdown` moves through
/// `ShuttingDown` into `Terminated`, from which there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Ready = 0,
    ShuttingDown = 1,
    Terminated = 2,
}

/// Atomic cell holding a [`LifecycleState`] with guarded transitions.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        match self.0.load(Ordering::Acquire) {
            0 => LifecycleState::Ready,
            1 => LifecycleState::ShuttingDown,
            _ => LifecycleState::Terminated,
        }
    }

    pub(crate) fn store(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Guarded transition; `false` if the cell was not in `from`.
    pub(crate) fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Result of one forced flush: what happened to the events that were
/// queued when it ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Events the collector accepted.
    pub delivered: usize,
    /// Events dropped after permanent failure or an exhausted retry
    /// budget (each drop was reported through the error callback).
    pub dropped: usize,
    /// Events the collector rejected individually; they are back at the
    /// queue head awaiting the next cycle.
    pub requeued: usize,
}

/// Errors returned by [`Beacon::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlushError {
    /// The client has been shut down (or is shutting down).
    #[error("client is not running")]
    NotReady,
}

/// Point-in-time snapshot of the client's event accounting.
///
/// The observable counterpart of every documented data-loss policy: any
/// event handed to `track()` ends up in exactly one of these buckets (or
/// is still queued).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Events admitted past the filter and enqueued.
    pub admitted: u64,
    /// Events rejected by the track level gate or the kill switch.
    pub filtered: u64,
    /// Events dropped because the client was not `Ready`.
    pub dropped_not_ready: u64,
    /// Events evicted by the bounded-queue overflow policy.
    pub evicted: u64,
    /// Events the collector accepted.
    pub delivered: u64,
    /// Events dropped after delivery failed for good.
    pub dropped_failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) admitted: AtomicU64,
    pub(crate) filtered: AtomicU64,
    pub(crate) dropped_not_ready: AtomicU64,
    pub(crate) evicted: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) dropped_failed: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> ClientStats {
        ClientStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            dropped_not_ready: self.dropped_not_ready.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_failed: self.dropped_failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle to one running analytics client.
///
/// Cloning is cheap; all clones share the same queue, worker, and
/// lifecycle. Must be created from within a tokio runtime (the drain
/// worker is spawned at init).
#[derive(Debug, Clone)]
pub struct Beacon {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Command>,
    batch_size: usize,
}

impl Beacon {
    /// Initialize a client shipping to the configured collector endpoint
    /// over HTTP.
    ///
    /// Fails fast on invalid config; the client stays un-constructed and
    /// the caller may retry with a fixed config.
    #[cfg(feature = "http")]
    pub fn init(config: ClientConfig) -> Result<Self, InitError> {
        let transport =
            Arc::new(crate::transport::HttpTransport::new(config.api_url.clone()));
        Self::init_with_transport(config, transport)
    }

    /// Initialize a client with a caller-supplied transport capability.
    ///
    /// The core behaves identically whatever the transport; tests inject
    /// scripted ones, embedders can wrap their own HTTP stack.
    pub fn init_with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, InitError> {
        validate(&config)?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(EventQueue::with_capacity(config.queue_capacity)),
            filter: TrackFilter::new(config.track_level, config.disabled),
            state: StateCell::new(LifecycleState::Ready),
            next_sequence: AtomicU64::new(0),
            batch_ready: Notify::new(),
            reporter: Reporter::new(config.on_error.clone(), config.debug),
            counters: Counters::default(),
        });

        let delivery = DeliveryClient::new(
            transport,
            config.max_attempts,
            config.backoff.clone(),
            config.jitter,
        )
        .with_sleeper(config.sleeper.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            shared: shared.clone(),
            delivery,
            rx,
            project_id: config.project_id.clone(),
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            shutdown_timeout: config.shutdown_timeout,
        };
        tokio::spawn(worker.run());

        tracing::debug!(project_id = %config.project_id, "beacon client initialized");
        Ok(Self { shared, tx, batch_size: config.batch_size })
    }

    /// Track an always-on event with no properties.
    pub fn track(&self, name: impl Into<String>) {
        self.track_at(name, TrackLevel::Essential, Properties::new());
    }

    /// Track an always-on event with structured properties.
    pub fn track_with(&self, name: impl Into<String>, properties: Properties) {
        self.track_at(name, TrackLevel::Essential, properties);
    }

    /// Track an event that requires at least the given level to be
    /// admitted. Fire-and-forget: never blocks, never errors.
    pub fn track_at(&self, name: impl Into<String>, level: TrackLevel, properties: Properties) {
        let name = name.into();

        if self.shared.state.load() != LifecycleState::Ready {
            self.shared.counters.dropped_not_ready.fetch_add(1, Ordering::Relaxed);
            if self.shared.reporter.debug_enabled() {
                tracing::warn!(event = %name, "track() ignored: client is not running");
            }
            return;
        }
        if name.is_empty() {
            if self.shared.reporter.debug_enabled() {
                tracing::warn!("track() ignored: empty event name");
            }
            return;
        }
        if !self.shared.filter.admit(level) {
            self.shared.counters.filtered.fetch_add(1, Ordering::Relaxed);
            if self.shared.reporter.debug_enabled() {
                tracing::debug!(event = %name, %level, "event filtered");
            }
            return;
        }

        let (evicted, len, capacity) = {
            let mut queue = self.shared.queue.lock().unwrap();
            // Sequence assigned under the queue lock so queue order always
            // matches sequence order, even with producers on many threads.
            let sequence = self.shared.next_sequence.fetch_add(1, Ordering::Relaxed);
            let event = Event::new(name, level, properties, sequence);
            (queue.enqueue(event), queue.len(), queue.capacity())
        };
        self.shared.counters.admitted.fetch_add(1, Ordering::Relaxed);

        if evicted.is_some() {
            self.shared.counters.evicted.fetch_add(1, Ordering::Relaxed);
            self.shared.reporter.report(&BeaconError::QueueOverflow { capacity, evicted: 1 });
        }
        if len >= self.batch_size {
            self.shared.batch_ready.notify_one();
        }
    }

    /// Force delivery of everything queued right now.
    ///
    /// Resolves once each of those events was delivered, permanently
    /// dropped with a reported error, or requeued by a partial rejection;
    /// the report says which. Concurrent flushes coalesce onto the same
    /// drain rather than issuing duplicate deliveries.
    pub async fn flush(&self) -> Result<FlushReport, FlushError> {
        if self.shared.state.load() != LifecycleState::Ready {
            return Err(FlushError::NotReady);
        }
        let (tx, rx) = oneshot::channel();
        self.tx.send(Command::Flush(tx)).map_err(|_| FlushError::NotReady)?;
        rx.await.map_err(|_| FlushError::NotReady)
    }

    /// Change the verbosity tier for all subsequent `track` calls.
    /// Already-queued events are not retroactively filtered.
    pub fn set_track_level(&self, level: TrackLevel) {
        self.shared.filter.set_level(level);
    }

    pub fn track_level(&self) -> TrackLevel {
        self.shared.filter.level()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state.load()
    }

    /// Events currently queued and awaiting delivery.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    pub fn stats(&self) -> ClientStats {
        self.shared.counters.snapshot()
    }

    /// Stop the client: one best-effort final drain bounded by the
    /// configured shutdown timeout, then remaining events are discarded
    /// (and reported). Idempotent; later calls return immediately while
    /// the first drain proceeds. Never blocks teardown indefinitely.
    pub async fn shutdown(&self) {
        if !self.shared.state.transition(LifecycleState::Ready, LifecycleState::ShuttingDown) {
            return;
        }
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        self.shared.state.store(LifecycleState::Terminated);
    }
}

fn validate(config: &ClientConfig) -> Result<(), InitError> {
    if config.project_id.trim().is_empty() {
        return Err(InitError::MissingProjectId);
    }
    if config.batch_size == 0 {
        return Err(InitError::InvalidBatchSize(0));
    }
    if config.queue_capacity == 0 {
        return Err(InitError::InvalidQueueCapacity(0));
    }
    if config.flush_interval.is_zero() {
        return Err(InitError::InvalidFlushInterval);
    }
    if config.max_attempts == 0 {
        return Err(InitError::InvalidMaxAttempts(0));
    }
    if config.api_url.trim().is_empty() {
        return Err(InitError::InvalidApiUrl);
    }
    Ok(())
}
