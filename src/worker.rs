//! Background drain task: batch scheduling, delivery, shutdown drain.
//!
//! One worker task per client instance owns the drain side of the queue.
//! Producers only enqueue; the worker is the only remover, so a flush can
//! take a stable snapshot, await the network send without holding the
//! queue lock, and afterwards remove nothing past the snapshot watermark.
//!
//! Flush triggers:
//! - the periodic interval tick,
//! - the queue reaching `batch_size` (producers post a notify),
//! - an explicit `flush()` command,
//! - shutdown, which runs exactly one best-effort drain bounded by
//!   `shutdown_timeout` and then discards the rest.
//!
//! Forced flushes are serialized through the command channel; requests
//! queued behind an in-flight drain are coalesced into it. A missed
//! batch-ready wakeup is recovered by the next interval tick.

use crate::client::{Counters, FlushReport, LifecycleState, StateCell};
use crate::delivery::{DeliveryClient, DeliveryError};
use crate::error::{BeaconError, Reporter};
use crate::event::Event;
use crate::filter::TrackFilter;
use crate::queue::EventQueue;
use crate::transport::BatchPayload;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// State shared between producer handles and the worker task.
///
/// The queue is the sole mutable resource on both paths; the lock is held
/// only for non-suspending critical sections.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) queue: Mutex<EventQueue>,
    pub(crate) filter: TrackFilter,
    pub(crate) state: StateCell,
    pub(crate) next_sequence: AtomicU64,
    pub(crate) batch_ready: Notify,
    pub(crate) reporter: Reporter,
    pub(crate) counters: Counters,
}

pub(crate) enum Command {
    Flush(oneshot::Sender<FlushReport>),
    Shutdown(oneshot::Sender<()>),
}

pub(crate) struct Worker {
    pub(crate) shared: Arc<Shared>,
    pub(crate) delivery: DeliveryClient,
    pub(crate) rx: mpsc::UnboundedReceiver<Command>,
    pub(crate) project_id: String,
    pub(crate) batch_size: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) shutdown_timeout: Duration,
}

enum Wakeup {
    Command(Option<Command>),
    BatchReady,
    Tick,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        let mut ticker =
            interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wakeup = {
                let shared = self.shared.clone();
                tokio::select! {
                    command = self.rx.recv() => Wakeup::Command(command),
                    _ = shared.batch_ready.notified() => Wakeup::BatchReady,
                    _ = ticker.tick() => Wakeup::Tick,
                }
            };

            match wakeup {
                Wakeup::Command(Some(Command::Flush(done))) => {
                    if self.handle_flush(done).await {
                        break;
                    }
                }
                Wakeup::Command(Some(Command::Shutdown(done))) => {
                    self.shutdown_drain().await;
                    let _ = done.send(());
                    break;
                }
                // Every handle is gone; drain what we can and exit.
                Wakeup::Command(None) => {
                    self.shutdown_drain().await;
                    break;
                }
                Wakeup::BatchReady | Wakeup::Tick => {
                    self.drain().await;
                }
            }
        }

        self.shared.state.store(LifecycleState::Terminated);
    }

    /// Run one drain on behalf of a forced flush, resolving every flush
    /// request queued behind it with the same result. Returns `true` when
    /// a shutdown command was pulled out of the backlog and handled.
    async fn handle_flush(&mut self, first: oneshot::Sender<FlushReport>) -> bool {
        let mut waiters = vec![first];
        let mut pending_shutdown = None;
        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Flush(done) => waiters.push(done),
                Command::Shutdown(done) => {
                    pending_shutdown = Some(done);
                    break;
                }
            }
        }

        let report = self.drain().await;
        for waiter in waiters {
            let _ = waiter.send(report);
        }

        if let Some(done) = pending_shutdown {
            self.shutdown_drain().await;
            let _ = done.send(());
            return true;
        }
        false
    }

    /// Deliver batches from the queue head until it is empty.
    ///
    /// Each iteration snapshots one batch, sends it, then removes only
    /// events at or below the snapshot watermark. A partially rejected
    /// subset is parked in `deferred` for the next cycle instead of being
    /// resent here; a collector that keeps rejecting the same events
    /// would otherwise pin this loop.
    async fn drain(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        let mut deferred: Vec<Event> = Vec::new();

        loop {
            let batch = self.shared.queue.lock().unwrap().peek_batch(self.batch_size);
            if batch.is_empty() {
                break;
            }
            let watermark = batch.last().map(|event| event.sequence).unwrap_or(0);
            let payload = BatchPayload::new(self.project_id.clone(), batch);

            match self.delivery.send_batch(&payload).await {
                Ok(receipt) => {
                    self.shared.queue.lock().unwrap().remove_through(watermark);
                    if receipt.accepted_all() {
                        report.delivered += payload.len();
                    } else {
                        let total = payload.len();
                        let mut rejected_mask = vec![false; total];
                        for &index in &receipt.rejected {
                            if index < total {
                                rejected_mask[index] = true;
                            }
                        }
                        let mut rejected = Vec::new();
                        for (index, event) in payload.events.into_iter().enumerate() {
                            if rejected_mask[index] {
                                rejected.push(event);
                            }
                        }
                        report.delivered += total - rejected.len();
                        report.requeued += rejected.len();
                        deferred.extend(rejected);
                    }
                }
                Err(error) => {
                    self.shared.queue.lock().unwrap().remove_through(watermark);
                    report.dropped += payload.len();
                    self.report_dropped(payload.len(), error);
                }
            }
        }

        if !deferred.is_empty() {
            let (lost, capacity) = {
                let mut queue = self.shared.queue.lock().unwrap();
                (queue.requeue_front(deferred), queue.capacity())
            };
            if lost > 0 {
                self.shared.counters.evicted.fetch_add(lost as u64, Ordering::Relaxed);
                self.shared
                    .reporter
                    .report(&BeaconError::QueueOverflow { capacity, evicted: lost });
            }
        }

        self.shared.counters.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.shared.counters.dropped_failed.fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    /// One best-effort final drain bounded by `shutdown_timeout`.
    ///
    /// On timeout the in-flight drain future is dropped, abandoning any
    /// delivery attempt mid-send; whatever is still queued is discarded
    /// and the loss reported.
    async fn shutdown_drain(&mut self) {
        let timed_out =
            tokio::time::timeout(self.shutdown_timeout, self.drain()).await.is_err();
        let discarded = self.shared.queue.lock().unwrap().clear();
        if timed_out || discarded > 0 {
            self.shared.reporter.report(&BeaconError::ShutdownTimeout {
                timeout: self.shutdown_timeout,
                discarded,
            });
        }
    }

    fn report_dropped(&self, count: usize, source: DeliveryError) {
        self.shared.reporter.report(&BeaconError::BatchDropped { count, source });
    }
}
