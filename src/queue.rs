//! Bounded FIFO buffer of pending events.
//!
//! Invariants:
//! - Events are never reordered; `peek_batch` observes, only `remove_through`
//!   and eviction mutate the front.
//! - Length never exceeds capacity. On overflow the oldest event is evicted
//!   (telemetry favors recency over completeness under memory pressure);
//!   evictions are counted so the caller can report them.
//! - Single-writer/single-drainer access is assumed; the client serializes
//!   access through a mutex and the worker task is the only drainer.

use crate::event::Event;
use std::collections::VecDeque;

/// Bounded in-memory queue of events awaiting delivery.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
    evicted: u64,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: VecDeque::new(), capacity: capacity.max(1), evicted: 0 }
    }

    /// Append an event, evicting and returning the oldest one when full.
    pub fn enqueue(&mut self, event: Event) -> Option<Event> {
        let evicted = if self.events.len() >= self.capacity {
            self.evicted += 1;
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Clone up to `max` events from the head without mutating the queue.
    pub fn peek_batch(&self, max: usize) -> Vec<Event> {
        self.events.iter().take(max).cloned().collect()
    }

    /// Remove queued events with `sequence <= watermark`.
    ///
    /// The watermark is the last sequence of the snapshot a flush took, so
    /// events enqueued during an in-flight send are never removed here.
    pub fn remove_through(&mut self, watermark: u64) {
        while let Some(front) = self.events.front() {
            if front.sequence > watermark {
                break;
            }
            self.events.pop_front();
        }
    }

    /// Reinsert events at the head in their original relative order.
    ///
    /// Used for the rejected subset of a partially accepted batch. If the
    /// queue cannot hold them all, the oldest of the combined queue are
    /// evicted; returns how many were lost that way.
    pub fn requeue_front(&mut self, events: Vec<Event>) -> usize {
        for event in events.into_iter().rev() {
            self.events.push_front(event);
        }
        let mut dropped = 0;
        while self.events.len() > self.capacity {
            self.events.pop_front();
            self.evicted += 1;
            dropped += 1;
        }
        dropped
    }

    /// Discard everything, returning how many events were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events evicted by the overflow policy since construction.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
