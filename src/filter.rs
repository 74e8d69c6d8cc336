//! Admission gate: track-level verbosity plus the master kill switch.

use crate::event::TrackLevel;
use std::sync::atomic::{AtomicU8, Ordering};

/// Decides whether an event is admitted based on the current track level.
///
/// The level is runtime-mutable and takes effect for subsequent `track`
/// calls only; already-queued events are never retroactively filtered.
/// `disabled` short-circuits admission entirely.
#[derive(Debug)]
pub struct TrackFilter {
    level: AtomicU8,
    disabled: bool,
}

impl TrackFilter {
    pub fn new(level: TrackLevel, disabled: bool) -> Self {
        Self { level: AtomicU8::new(level.as_u8()), disabled }
    }

    /// Admit iff the event's required level is at or below the current
    /// level and the client is not disabled.
    pub fn admit(&self, required: TrackLevel) -> bool {
        !self.disabled && required.as_u8() <= self.level.load(Ordering::Relaxed)
    }

    pub fn level(&self) -> TrackLevel {
        TrackLevel::from_repr(self.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_level(&self, level: TrackLevel) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }
}
