//! Event model: named occurrences with leveled admission and strict ordering.
//!
//! Semantics:
//! - `name` is a non-empty identifier chosen by the producer.
//! - `level` is the minimum client track level required to admit the event.
//! - `sequence` is strictly increasing per client instance and defines the
//!   delivery order; `timestamp_ms` records wall-clock capture time for the
//!   collector.
//! - Events are immutable once captured.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Structured properties attached to an event.
pub type Properties = Map<String, Value>;

/// Verbosity tier controlling which events are admitted.
///
/// Ordered: `Essential < Standard < Verbose`. An event is admitted iff its
/// required level is at or below the client's current level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TrackLevel {
    /// Always-on events: signups, purchases, crashes.
    Essential = 1,
    /// Default tier for routine product analytics.
    #[default]
    Standard = 2,
    /// High-volume diagnostics: cache hits, scroll ticks.
    Verbose = 3,
}

impl TrackLevel {
    /// Numeric representation used on the wire and in the level gate.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric level; `None` for anything outside 1..=3.
    pub fn from_repr(value: u8) -> Option<Self> {
        match value {
            1 => Some(TrackLevel::Essential),
            2 => Some(TrackLevel::Standard),
            3 => Some(TrackLevel::Verbose),
            _ => None,
        }
    }
}

impl fmt::Display for TrackLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackLevel::Essential => write!(f, "essential"),
            TrackLevel::Standard => write!(f, "standard"),
            TrackLevel::Verbose => write!(f, "verbose"),
        }
    }
}

impl Serialize for TrackLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for TrackLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        TrackLevel::from_repr(value)
            .ok_or_else(|| de::Error::custom(format!("track level out of range: {}", value)))
    }
}

/// One named occurrence submitted for tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub level: TrackLevel,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Properties,
    pub timestamp_ms: u64,
    pub sequence: u64,
}

impl Event {
    /// Capture an event now. The sequence number is assigned by the client
    /// and must be unique and increasing within one instance.
    pub fn new(
        name: impl Into<String>,
        level: TrackLevel,
        properties: Properties,
        sequence: u64,
    ) -> Self {
        Self { name: name.into(), level, properties, timestamp_ms: now_ms(), sequence }
    }
}

/// Milliseconds since the unix epoch, saturating at zero on clock skew.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
