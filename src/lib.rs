#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Beacon 📡
//!
//! Client-side analytics event shipper: a bounded, best-effort,
//! at-least-once pipeline from `track()` to a remote collector.
//!
//! ## Features
//!
//! - **Bounded event queue** with an explicit oldest-event eviction policy
//! - **Track levels** (essential / standard / verbose) with a runtime-mutable
//!   gate and a master kill switch
//! - **Batching** by size threshold, periodic interval, and forced flush
//! - **Retrying delivery** with backoff strategies, jitter, and
//!   transient/permanent failure classification
//! - **Partial-failure requeue**: individually rejected events return to the
//!   queue head in order
//! - **Graceful shutdown** with one bounded best-effort final drain
//! - **No surprises for the host**: `track()` never blocks or errors; every
//!   data loss is observable via the error callback and `tracing`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon::{Beacon, ClientConfig, Properties, TrackLevel};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), beacon::InitError> {
//!     let config = ClientConfig::builder("proj_demo")
//!         .batch_size(25)
//!         .flush_interval(Duration::from_secs(10))
//!         .build();
//!     let client = Beacon::init(config)?;
//!
//!     client.track("app_started");
//!     client.track_at("cache_hit", TrackLevel::Verbose, Properties::new());
//!
//!     let report = client.flush().await;
//!     println!("flushed: {:?}", report);
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod filter;
pub mod jitter;
pub mod queue;
pub mod sleeper;
pub mod transport;

mod worker;

// Re-exports
pub use backoff::{Backoff, BackoffError, MAX_BACKOFF};
pub use client::{Beacon, ClientStats, FlushError, FlushReport, LifecycleState};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use delivery::{DeliveryClient, DeliveryError};
pub use error::{BeaconError, ErrorCallback, InitError};
pub use event::{Event, Properties, TrackLevel};
pub use filter::TrackFilter;
pub use jitter::Jitter;
pub use queue::EventQueue;
pub use sleeper::{InstantSleeper, RecordingSleeper, Sleeper, TokioSleeper};
pub use transport::{BatchPayload, BatchReceipt, Transport, TransportError, DEFAULT_API_URL};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
