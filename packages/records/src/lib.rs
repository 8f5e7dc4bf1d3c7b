#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking status time series.
//!
//! The fetcher samples every lot roughly every half hour and stores the raw
//! codes keyed by epoch seconds. [`ingest`] snaps those samples onto a
//! half-hour grid of local wall-clock slots, and [`index`] answers "what did
//! each lot look like at this viewed date" for single slots as well as
//! day-group aggregates.

pub mod index;
pub mod ingest;

pub use index::{Direction, TemporalIndex, resolve_timestamps};
pub use ingest::{RawStatusRecords, SLOT_KEY_FORMAT, slot_key};

/// Length of one sampling slot in minutes.
pub const SLOT_MINUTES: i64 = 30;

/// Number of sampling slots in a full day.
pub const SLOTS_PER_DAY: u32 = 48;

/// Errors that can occur while loading status records.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record key could not be interpreted as a timestamp.
    #[error("Invalid record timestamp: '{key}'")]
    InvalidTimestamp {
        /// The offending record key.
        key: String,
    },
}
