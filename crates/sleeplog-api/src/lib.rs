//! Value types shared by the sleeplog store and its consumers
//!
//! This crate defines:
//! - `Record`, a completed sleep interval
//! - `Snapshot`, the unit of persisted and broadcast state
//! - Operation outcomes (`EndOutcome`, `LoadOutcome`)
//! - `SleepStatistics`, pure aggregation over records

mod stats;
mod types;

pub use stats::*;
pub use types::*;

/// Default name of the snapshot file inside the data directory
pub const DEFAULT_FILE_NAME: &str = "sleep_records.json";
