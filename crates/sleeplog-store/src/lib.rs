//! Persistence and state ownership for sleeplog
//!
//! Provides:
//! - `SleepStore`, the single owner of the current `Snapshot`
//! - Atomic JSON persistence of every committed snapshot
//! - Ordered fan-out of snapshots to any number of subscribers
//! - `StoragePathProvider`, the seam that decides where the file lives

mod persist;
mod provider;
mod store;
mod subscription;

pub use provider::*;
pub use store::*;
pub use subscription::Subscription;

use chrono::{DateTime, Utc};
use sleeplog_util::RecordId;
use std::path::PathBuf;
use thiserror::Error;

/// Store errors
///
/// A failed operation never leaves a partial mutation behind, so retrying is always safe.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("End date must be after start date (start {start}, end {end})")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("A sleep session is already running (started {started_at})")]
    SessionAlreadyActive { started_at: DateTime<Utc> },

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Store has shut down")]
    Closed,
}

/// Failures reaching or decoding the backing file
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No writable location for '{file_name}': {reason}")]
    Unresolvable { file_name: String, reason: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
