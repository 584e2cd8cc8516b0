//! Shared utilities for sleeplog
//!
//! This crate provides:
//! - ID types (RecordId, SubscriptionId)
//! - Time utilities (mockable clock, timestamp parsing and display)
//! - Default paths for data and config

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
