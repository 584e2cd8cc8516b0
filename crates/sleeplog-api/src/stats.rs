//! Aggregate metrics over a list of records

use chrono::{DateTime, Utc};
use sleeplog_util::to_std_duration;
use std::time::Duration;

use crate::Record;

/// Default look-back window for the average, in days
pub const DEFAULT_RECENT_WINDOW_DAYS: u32 = 14;

/// Summary numbers for a set of sleep records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SleepStatistics {
    /// Average duration of records that started inside the recent window
    pub average_duration: Duration,
    /// Number of records overall
    pub total_sleeps: usize,
    /// Duration of the record with the latest start
    pub most_recent_duration: Option<Duration>,
}

impl SleepStatistics {
    pub fn empty() -> Self {
        Self {
            average_duration: Duration::ZERO,
            total_sleeps: 0,
            most_recent_duration: None,
        }
    }

    /// Compute statistics for `records` as seen at `now`.
    ///
    /// Records do not need to be sorted.
    pub fn from_records(records: &[Record], recent_window_days: u32, now: DateTime<Utc>) -> Self {
        // A window reaching past the earliest representable instant covers everything
        let earliest = now
            .checked_sub_signed(chrono::Duration::days(i64::from(recent_window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let window: Vec<Duration> = records
            .iter()
            .filter(|r| r.start_date >= earliest)
            .map(|r| to_std_duration(r.duration()))
            .collect();

        let average_duration = if window.is_empty() {
            Duration::ZERO
        } else {
            window.iter().sum::<Duration>() / window.len() as u32
        };

        let most_recent_duration = records
            .iter()
            .max_by_key(|r| r.start_date)
            .map(|r| to_std_duration(r.duration()));

        Self {
            average_duration,
            total_sleeps: records.len(),
            most_recent_duration,
        }
    }
}

impl Default for SleepStatistics {
    fn default() -> Self {
        Self::empty()
    }
}
