//! Time utilities for sleeplog
//!
//! Records are stored in UTC and shown in local time.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `SLEEPLOG_MOCK_TIME` environment variable can be set
//! to override the system time for every place that asks for "now". This is
//! useful for exercising the statistics window without waiting for days.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` in local time (e.g., `2026-02-14 07:30:00`)
//!
//! Example:
//! ```bash
//! SLEEPLOG_MOCK_TIME="2026-02-14 07:30:00" sleeplog end
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "SLEEPLOG_MOCK_TIME";

/// Format accepted by `SLEEPLOG_MOCK_TIME`
#[cfg_attr(not(debug_assertions), allow(dead_code))]
const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local formats accepted by [`parse_timestamp`], tried in order
const LOCAL_INPUT_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Utc::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            match parse_local(&mock_time_str, &[MOCK_TIME_FORMAT]) {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(Utc::now());
                    tracing::info!(
                        mock_time = %mock_time_str,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = MOCK_TIME_FORMAT,
                        "Invalid mock time, using the system clock"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Errors from parsing user-supplied timestamps
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("Empty timestamp")]
    Empty,

    #[error("Unrecognized timestamp '{0}' (use RFC 3339 or 'YYYY-MM-DD HH:MM')")]
    Unrecognized(String),

    #[error("Timestamp '{0}' does not exist in the local timezone")]
    NonexistentLocalTime(String),
}

/// Parse a timestamp typed by a user.
///
/// Accepts `now`, RFC 3339 with any offset, or a local `YYYY-MM-DD HH:MM[:SS]`.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TimeParseError::Empty);
    }

    if input.eq_ignore_ascii_case("now") {
        return Ok(now());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let parsed_naive = LOCAL_INPUT_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(input, format).is_ok());

    match parse_local(input, LOCAL_INPUT_FORMATS) {
        Some(dt) => Ok(dt),
        None if parsed_naive => Err(TimeParseError::NonexistentLocalTime(input.to_string())),
        None => Err(TimeParseError::Unrecognized(input.to_string())),
    }
}

/// Interpret `input` as local wall-clock time; ambiguous times resolve to the earlier instant.
fn parse_local(input: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    formats.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(input, format).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Format a timestamp for display in local time.
pub fn format_local(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

/// Convert a signed chrono duration for display, clamping negatives to zero
pub fn to_std_duration(d: chrono::Duration) -> Duration {
    d.to_std().unwrap_or(Duration::ZERO)
}
