//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Levels accepted by `logging.level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Longest accepted `stats.recent_window_days`, roughly a century
pub const MAX_STATS_WINDOW_DAYS: u32 = 36_500;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("storage.file_name: {0}")]
    InvalidFileName(String),

    #[error("stats.recent_window_days must be at least 1")]
    EmptyStatsWindow,

    #[error("stats.recent_window_days is {0}, the maximum is {MAX_STATS_WINDOW_DAYS}")]
    StatsWindowTooLong(u32),

    #[error("logging.level '{0}' is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Validate a raw configuration, collecting every problem
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(file_name) = &config.storage.file_name {
        if let Err(e) = validate_file_name(file_name) {
            errors.push(e);
        }
    }

    match config.stats.recent_window_days {
        Some(0) => errors.push(ValidationError::EmptyStatsWindow),
        Some(days) if days > MAX_STATS_WINDOW_DAYS => {
            errors.push(ValidationError::StatsWindowTooLong(days));
        }
        _ => {}
    }

    if let Some(level) = &config.logging.level {
        if let Err(e) = validate_log_level(level) {
            errors.push(e);
        }
    }

    errors
}

/// A log level must be one of [`LOG_LEVELS`], in any case
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::UnknownLogLevel(level.to_string()))
    }
}

/// A file name must name a single entry inside the data directory
pub fn validate_file_name(file_name: &str) -> Result<(), ValidationError> {
    if file_name.trim().is_empty() {
        return Err(ValidationError::InvalidFileName("cannot be empty".into()));
    }

    if file_name.contains('/') || file_name.contains('\\') {
        return Err(ValidationError::InvalidFileName(format!(
            "'{}' must not contain path separators",
            file_name
        )));
    }

    if file_name == "." || file_name == ".." {
        return Err(ValidationError::InvalidFileName(format!(
            "'{}' is not a file name",
            file_name
        )));
    }

    Ok(())
}
