//! Validated settings

use crate::schema::RawConfig;
use sleeplog_api::{DEFAULT_FILE_NAME, DEFAULT_RECENT_WINDOW_DAYS};
use sleeplog_util::default_data_dir;
use std::path::PathBuf;

/// Default tracing level
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Validated settings ready for use by the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub storage: StorageSettings,
    pub stats: StatsSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            storage: StorageSettings {
                data_dir: raw.storage.data_dir.unwrap_or_else(default_data_dir),
                file_name: raw
                    .storage
                    .file_name
                    .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            },
            stats: StatsSettings {
                recent_window_days: raw
                    .stats
                    .recent_window_days
                    .unwrap_or(DEFAULT_RECENT_WINDOW_DAYS),
            },
            logging: LoggingSettings {
                level: raw
                    .logging
                    .level
                    .map(|l| l.to_ascii_lowercase())
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            },
        }
    }
}

/// Snapshot file location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub file_name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSettings {
    pub recent_window_days: u32,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
