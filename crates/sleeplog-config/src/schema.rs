//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Where the snapshot file lives
    #[serde(default)]
    pub storage: RawStorageConfig,

    /// Statistics settings
    #[serde(default)]
    pub stats: RawStatsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: RawLoggingConfig,
}

/// Storage settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawStorageConfig {
    /// Directory holding the snapshot file (default: platform data dir)
    pub data_dir: Option<PathBuf>,

    /// Snapshot file name inside `data_dir` (default: sleep_records.json)
    pub file_name: Option<String>,
}

/// Statistics settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawStatsConfig {
    /// Days covered by the average sleep duration (default: 14)
    pub recent_window_days: Option<u32>,
}

/// Logging settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawLoggingConfig {
    /// Default tracing filter level, overridden by RUST_LOG
    pub level: Option<String>,
}
