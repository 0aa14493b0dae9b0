//! TOML configuration schema for the layout engine.
//!
//! All structs derive `Deserialize` and `Serialize` with sensible defaults
//! via `#[serde(default)]`, so a partial or absent config file yields a
//! fully usable configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Corresponds to the full TOML file structure:
/// ```toml
/// [store]
/// channel_capacity = 256
/// auto_repair = true
///
/// [log]
/// filter = "info"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Layout store tuning.
    pub store: StoreConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// Layout store settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the UI notification broadcast channel. Values below 1
    /// are treated as 1.
    pub channel_capacity: usize,
    /// When true, instances whose stored config fails validation are
    /// repaired to the widget's defaults and flagged for persistence on
    /// their next save. When false they are dropped at load time.
    pub auto_repair: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            auto_repair: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Default tracing filter directive, overridden by the
    /// `DASHBOARD_LAYOUT_LOG` environment variable.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
