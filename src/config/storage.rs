//! Storage configuration types.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Local,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Memory => f.write_str("memory"),
            StorageType::Local => f.write_str("local"),
        }
    }
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Access mode: "r", "r+", "a", "w" or "w-".
    pub mode: String,
    /// Local filesystem configuration.
    pub local: LocalConfig,
    /// Call logging around the configured store.
    pub logging: LoggingConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            mode: "a".to_string(),
            local: LocalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Local filesystem configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Root directory holding one file per key.
    pub root: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/store"),
        }
    }
}

/// Call logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Wrap the store in a `LoggingStore`.
    /// Default: true
    pub enabled: bool,
    /// Level of the proxy's logger, e.g. "DEBUG", "INFO", "WARNING".
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "DEBUG".to_string(),
        }
    }
}
