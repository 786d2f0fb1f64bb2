//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::advice::LoggingStore;
use crate::config::{LoggingConfig, StorageConfig, StorageType};
use crate::interfaces::{AccessMode, Store};

pub mod local;
pub mod memory;
pub mod path;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use path::StorePath;

/// Initialize storage based on configuration.
///
/// The configured backend is wrapped in a [`LoggingStore`] when call logging
/// is enabled. The returned store is not yet open.
pub fn init_store(config: &StorageConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let mode: AccessMode = config.mode.parse()?;

    match config.storage_type {
        StorageType::Memory => {
            info!(%mode, "Storage: memory");
            with_logging(MemoryStore::new(mode), &config.logging)
        }
        StorageType::Local => {
            info!(%mode, root = %config.local.root.display(), "Storage: local");
            with_logging(LocalStore::new(&config.local.root, mode), &config.logging)
        }
    }
}

fn with_logging<S: Store + 'static>(
    store: S,
    logging: &LoggingConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if !logging.enabled {
        return Ok(Arc::new(store));
    }
    let store = LoggingStore::with_logging(store, &logging.level, None)?;
    info!(logger = store.logger_name(), level = %store.log_level(), "Call logging enabled");
    Ok(Arc::new(store))
}
