//! Bootstrap utilities for storewatch binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the STOREWATCH_LOG environment variable.
///
/// Defaults to "info" level if STOREWATCH_LOG is not set. This only governs
/// the crate's own diagnostics; a `LoggingStore` writes its call lines to its
/// own handler.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
