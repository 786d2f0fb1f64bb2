//! Aspect-oriented advice for cross-cutting concerns.
//!
//! Wrapper types that add orthogonal behavior to a [`Store`](crate::interfaces::Store)
//! without touching the backend implementations.
//!
//! # Architecture
//!
//! Advice is applied at composition time, not in implementations:
//!
//! ```ignore
//! // Core implementation - plain storage
//! let store = LocalStore::new("/var/lib/data", AccessMode::Append);
//!
//! // Apply advice layers
//! let store = LoggingStore::with_logging(store, "INFO", None)?;
//!
//! // Use as normal - logging is transparent
//! store.set("group/zarr.json", body).await?;
//! ```
//!
//! # Available Advice
//!
//! - [`LoggingStore`] - Logs and counts every call to the wrapped store

mod counter;
mod handler;
mod logging;

pub use counter::{Operation, OperationCounter};
pub use handler::{LogHandler, LogLevel, LoggingError};
pub use logging::LoggingStore;
