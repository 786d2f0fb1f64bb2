//! Abstract interfaces for storewatch components.
//!
//! These traits define the contracts for:
//! - Key-value storage (backends and the advice wrapped around them)

pub mod store;

pub use store::{AccessMode, ByteRange, Capabilities, KeyStream, Result, Store, StoreError};
