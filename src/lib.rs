//! storewatch - instrumented key-value storage
//!
//! An asynchronous key-value [`Store`](interfaces::Store) abstraction with
//! in-memory and filesystem backends, and a [`LoggingStore`](advice::LoggingStore)
//! proxy that logs and counts every call made to any store it wraps.

pub mod advice;
pub mod config;
pub mod interfaces;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
