//! Test utilities.
//!
//! In-memory log capture for asserting on the lines a proxy emits, and a
//! store that never answers for exercising cancellation.

use std::fmt;
use std::future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tracing_subscriber::fmt::MakeWriter;

use crate::interfaces::{AccessMode, ByteRange, KeyStream, Result, Store};

/// `MakeWriter` that appends everything written to a shared buffer.
#[derive(Clone, Default)]
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Store whose data operations never complete.
///
/// Flags and listings answer immediately; `get`, `exists` and the writes
/// stay pending until the caller drops them.
#[derive(Debug, Default)]
pub struct StalledStore {
    is_open: AtomicBool,
}

impl StalledStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for StalledStore {
    fn name(&self) -> &'static str {
        "StalledStore"
    }

    fn supports_writes(&self) -> bool {
        true
    }

    fn supports_deletes(&self) -> bool {
        true
    }

    fn supports_partial_writes(&self) -> bool {
        true
    }

    fn supports_listing(&self) -> bool {
        true
    }

    fn mode(&self) -> AccessMode {
        AccessMode::Write
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    fn set_open(&self, open: bool) {
        self.is_open.store(open, Ordering::Release);
    }

    async fn get(&self, _key: &str, _byte_range: Option<ByteRange>) -> Result<Option<Bytes>> {
        future::pending().await
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        future::pending().await
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<()> {
        future::pending().await
    }

    async fn set_if_not_exists(&self, _key: &str, _value: Bytes) -> Result<bool> {
        future::pending().await
    }

    async fn set_partial_values(&self, _key_start_values: &[(String, u64, Bytes)]) -> Result<()> {
        future::pending().await
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        future::pending().await
    }

    fn list(&self) -> KeyStream<'_> {
        stream::empty().boxed()
    }

    fn list_prefix(&self, _prefix: &str) -> KeyStream<'_> {
        stream::empty().boxed()
    }

    fn list_dir(&self, _prefix: &str) -> KeyStream<'_> {
        stream::empty().boxed()
    }

    fn with_mode(&self, _mode: AccessMode) -> Result<Self> {
        Ok(Self::new())
    }
}

impl fmt::Display for StalledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stalled://")
    }
}
