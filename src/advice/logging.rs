//! Logging advice.
//!
//! Wraps any [`Store`] so that every call is written to a log sink and
//! counted, without changing what the wrapped store returns:
//!
//! ```text
//! Calling MemoryStore.get(a/b)
//! Finished MemoryStore.get(a/b) [0.00s]
//! ```
//!
//! The finished line is emitted by a drop guard, so it is written whether the
//! call succeeds, fails, or its future is dropped before completion.
//!
//! Listing operations are bracketed only while the stream is obtained. The
//! inner stream is handed back as-is, so its keys and their order are exactly
//! those of the wrapped store, and consuming it is not part of the logged
//! duration.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::Level;

use super::counter::{Operation, OperationCounter};
use super::handler::{LogHandler, LogLevel, Result as LoggingResult};
use crate::interfaces::{AccessMode, ByteRange, KeyStream, Result, Store};

const NO_HINT: &str = "";

/// Store wrapper that logs and counts all calls to the wrapped store.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::new(AccessMode::Write);
/// let store = LoggingStore::with_logging(store, "INFO", None)?;
///
/// store.set("a", Bytes::from_static(b"1")).await?;
/// assert_eq!(store.counter().get(Operation::Set), 1);
/// ```
pub struct LoggingStore<S> {
    inner: S,
    counter: OperationCounter,
    logger: Logger,
}

/// Named logger owned by one proxy.
struct Logger {
    name: String,
    level: LogLevel,
    handler: LogHandler,
}

impl Logger {
    fn info(&self, message: fmt::Arguments<'_>) {
        if self.level.enables(Level::INFO) {
            self.handler
                .in_scope(|| tracing::info!(logger = %self.name, "{}", message));
        }
    }
}

/// Open bracket around one delegated call.
struct CallGuard<'a> {
    logger: &'a Logger,
    call: String,
    start: Instant,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.logger
            .info(format_args!("Finished {} [{:.2}s]", self.call, elapsed));
    }
}

impl<S: Store> LoggingStore<S> {
    /// Wrap `inner`, logging at DEBUG to the default console sink.
    pub fn new(inner: S) -> Self {
        let level = LogLevel::default();
        Self::from_parts(inner, level, LogHandler::console(level))
    }

    /// Wrap `inner` with an explicit level and optional sink.
    ///
    /// # Arguments
    /// * `inner` - The store to wrap
    /// * `log_level` - Severity name, e.g. "DEBUG", "INFO", "WARNING"
    /// * `log_handler` - Sink for log lines; a console sink when `None`
    ///
    /// # Errors
    /// Returns [`LoggingError::InvalidLevel`](super::LoggingError::InvalidLevel)
    /// if `log_level` is not a known severity.
    pub fn with_logging(
        inner: S,
        log_level: &str,
        log_handler: Option<LogHandler>,
    ) -> LoggingResult<Self> {
        let level: LogLevel = log_level.parse()?;
        let handler = log_handler.unwrap_or_else(|| LogHandler::console(level));
        Ok(Self::from_parts(inner, level, handler))
    }

    fn from_parts(inner: S, level: LogLevel, handler: LogHandler) -> Self {
        let name = format!("LoggingStore({inner})");
        Self {
            inner,
            counter: OperationCounter::new(),
            logger: Logger {
                name,
                level,
                handler,
            },
        }
    }

    /// Get a reference to the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consume the wrapper and return the wrapped store.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Calls recorded so far, by operation.
    pub fn counter(&self) -> &OperationCounter {
        &self.counter
    }

    pub fn log_level(&self) -> LogLevel {
        self.logger.level
    }

    pub fn log_handler(&self) -> &LogHandler {
        &self.logger.handler
    }

    /// Name attached to every line this proxy logs.
    pub fn logger_name(&self) -> &str {
        &self.logger.name
    }

    /// Log the start of `op`, count it, and return the guard that logs its end.
    fn log(&self, op: Operation, hint: impl fmt::Display) -> CallGuard<'_> {
        let hint = hint.to_string();
        let call = if hint.is_empty() {
            format!("{}.{}", self.inner.name(), op)
        } else {
            format!("{}.{}({})", self.inner.name(), op, hint)
        };
        self.logger.info(format_args!("Calling {call}"));
        self.counter.increment(op);
        CallGuard {
            logger: &self.logger,
            call,
            start: Instant::now(),
        }
    }
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a str>) -> String {
    keys.collect::<Vec<_>>().join(",")
}

#[async_trait]
impl<S: Store> Store for LoggingStore<S> {
    fn name(&self) -> &'static str {
        "LoggingStore"
    }

    fn supports_writes(&self) -> bool {
        let _call = self.log(Operation::SupportsWrites, NO_HINT);
        self.inner.supports_writes()
    }

    fn supports_deletes(&self) -> bool {
        let _call = self.log(Operation::SupportsDeletes, NO_HINT);
        self.inner.supports_deletes()
    }

    fn supports_partial_writes(&self) -> bool {
        let _call = self.log(Operation::SupportsPartialWrites, NO_HINT);
        self.inner.supports_partial_writes()
    }

    fn supports_listing(&self) -> bool {
        let _call = self.log(Operation::SupportsListing, NO_HINT);
        self.inner.supports_listing()
    }

    fn mode(&self) -> AccessMode {
        let _call = self.log(Operation::Mode, NO_HINT);
        self.inner.mode()
    }

    fn is_open(&self) -> bool {
        let _call = self.log(Operation::IsOpen, NO_HINT);
        self.inner.is_open()
    }

    fn set_open(&self, open: bool) {
        let _call = self.log(Operation::SetOpen, open);
        self.inner.set_open(open)
    }

    async fn open(&self) -> Result<()> {
        let _call = self.log(Operation::Open, NO_HINT);
        self.inner.open().await
    }

    async fn ensure_open(&self) -> Result<()> {
        let _call = self.log(Operation::EnsureOpen, NO_HINT);
        self.inner.ensure_open().await
    }

    async fn empty(&self) -> Result<bool> {
        let _call = self.log(Operation::Empty, NO_HINT);
        self.inner.empty().await
    }

    async fn clear(&self) -> Result<()> {
        let _call = self.log(Operation::Clear, NO_HINT);
        self.inner.clear().await
    }

    async fn get(&self, key: &str, byte_range: Option<ByteRange>) -> Result<Option<Bytes>> {
        let _call = self.log(Operation::Get, key);
        self.inner.get(key, byte_range).await
    }

    async fn get_partial_values(
        &self,
        key_ranges: &[(String, Option<ByteRange>)],
    ) -> Result<Vec<Option<Bytes>>> {
        let keys = join_keys(key_ranges.iter().map(|(key, _)| key.as_str()));
        let _call = self.log(Operation::GetPartialValues, keys);
        self.inner.get_partial_values(key_ranges).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let _call = self.log(Operation::Exists, key);
        self.inner.exists(key).await
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let _call = self.log(Operation::Set, key);
        self.inner.set(key, value).await
    }

    async fn set_if_not_exists(&self, key: &str, value: Bytes) -> Result<bool> {
        let _call = self.log(Operation::SetIfNotExists, key);
        self.inner.set_if_not_exists(key, value).await
    }

    async fn set_partial_values(&self, key_start_values: &[(String, u64, Bytes)]) -> Result<()> {
        let keys = join_keys(key_start_values.iter().map(|(key, _, _)| key.as_str()));
        let _call = self.log(Operation::SetPartialValues, keys);
        self.inner.set_partial_values(key_start_values).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _call = self.log(Operation::Delete, key);
        self.inner.delete(key).await
    }

    fn list(&self) -> KeyStream<'_> {
        let _call = self.log(Operation::List, NO_HINT);
        self.inner.list()
    }

    fn list_prefix(&self, prefix: &str) -> KeyStream<'_> {
        let _call = self.log(Operation::ListPrefix, prefix);
        self.inner.list_prefix(prefix)
    }

    fn list_dir(&self, prefix: &str) -> KeyStream<'_> {
        let _call = self.log(Operation::ListDir, prefix);
        self.inner.list_dir(prefix)
    }

    fn with_mode(&self, mode: AccessMode) -> Result<Self> {
        let _call = self.log(Operation::WithMode, mode);
        let inner = self.inner.with_mode(mode)?;
        Ok(Self::from_parts(
            inner,
            self.logger.level,
            self.logger.handler.clone(),
        ))
    }
}

impl<S, O> PartialEq<O> for LoggingStore<S>
where
    S: Store + PartialEq<O>,
    O: fmt::Display,
{
    fn eq(&self, other: &O) -> bool {
        let _call = self.log(Operation::Eq, other);
        self.inner.eq(other)
    }
}

impl<S: fmt::Display> fmt::Display for LoggingStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "logging-{}", self.inner)
    }
}

impl<S: fmt::Debug> fmt::Debug for LoggingStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoggingStore({:?})", self.inner)
    }
}
