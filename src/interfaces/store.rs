//! Key-value store interface.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Lazy stream of keys produced by the listing operations.
///
/// Streams are finite and not resumable: to list again, call the
/// operation again.
pub type KeyStream<'a> = BoxStream<'a, Result<String>>;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{operation} is not supported by this store")]
    Unsupported { operation: &'static str },

    #[error("store mode does not support writing")]
    ReadOnly,

    #[error("store is already open")]
    AlreadyOpen,

    #[error("store already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("invalid offset {offset} for key {key:?}")]
    InvalidOffset { key: String, offset: u64 },

    #[error("invalid access mode {0:?}: expected one of 'r', 'r+', 'a', 'w', 'w-'")]
    InvalidMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Access mode a store instance is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// `r`: read only, must exist.
    #[default]
    Read,
    /// `r+`: read/write, must exist.
    ReadWrite,
    /// `a`: read/write, create if missing.
    Append,
    /// `w`: create, overwriting existing content.
    Write,
    /// `w-`: create, failing if content exists.
    WriteNew,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::ReadWrite => "r+",
            AccessMode::Append => "a",
            AccessMode::Write => "w",
            AccessMode::WriteNew => "w-",
        }
    }

    pub fn readonly(&self) -> bool {
        matches!(self, AccessMode::Read)
    }

    pub fn overwrite(&self) -> bool {
        matches!(self, AccessMode::Write)
    }

    pub fn create(&self) -> bool {
        matches!(
            self,
            AccessMode::Append | AccessMode::Write | AccessMode::WriteNew
        )
    }

    pub fn update(&self) -> bool {
        matches!(self, AccessMode::ReadWrite | AccessMode::Append)
    }
}

impl FromStr for AccessMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(AccessMode::Read),
            "r+" => Ok(AccessMode::ReadWrite),
            "a" => Ok(AccessMode::Append),
            "w" => Ok(AccessMode::Write),
            "w-" => Ok(AccessMode::WriteNew),
            other => Err(StoreError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open byte interval over a stored value.
///
/// A `None` bound means "from the beginning" or "to the end".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Range starting at `start` and running to the end of the value.
    pub fn starting_at(start: u64) -> Self {
        Self::new(Some(start), None)
    }

    /// Range from the beginning of the value up to `end`.
    pub fn up_to(end: u64) -> Self {
        Self::new(None, Some(end))
    }

    /// Resolve against a value of `len` bytes, clamping both bounds.
    ///
    /// An inverted range resolves to an empty one.
    pub fn resolve(&self, len: usize) -> Range<usize> {
        let clamp = |bound: u64| usize::try_from(bound).unwrap_or(usize::MAX).min(len);
        let start = self.start.map(clamp).unwrap_or(0);
        let end = self.end.map(clamp).unwrap_or(len);
        start..end.max(start)
    }
}

/// Capability flags of a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub writes: bool,
    pub deletes: bool,
    pub partial_writes: bool,
    pub listing: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            writes: true,
            deletes: true,
            partial_writes: true,
            listing: true,
        }
    }
}

/// Reject empty keys and keys with `.` or `..` segments.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Asynchronous, byte-addressable key-value store.
///
/// Implementations:
/// - `MemoryStore`: shared in-memory map
/// - `LocalStore`: directory tree on the local filesystem
/// - `LoggingStore`: instrumenting proxy over any other store
///
/// Capability flags are fixed for an instance. Invoking an operation whose
/// flag is `false` fails with [`StoreError::Unsupported`]; it never silently
/// succeeds.
#[async_trait]
pub trait Store: fmt::Display + fmt::Debug + Send + Sync {
    /// Short type name of the backend, used in log lines.
    fn name(&self) -> &'static str;

    fn supports_writes(&self) -> bool;

    fn supports_deletes(&self) -> bool;

    fn supports_partial_writes(&self) -> bool;

    fn supports_listing(&self) -> bool;

    /// Access mode this instance is bound to.
    fn mode(&self) -> AccessMode;

    fn is_open(&self) -> bool;

    fn set_open(&self, open: bool);

    /// Transition from closed to open, applying the access mode to any
    /// existing content.
    async fn open(&self) -> Result<()> {
        open_with_mode(self).await
    }

    /// Open the store unless it is already open.
    ///
    /// Losing an open race to a concurrent caller is not an error.
    async fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        match self.open().await {
            Ok(()) | Err(StoreError::AlreadyOpen) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `true` iff no keys exist.
    async fn empty(&self) -> Result<bool> {
        let mut keys = self.list_prefix("");
        Ok(keys.next().await.transpose()?.is_none())
    }

    /// Remove all keys.
    async fn clear(&self) -> Result<()> {
        let keys: Vec<String> = self.list_prefix("").try_collect().await?;
        for key in keys {
            self.delete(&key).await?;
        }
        Ok(())
    }

    /// Read the value of `key`, or the requested range of it.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str, byte_range: Option<ByteRange>) -> Result<Option<Bytes>>;

    /// Read several (key, range) pairs.
    ///
    /// Results are in input order; a missing key yields `None` in its slot.
    async fn get_partial_values(
        &self,
        key_ranges: &[(String, Option<ByteRange>)],
    ) -> Result<Vec<Option<Bytes>>> {
        let mut values = Vec::with_capacity(key_ranges.len());
        for (key, range) in key_ranges {
            values.push(self.get(key, *range).await?);
        }
        Ok(values)
    }

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Associate `value` with `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    /// Write `value` only if `key` is absent.
    ///
    /// Returns whether the write happened. When writers race on the same
    /// key, at most one of them gets `true`.
    async fn set_if_not_exists(&self, key: &str, value: Bytes) -> Result<bool>;

    /// Write each (key, offset, bytes) triple into the existing value.
    ///
    /// Triples are applied independently: every triple is attempted and the
    /// first error, if any, is returned.
    async fn set_partial_values(&self, key_start_values: &[(String, u64, Bytes)]) -> Result<()>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys in the store.
    fn list(&self) -> KeyStream<'_>;

    /// All keys starting with `prefix`.
    fn list_prefix(&self, prefix: &str) -> KeyStream<'_>;

    /// Immediate child segments under `prefix`, one level deep.
    fn list_dir(&self, prefix: &str) -> KeyStream<'_>;

    /// A new, closed instance over the same backend bound to `mode`.
    fn with_mode(&self, mode: AccessMode) -> Result<Self>
    where
        Self: Sized;
}

/// Default `open` behaviour shared by backends that extend it.
///
/// A non-empty store is kept for `r`, `r+` and `a`, cleared for `w`, and
/// rejected for `w-`.
pub async fn open_with_mode<S: Store + ?Sized>(store: &S) -> Result<()> {
    if store.is_open() {
        return Err(StoreError::AlreadyOpen);
    }
    let mode = store.mode();
    if !store.empty().await? {
        if mode.update() || mode.readonly() {
            // keep existing content
        } else if mode.overwrite() {
            store.clear().await?;
        } else {
            return Err(StoreError::AlreadyExists(store.to_string()));
        }
    }
    store.set_open(true);
    Ok(())
}

/// Stream yielding a single error, for listing calls that cannot start.
pub fn failed_stream<'a>(error: StoreError) -> KeyStream<'a> {
    futures::stream::once(async move { Err(error) }).boxed()
}
