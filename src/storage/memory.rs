//! In-memory store.
//!
//! Values live in a `BTreeMap` shared behind an `Arc`, so every instance
//! produced by [`Store::with_mode`] sees the same data. Listing order is the
//! lexicographic key order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;

use crate::interfaces::store::{failed_stream, validate_key};
use crate::interfaces::{AccessMode, ByteRange, Capabilities, KeyStream, Result, Store, StoreError};

type Data = Arc<RwLock<BTreeMap<String, Bytes>>>;

/// Largest value a partial write may grow a key to.
pub const MAX_VALUE_SIZE: usize = 1 << 32;

/// Store backed by a shared in-memory map.
pub struct MemoryStore {
    data: Data,
    mode: AccessMode,
    capabilities: Capabilities,
    is_open: AtomicBool,
}

impl MemoryStore {
    pub fn new(mode: AccessMode) -> Self {
        Self::with_capabilities(mode, Capabilities::default())
    }

    /// Create a store advertising the given capability flags.
    pub fn with_capabilities(mode: AccessMode, capabilities: Capabilities) -> Self {
        Self {
            data: Data::default(),
            mode,
            capabilities,
            is_open: AtomicBool::new(false),
        }
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        if !self.capabilities.writes {
            return Err(StoreError::Unsupported { operation });
        }
        if self.mode.readonly() {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn keys_where<'a, F>(&'a self, operation: &'static str, select: F) -> KeyStream<'a>
    where
        F: FnOnce(&BTreeMap<String, Bytes>) -> Vec<String> + Send + 'a,
    {
        if !self.capabilities.listing {
            return failed_stream(StoreError::Unsupported { operation });
        }
        let data = Arc::clone(&self.data);
        stream::once(async move {
            let keys = select(&*data.read().await);
            stream::iter(keys.into_iter().map(Ok))
        })
        .flatten()
        .boxed()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(AccessMode::default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "MemoryStore"
    }

    fn supports_writes(&self) -> bool {
        self.capabilities.writes
    }

    fn supports_deletes(&self) -> bool {
        self.capabilities.deletes
    }

    fn supports_partial_writes(&self) -> bool {
        self.capabilities.partial_writes
    }

    fn supports_listing(&self) -> bool {
        self.capabilities.listing
    }

    fn mode(&self) -> AccessMode {
        self.mode
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    fn set_open(&self, open: bool) {
        self.is_open.store(open, Ordering::Release);
    }

    async fn empty(&self) -> Result<bool> {
        Ok(self.data.read().await.is_empty())
    }

    async fn clear(&self) -> Result<()> {
        if !self.capabilities.deletes {
            return Err(StoreError::Unsupported { operation: "clear" });
        }
        self.check_writable("clear")?;
        self.data.write().await.clear();
        Ok(())
    }

    async fn get(&self, key: &str, byte_range: Option<ByteRange>) -> Result<Option<Bytes>> {
        validate_key(key)?;
        self.ensure_open().await?;
        let data = self.data.read().await;
        Ok(data.get(key).map(|value| match byte_range {
            Some(range) => value.slice(range.resolve(value.len())),
            None => value.clone(),
        }))
    }

    async fn get_partial_values(
        &self,
        key_ranges: &[(String, Option<ByteRange>)],
    ) -> Result<Vec<Option<Bytes>>> {
        for (key, _) in key_ranges {
            validate_key(key)?;
        }
        self.ensure_open().await?;
        let data = self.data.read().await;
        Ok(key_ranges
            .iter()
            .map(|(key, range)| {
                data.get(key).map(|value| match range {
                    Some(range) => value.slice(range.resolve(value.len())),
                    None => value.clone(),
                })
            })
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.data.read().await.contains_key(key))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        validate_key(key)?;
        self.check_writable("set")?;
        self.ensure_open().await?;
        debug!(key, size = value.len(), "Stored value");
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_not_exists(&self, key: &str, value: Bytes) -> Result<bool> {
        validate_key(key)?;
        self.check_writable("set_if_not_exists")?;
        self.ensure_open().await?;
        let mut data = self.data.write().await;
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), value);
        Ok(true)
    }

    async fn set_partial_values(&self, key_start_values: &[(String, u64, Bytes)]) -> Result<()> {
        if !self.capabilities.partial_writes {
            return Err(StoreError::Unsupported {
                operation: "set_partial_values",
            });
        }
        self.check_writable("set_partial_values")?;
        self.ensure_open().await?;

        let mut first_error = None;
        let mut data = self.data.write().await;
        for (key, start, bytes) in key_start_values {
            if let Err(e) = validate_key(key) {
                first_error = first_error.or(Some(e));
                continue;
            }
            let span = usize::try_from(*start).ok().and_then(|start| {
                let end = start.checked_add(bytes.len())?;
                (end <= MAX_VALUE_SIZE).then_some((start, end))
            });
            let Some((start, end)) = span else {
                first_error = first_error.or(Some(StoreError::InvalidOffset {
                    key: key.clone(),
                    offset: *start,
                }));
                continue;
            };
            let mut value = data.get(key).map(|v| v.to_vec()).unwrap_or_default();
            if value.len() < end {
                value.resize(end, 0);
            }
            value[start..end].copy_from_slice(bytes);
            data.insert(key.clone(), Bytes::from(value));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        if !self.capabilities.deletes {
            return Err(StoreError::Unsupported { operation: "delete" });
        }
        self.check_writable("delete")?;
        self.ensure_open().await?;
        self.data.write().await.remove(key);
        Ok(())
    }

    fn list(&self) -> KeyStream<'_> {
        self.keys_where("list", |data| data.keys().cloned().collect())
    }

    fn list_prefix(&self, prefix: &str) -> KeyStream<'_> {
        let prefix = prefix.to_string();
        self.keys_where("list_prefix", move |data| {
            data.keys()
                .filter(|key| key.starts_with(&prefix))
                .cloned()
                .collect()
        })
    }

    fn list_dir(&self, prefix: &str) -> KeyStream<'_> {
        let prefix = prefix.trim_end_matches('/').to_string();
        self.keys_where("list_dir", move |data| {
            let children: BTreeSet<String> = if prefix.is_empty() {
                data.keys()
                    .filter_map(|key| key.split('/').next())
                    .map(str::to_string)
                    .collect()
            } else {
                let parent = format!("{prefix}/");
                data.keys()
                    .filter_map(|key| key.strip_prefix(&parent))
                    .filter_map(|rest| rest.split('/').next())
                    .filter(|child| !child.is_empty())
                    .map(str::to_string)
                    .collect()
            };
            children.into_iter().collect()
        })
    }

    fn with_mode(&self, mode: AccessMode) -> Result<Self> {
        Ok(Self {
            data: Arc::clone(&self.data),
            mode,
            capabilities: self.capabilities,
            is_open: AtomicBool::new(false),
        })
    }
}

impl PartialEq for MemoryStore {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) && self.mode == other.mode
    }
}

impl fmt::Display for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory://{:p}", Arc::as_ptr(&self.data))
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("mode", &self.mode)
            .field("is_open", &self.is_open())
            .finish()
    }
}
