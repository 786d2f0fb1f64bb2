//! A store paired with a key prefix.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::interfaces::{ByteRange, KeyStream, Result, Store};

/// Location inside a store: the store plus a normalized `/`-separated path.
///
/// The path never has leading or trailing slashes, and empty segments are
/// dropped, so `"/a//b/"` and `"a/b"` name the same location.
pub struct StorePath<S: ?Sized> {
    store: Arc<S>,
    path: String,
}

impl<S: ?Sized> Clone for StorePath<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            path: self.path.clone(),
        }
    }
}

/// Strip leading/trailing slashes and collapse empty segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

impl<S: Store + ?Sized> StorePath<S> {
    pub fn new(store: Arc<S>, path: &str) -> Self {
        Self {
            store,
            path: normalize_path(path),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Child location `self/segment`.
    pub fn join(&self, segment: &str) -> Self {
        let segment = normalize_path(segment);
        let path = match (self.path.is_empty(), segment.is_empty()) {
            (true, _) => segment,
            (false, true) => self.path.clone(),
            (false, false) => format!("{}/{}", self.path, segment),
        };
        Self {
            store: Arc::clone(&self.store),
            path,
        }
    }

    pub async fn get(&self, byte_range: Option<ByteRange>) -> Result<Option<Bytes>> {
        self.store.get(&self.path, byte_range).await
    }

    pub async fn set(&self, value: Bytes) -> Result<()> {
        self.store.set(&self.path, value).await
    }

    pub async fn set_if_not_exists(&self, value: Bytes) -> Result<bool> {
        self.store.set_if_not_exists(&self.path, value).await
    }

    pub async fn delete(&self) -> Result<()> {
        self.store.delete(&self.path).await
    }

    pub async fn exists(&self) -> Result<bool> {
        self.store.exists(&self.path).await
    }

    /// Immediate children of this location.
    pub fn list_dir(&self) -> KeyStream<'_> {
        self.store.list_dir(&self.path)
    }
}

impl<S: Store + ?Sized> fmt::Display for StorePath<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.to_string();
        if self.path.is_empty() {
            f.write_str(&store)
        } else {
            write!(f, "{}/{}", store.trim_end_matches('/'), self.path)
        }
    }
}

impl<S: Store + ?Sized> fmt::Debug for StorePath<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorePath")
            .field("store", &self.store)
            .field("path", &self.path)
            .finish()
    }
}
