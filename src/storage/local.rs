//! Filesystem-based store.
//!
//! Each key maps to a file below the root directory, with `/`-separated key
//! segments becoming subdirectories:
//! ```text
//! {root}/
//!   a/
//!     b/
//!       c        <- key "a/b/c"
//! ```
//!
//! Writes go to a hidden `.<name>.<uuid>.storewatch-tmp` sibling first and
//! are moved into place once complete. Listings never report these files.

use std::collections::VecDeque;
use std::fmt;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::interfaces::store::{failed_stream, open_with_mode, validate_key};
use crate::interfaces::{AccessMode, ByteRange, KeyStream, Result, Store, StoreError};

/// Suffix of in-flight write files.
const TEMP_SUFFIX: &str = ".storewatch-tmp";

/// Store persisting each key as a file under a root directory.
pub struct LocalStore {
    root: PathBuf,
    mode: AccessMode,
    is_open: AtomicBool,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    ///
    /// The directory is created lazily when the store is opened in a
    /// writable mode.
    pub fn new(root: impl AsRef<Path>, mode: AccessMode) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mode,
            is_open: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the file path for a key.
    fn path_for_key(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Validate `key`, also rejecting names reserved for in-flight writes.
    fn check_key(key: &str) -> Result<()> {
        validate_key(key)?;
        if key.split('/').any(is_temp_file) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode.readonly() {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    /// Stream every file below `dir`, as keys relative to the root.
    fn walk(&self, dir: PathBuf) -> KeyStream<'static> {
        let root = self.root.clone();
        let state = (vec![dir], VecDeque::new());
        stream::try_unfold(state, move |(mut dirs, mut ready)| {
            let root = root.clone();
            async move {
                loop {
                    if let Some(key) = ready.pop_front() {
                        return Ok::<_, StoreError>(Some((key, (dirs, ready))));
                    }
                    let Some(dir) = dirs.pop() else {
                        return Ok(None);
                    };
                    let mut entries = match fs::read_dir(&dir).await {
                        Ok(entries) => entries,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(StoreError::from(e)),
                    };
                    while let Some(entry) = entries.next_entry().await? {
                        let file_type = entry.file_type().await?;
                        if file_type.is_dir() {
                            dirs.push(entry.path());
                        } else if file_type.is_file()
                            && !is_temp_file(&entry.file_name().to_string_lossy())
                        {
                            ready.push_back(key_for_path(&root, &entry.path()));
                        }
                    }
                }
            }
        })
        .boxed()
    }

    async fn write_partial(&self, key: &str, start: u64, bytes: &[u8]) -> Result<()> {
        Self::check_key(key)?;
        let reachable = u64::try_from(bytes.len())
            .ok()
            .and_then(|len| start.checked_add(len))
            .is_some_and(|end| i64::try_from(end).is_ok());
        if !reachable {
            return Err(StoreError::InvalidOffset {
                key: key.to_string(),
                offset: start,
            });
        }
        let path = self.path_for_key(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        file.seek(SeekFrom::Start(start)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

async fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove temporary file"
        );
    }
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Hidden sibling of `path` for staging a write.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}{TEMP_SUFFIX}", Uuid::new_v4().simple()))
}

/// Key of `path` relative to `root`, joined with `/`.
fn key_for_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Store for LocalStore {
    fn name(&self) -> &'static str {
        "LocalStore"
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
        self.mode
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    fn set_open(&self, open: bool) {
        self.is_open.store(open, Ordering::Release);
    }

    async fn open(&self) -> Result<()> {
        if !self.mode.readonly() {
            fs::create_dir_all(&self.root).await?;
        }
        open_with_mode(self).await
    }

    async fn clear(&self) -> Result<()> {
        self.check_writable()?;
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn get(&self, key: &str, byte_range: Option<ByteRange>) -> Result<Option<Bytes>> {
        Self::check_key(key)?;
        self.ensure_open().await?;
        let path = self.path_for_key(key);

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Ok(None);
        }

        let len = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        let range = byte_range.unwrap_or_default().resolve(len);
        let mut buf = vec![0u8; range.len()];
        file.seek(SeekFrom::Start(range.start as u64)).await?;
        file.read_exact(&mut buf).await?;
        Ok(Some(Bytes::from(buf)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Self::check_key(key)?;
        match fs::metadata(self.path_for_key(key)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        Self::check_key(key)?;
        self.check_writable()?;
        self.ensure_open().await?;
        let path = self.path_for_key(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file + rename
        let temp_path = temp_path_for(&path);
        fs::write(&temp_path, &value).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            remove_temp(&temp_path).await;
            return Err(e.into());
        }

        debug!(key, size = value.len(), "Stored value");
        Ok(())
    }

    async fn set_if_not_exists(&self, key: &str, value: Bytes) -> Result<bool> {
        Self::check_key(key)?;
        self.check_writable()?;
        self.ensure_open().await?;
        let path = self.path_for_key(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // hard_link never replaces, so only one racing writer can publish
        let temp_path = temp_path_for(&path);
        fs::write(&temp_path, &value).await?;
        let linked = fs::hard_link(&temp_path, &path).await;
        remove_temp(&temp_path).await;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_partial_values(&self, key_start_values: &[(String, u64, Bytes)]) -> Result<()> {
        self.check_writable()?;
        self.ensure_open().await?;

        let mut first_error = None;
        for (key, start, bytes) in key_start_values {
            if let Err(e) = self.write_partial(key, *start, bytes).await {
                warn!(key = %key, error = %e, "Partial write failed");
                first_error = first_error.or(Some(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::check_key(key)?;
        self.check_writable()?;
        self.ensure_open().await?;
        let path = self.path_for_key(key);

        let result = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> KeyStream<'_> {
        self.walk(self.root.clone())
    }

    fn list_prefix(&self, prefix: &str) -> KeyStream<'_> {
        let prefix = prefix.to_string();
        self.walk(self.root.clone())
            .try_filter(move |key| futures::future::ready(key.starts_with(&prefix)))
            .boxed()
    }

    fn list_dir(&self, prefix: &str) -> KeyStream<'_> {
        let trimmed = prefix.trim_matches('/');
        if !trimmed.is_empty() {
            if let Err(e) = Self::check_key(trimmed) {
                return failed_stream(e);
            }
        }
        let dir = self.path_for_key(prefix);
        let listing = async move {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StoreError::from(e)),
            };
            let mut children: Vec<Result<String>> = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !is_temp_file(&name) {
                    children.push(Ok(name));
                }
            }
            Ok(children)
        };
        stream::once(listing)
            .map(|result| match result {
                Ok(children) => stream::iter(children).boxed(),
                Err(e) => failed_stream(e),
            })
            .flatten()
            .boxed()
    }

    fn with_mode(&self, mode: AccessMode) -> Result<Self> {
        Ok(Self::new(&self.root, mode))
    }
}

impl PartialEq for LocalStore {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl fmt::Display for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file://{}", self.root.display())
    }
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore")
            .field("root", &self.root)
            .field("mode", &self.mode)
            .finish()
    }
}
