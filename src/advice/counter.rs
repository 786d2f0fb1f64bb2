//! Per-operation invocation counts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Store operations observed by the logging advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    SupportsWrites,
    SupportsDeletes,
    SupportsPartialWrites,
    SupportsListing,
    Mode,
    IsOpen,
    SetOpen,
    Open,
    EnsureOpen,
    Empty,
    Clear,
    Eq,
    Get,
    GetPartialValues,
    Exists,
    Set,
    SetIfNotExists,
    SetPartialValues,
    Delete,
    List,
    ListPrefix,
    ListDir,
    WithMode,
}

impl Operation {
    pub const ALL: [Operation; 23] = [
        Operation::SupportsWrites,
        Operation::SupportsDeletes,
        Operation::SupportsPartialWrites,
        Operation::SupportsListing,
        Operation::Mode,
        Operation::IsOpen,
        Operation::SetOpen,
        Operation::Open,
        Operation::EnsureOpen,
        Operation::Empty,
        Operation::Clear,
        Operation::Eq,
        Operation::Get,
        Operation::GetPartialValues,
        Operation::Exists,
        Operation::Set,
        Operation::SetIfNotExists,
        Operation::SetPartialValues,
        Operation::Delete,
        Operation::List,
        Operation::ListPrefix,
        Operation::ListDir,
        Operation::WithMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SupportsWrites => "supports_writes",
            Operation::SupportsDeletes => "supports_deletes",
            Operation::SupportsPartialWrites => "supports_partial_writes",
            Operation::SupportsListing => "supports_listing",
            Operation::Mode => "mode",
            Operation::IsOpen => "is_open",
            Operation::SetOpen => "set_open",
            Operation::Open => "open",
            Operation::EnsureOpen => "ensure_open",
            Operation::Empty => "empty",
            Operation::Clear => "clear",
            Operation::Eq => "eq",
            Operation::Get => "get",
            Operation::GetPartialValues => "get_partial_values",
            Operation::Exists => "exists",
            Operation::Set => "set",
            Operation::SetIfNotExists => "set_if_not_exists",
            Operation::SetPartialValues => "set_partial_values",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::ListPrefix => "list_prefix",
            Operation::ListDir => "list_dir",
            Operation::WithMode => "with_mode",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free invocation counter, one slot per [`Operation`].
///
/// Increments never lose updates under concurrent calls.
#[derive(Default)]
pub struct OperationCounter {
    counts: [AtomicU64; Operation::ALL.len()],
}

impl OperationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, op: Operation) {
        self.counts[op as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of calls recorded for `op`.
    pub fn get(&self, op: Operation) -> u64 {
        self.counts[op as usize].load(Ordering::Relaxed)
    }

    /// Sum over all operations.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Operation name to count, for every operation called at least once.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        Operation::ALL
            .iter()
            .filter_map(|op| match self.get(*op) {
                0 => None,
                n => Some((op.as_str(), n)),
            })
            .collect()
    }
}

impl fmt::Debug for OperationCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}
