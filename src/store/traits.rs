use std::io::Write;
use std::path::Path;

use super::error::StoreResult;

/// A bounded key to blob store with one value slot per key.
///
/// Implementations own their directory exclusively while open and must be
/// safe to share between threads. Writes go through an [`StoreEditor`] so a
/// partially written value is never visible to readers.
pub trait DiskStore: Send + Sync + std::fmt::Debug {
    type Editor: StoreEditor;

    /// Open an editor for `key`, or `None` if one is already in flight
    fn edit(&self, key: &str) -> StoreResult<Option<Self::Editor>>;

    /// Read the committed value for `key`, marking it recently used
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Check for a committed value without touching recency
    fn contains(&self, key: &str) -> StoreResult<bool>;

    /// Delete a committed value. Returns whether anything was removed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Wipe every entry and the directory itself, leaving the store reusable
    fn delete_all(&self) -> StoreResult<()>;

    fn flush(&self) -> StoreResult<()>;

    /// Flush and release the directory. Later calls fail with `Closed`.
    fn close(&self) -> StoreResult<()>;

    fn directory(&self) -> &Path;

    /// Bytes currently held by committed values
    fn size(&self) -> u64;

    fn max_size(&self) -> u64;

    /// Number of committed entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transactional writer for a single entry
pub trait StoreEditor: Write + Send {
    /// Publish the written bytes atomically
    fn commit(self) -> StoreResult<()>;

    /// Discard the written bytes
    fn abort(self) -> StoreResult<()>;
}
