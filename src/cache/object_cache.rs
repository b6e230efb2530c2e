use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::codec;
use super::resolver::{RootDirResolver, StorageRoots};
use super::types::{CacheOptions, CacheStats, Lookup};
use crate::app::CacheConfig;
use crate::store::{DiskLruStore, DiskStore, StoreEditor, StoreError, StoreResult};
use crate::utils::{CacheError, Result};

/// Serializing object cache over a bounded disk store.
///
/// The cache owns its store: the directory is released by [`close`] or when
/// the cache is dropped. Every operation returns an explicit result so a
/// miss can be told apart from a broken store.
///
/// [`close`]: ObjectCache::close
#[derive(Debug)]
pub struct ObjectCache<S: DiskStore = DiskLruStore> {
    store: S,
    version: u32,
    options: CacheOptions,
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt: AtomicU64,
    opened_at: DateTime<Local>,
}

impl ObjectCache<DiskLruStore> {
    /// Open `<root>/<namespace>` with default options
    pub fn open<R>(resolver: &R, namespace: &str, version: u32, max_size: u64) -> Result<Self>
    where
        R: RootDirResolver + ?Sized,
    {
        Self::open_with(resolver, namespace, version, max_size, CacheOptions::default())
    }

    pub fn open_with<R>(
        resolver: &R,
        namespace: &str,
        version: u32,
        max_size: u64,
        options: CacheOptions,
    ) -> Result<Self>
    where
        R: RootDirResolver + ?Sized,
    {
        let Some(root) = resolver.resolve_root() else {
            warn!(namespace, "No storage directory available for cache");
            return Err(CacheError::StorageUnavailable);
        };
        Self::open_in(root.join(namespace), version, max_size, options)
    }

    /// Open a cache directly in `directory`, skipping root resolution
    pub fn open_in(
        directory: impl Into<PathBuf>,
        version: u32,
        max_size: u64,
        options: CacheOptions,
    ) -> Result<Self> {
        let directory = directory.into();
        match DiskLruStore::open(&directory, version, max_size) {
            Ok(store) => Ok(Self::with_store(store, version, options)),
            Err(source) => {
                warn!(directory = %directory.display(), error = %source, "Failed to open object cache");
                Err(CacheError::OpenFailed {
                    path: directory,
                    source,
                })
            }
        }
    }

    /// Open the cache described by a loaded configuration
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let roots = StorageRoots::from_config(&config.storage);
        Self::open_with(
            &roots,
            &config.namespace,
            config.version,
            config.max_size_bytes,
            config.options(),
        )
    }
}

impl<S: DiskStore> ObjectCache<S> {
    /// Wrap an already open store
    pub fn with_store(store: S, version: u32, options: CacheOptions) -> Self {
        info!(directory = %store.directory().display(), version, "Object cache ready");
        Self {
            store,
            version,
            options,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            corrupt: AtomicU64::new(0),
            opened_at: Local::now(),
        }
    }

    /// Serialize `value` and store it under `key`, replacing any previous value.
    ///
    /// The write is atomic: on any failure the previous value (or absence of
    /// one) stays visible. Fails with `EditInProgress` if another write for
    /// the same key has not finished yet.
    pub fn put<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = codec::encode(value, self.options.compress).map_err(|e| {
            warn!(key, error = %e, "Object could not be serialized, write skipped");
            e
        })?;

        let mut editor = match logged(key, "edit", self.store.edit(key))? {
            Some(editor) => editor,
            None => {
                warn!(key, "Another write is in flight, put rejected");
                return Err(CacheError::EditInProgress(key.to_string()));
            }
        };

        if let Err(e) = editor.write_all(&payload) {
            warn!(key, error = %e, "Failed writing object, aborting edit");
            if let Err(abort) = editor.abort() {
                warn!(key, error = %abort, "Abort failed");
            }
            return Err(StoreError::Io(e).into());
        }

        logged(key, "commit", editor.commit())?;
        logged(key, "flush", self.store.flush())?;
        debug!(key, bytes = payload.len(), "Object put on disk cache");
        Ok(())
    }

    /// Fetch and decode the value under `key`.
    ///
    /// Returns `Ok(None)` on a miss and when the stored bytes cannot be
    /// decoded as `T`. Store failures are returned as errors.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        Ok(self.lookup(key)?.into_option())
    }

    /// Like [`get`](Self::get) but reports undecodable entries separately
    pub fn lookup<T>(&self, key: &str) -> Result<Lookup<T>>
    where
        T: DeserializeOwned,
    {
        let Some(payload) = logged(key, "read", self.store.read(key))? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Cache miss");
            return Ok(Lookup::Miss);
        };

        match codec::decode::<T>(&payload) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, bytes = payload.len(), "Object read from disk cache");
                Ok(Lookup::Hit(value))
            }
            Err(e) => {
                self.corrupt.fetch_add(1, Ordering::Relaxed);
                warn!(key, error = %e, "Stored object could not be decoded, treating as miss");
                if self.options.evict_corrupt {
                    match self.store.remove(key) {
                        Ok(_) => debug!(key, "Undecodable entry evicted"),
                        Err(err) => warn!(key, error = %err, "Could not evict undecodable entry"),
                    }
                }
                Ok(Lookup::Corrupt(e.to_string()))
            }
        }
    }

    /// Whether a committed value exists for `key`, without decoding it
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        logged(key, "contains", self.store.contains(key))
    }

    /// Delete the value under `key`. Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        match self.store.remove(key) {
            Err(StoreError::EditInProgress) => {
                warn!(key, "Remove rejected, a write is in flight");
                Err(CacheError::EditInProgress(key.to_string()))
            }
            other => logged(key, "remove", other),
        }
    }

    /// Single-key clear is not supported; use [`remove`](Self::remove).
    pub fn clear(&self, _key: &str) -> Result<()> {
        Err(CacheError::NotImplemented("clearing a single key"))
    }

    /// Delete every entry and the directory structure. The cache stays usable.
    pub fn clear_cache(&self) -> Result<()> {
        logged("*", "clear", self.store.delete_all())?;
        info!(directory = %self.store.directory().display(), "Cache cleared");
        Ok(())
    }

    /// Directory holding the store, for diagnostics
    pub fn cache_folder(&self) -> &Path {
        self.store.directory()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn flush(&self) -> Result<()> {
        logged("*", "flush", self.store.flush())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let corrupt = self.corrupt.load(Ordering::Relaxed);
        let total_requests = hits + misses + corrupt;
        let hit_rate = if total_requests > 0 {
            (hits as f32 / total_requests as f32) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            size_bytes: self.store.size(),
            max_size_bytes: self.store.max_size(),
            hits,
            misses,
            corrupt,
            hit_rate,
            version: self.version,
            directory: self.store.directory().to_path_buf(),
            opened_at: self.opened_at,
        }
    }

    /// Flush and release the store directory
    pub fn close(self) -> Result<()> {
        logged("*", "close", self.store.close())
    }
}

impl<S: DiskStore> Drop for ObjectCache<S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.close() {
            warn!(directory = %self.store.directory().display(), error = %e, "Failed to close cache on drop");
        }
    }
}

fn logged<T>(key: &str, op: &'static str, result: StoreResult<T>) -> Result<T> {
    result.map_err(|e| {
        warn!(key, op, error = %e, "Disk store operation failed");
        CacheError::Store(e)
    })
}
