use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};

// Directories currently owned by an open store in this process
static OPEN_DIRECTORIES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Exclusive claim on a store directory, released on drop
#[derive(Debug)]
pub struct DirectoryLease {
    path: PathBuf,
}

impl DirectoryLease {
    pub fn acquire(directory: &Path) -> StoreResult<Self> {
        let path = directory
            .canonicalize()
            .unwrap_or_else(|_| directory.to_path_buf());

        let mut open = OPEN_DIRECTORIES.lock();
        if !open.insert(path.clone()) {
            return Err(StoreError::Locked(path));
        }
        Ok(Self { path })
    }
}

impl Drop for DirectoryLease {
    fn drop(&mut self) {
        OPEN_DIRECTORIES.lock().remove(&self.path);
    }
}
