use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a disk store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt journal: {0}")]
    CorruptJournal(String),

    #[error("Directory already opened by another store: {}", .0.display())]
    Locked(PathBuf),

    #[error("An editor is already open for this key")]
    EditInProgress,

    #[error("Store was cleared while the edit was in flight")]
    Stale,

    #[error("Store is closed")]
    Closed,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
