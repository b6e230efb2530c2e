use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for the object cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No usable storage directory could be resolved")]
    StorageUnavailable,

    #[error("Failed to open cache at {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Another write is in flight for key {0:?}")]
    EditInProgress(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
