use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Behaviour switches for an [`ObjectCache`](super::ObjectCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Compress payloads with lz4 before storing them
    pub compress: bool,
    /// Remove entries that fail to decode as the requested type. Off by default:
    /// a type mismatch fails the same way as damaged bytes
    pub evict_corrupt: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            compress: false,
            evict_corrupt: false,
        }
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
    /// Bytes were present but could not be decoded into the requested type
    Corrupt(String),
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::Corrupt(_) => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
    pub max_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub corrupt: u64,
    pub hit_rate: f32,
    pub version: u32,
    pub directory: PathBuf,
    pub opened_at: DateTime<Local>,
}

impl CacheStats {
    /// Format cache stats for display
    pub fn format(&self) -> String {
        format!(
            "Cache Statistics:\n\
            Directory: {}\n\
            Version: {}\n\
            Entries: {}\n\
            Size: {:.2} MB of {:.2} MB\n\
            Hit Rate: {:.1}% ({} hits, {} misses, {} corrupt)\n\
            Opened: {}",
            self.directory.display(),
            self.version,
            self.entries,
            self.size_bytes as f64 / 1_048_576.0,
            self.max_size_bytes as f64 / 1_048_576.0,
            self.hit_rate,
            self.hits,
            self.misses,
            self.corrupt,
            self.opened_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}
