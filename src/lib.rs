pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod store;
pub mod utils;

pub use app::{load_config, CacheConfig};
pub use cache::{CacheOptions, CacheStats, Lookup, ObjectCache, RootDirResolver, StorageRoots};
pub use store::{DiskLruStore, DiskStore, StoreError};
pub use utils::CacheError;
