// Gateway module for the object cache - follows the Train Station Pattern
// All external access must go through this gateway

mod codec;
mod object_cache;
mod resolver;
mod types;

pub use codec::{decode, encode};
pub use object_cache::ObjectCache;
pub use resolver::{default_cache_dir, ExternalStorage, RootDirResolver, StorageRoots};
pub use types::{CacheOptions, CacheStats, Lookup};

