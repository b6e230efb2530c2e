// Gateway module for the disk store - follows the Train Station Pattern
// All external access must go through this gateway

mod error;
mod journal;
mod lru_store;
mod registry;
mod traits;

pub use error::{StoreError, StoreResult};
pub use lru_store::{key_digest, DiskLruStore, LruEditor};
pub use traits::{DiskStore, StoreEditor};
