//! Cache layer: per-document block results persisted as one JSON snapshot
//! per source tree.

pub mod entry;
pub mod store;

pub use entry::{BlockCacheEntry, CacheSnapshot, FileCacheEntry};
pub use store::{load_snapshot, save_snapshot, CacheStore};
