//! Cache adapters.

pub mod disk_store;
pub mod memory_cache;

pub use disk_store::{DEFAULT_MAX_STORE_SIZE, DiskFileStore, default_store_path};
pub use memory_cache::{CacheStats, DEFAULT_CACHE_SIZE, MemoryBitmapCache};
