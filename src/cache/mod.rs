//! Cache Module
//!
//! TTL/LRU cache with a managed loader contract: expiry, bounded capacity,
//! stale-while-revalidate refresh, loader timeouts and negative caching.

mod entry;
mod handle;
mod loader;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use handle::Cache;
pub use lru::RecencyList;
pub use stats::{CacheStats, StatsRecorder};
pub use store::{CacheStore, Pressure};
