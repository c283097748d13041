//! TTL Cache - An in-process caching engine
//!
//! Memoizes expensive or remote computations behind string keys under
//! concurrent access:
//! - [`Cache`]: TTL/LRU cache with managed loaders, stale-while-revalidate
//!   refresh, loader timeouts, negative caching and compare-and-swap.
//! - [`map::GrowableMap`]: sharded hash map with lock-free or ordered-tree
//!   buckets that doubles in the background without stopping readers.

pub mod cache;
pub mod config;
pub mod error;
pub mod map;
pub mod tasks;

pub use cache::{Cache, CacheStats};
pub use config::{loader_fn, CacheConfig, EntryOptions, Loader};
pub use error::{CacheError, Result};
pub use map::{GrowableMap, LockFreeMap, OrderedMap};
