//! Growable Map Module
//!
//! A concurrently growable hash map used as an alternative storage engine.
//! Buckets are either lock-free append-only chains or mutex-guarded ordered
//! trees; the table doubles in the background while reads and writes go on.

mod growable;
mod hash;
mod lockfree;
mod ordered;


use std::sync::Arc;

pub use growable::GrowableMap;
pub use hash::{GROW_LOAD_FACTOR, INITIAL_BUCKET_POWER, MAX_INITIAL_BUCKET_POWER};
pub use lockfree::LockFreeBucket;
pub use ordered::OrderedBucket;

/// Growable map over lock-free append-only buckets.
pub type LockFreeMap<V> = GrowableMap<V, LockFreeBucket<V>>;

/// Growable map over ordered-tree buckets; supports removal.
pub type OrderedMap<V> = GrowableMap<V, OrderedBucket<V>>;

// == Bucket Traits ==
/// One shard of a [`GrowableMap`].
pub trait Bucket<V>: Default + Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<V>>;

    /// Inserts or overwrites; returns true when the key was not present.
    fn put(&self, key: &str, value: Arc<V>) -> bool;

    /// Visits every pair. Ordered buckets visit in key order.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&str, &Arc<V>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buckets that support true deletion.
pub trait RemovableBucket<V>: Bucket<V> {
    fn remove(&self, key: &str) -> Option<Arc<V>>;
}
