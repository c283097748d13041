//! Growable Map
//!
//! A power-of-two array of buckets that doubles once the load factor reaches
//! [`GROW_LOAD_FACTOR`]. Doubling installs a fresh live table and freezes the
//! previous one; a single background worker then moves frozen buckets into
//! the live table one at a time.
//!
//! Reads never lock: they load the current table snapshot and check the live
//! buckets, then the frozen ones. Writes and migration steps are serialized
//! by a write gate (shared for puts, exclusive for removals and migration
//! steps), so a migrated entry can never overwrite a fresher write and the
//! key count always matches the stored keys.
//!
//! The worker re-checks the load factor before leaving the migrating state
//! and doubles again if inserts outpaced it, so a settled map is always
//! below [`GROW_LOAD_FACTOR`].

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::map::hash::{
    bucket_index, KeyHasher, GROW_LOAD_FACTOR, INITIAL_BUCKET_POWER, MAX_INITIAL_BUCKET_POWER,
};
use crate::map::{Bucket, LockFreeBucket, RemovableBucket};

const NOT_MIGRATING: isize = -1;

struct Tables<B> {
    live: Arc<[B]>,
    frozen: Option<Arc<[B]>>,
}

fn new_buckets<B: Default>(len: usize) -> Arc<[B]> {
    (0..len).map(|_| B::default()).collect()
}

impl<B: Default> Tables<B> {
    /// Live table twice the size of `self.live`, with `self.live` frozen.
    fn doubled(&self) -> Self {
        Self {
            live: new_buckets(self.live.len() * 2),
            frozen: Some(self.live.clone()),
        }
    }
}

struct Shared<V, B> {
    tables: ArcSwap<Tables<B>>,
    gate: RwLock<()>,
    hasher: KeyHasher,
    count: AtomicUsize,
    /// Next frozen bucket to migrate, or `NOT_MIGRATING`
    cursor: AtomicIsize,
    /// Held by the single migration worker
    migrating: AtomicBool,
    _values: PhantomData<fn() -> V>,
}

// == Growable Map ==
/// Concurrent string-keyed map with incremental, non-blocking growth.
pub struct GrowableMap<V, B = LockFreeBucket<V>> {
    shared: Arc<Shared<V, B>>,
}

impl<V, B> Clone for GrowableMap<V, B> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V, B> std::fmt::Debug for GrowableMap<V, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowableMap").finish_non_exhaustive()
    }
}

impl<V, B> Default for GrowableMap<V, B>
where
    V: Send + Sync + 'static,
    B: Bucket<V> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, B> GrowableMap<V, B>
where
    V: Send + Sync + 'static,
    B: Bucket<V> + 'static,
{
    pub fn new() -> Self {
        Self::with_buckets(1usize << INITIAL_BUCKET_POWER)
    }

    /// Creates a map that starts with `2^power` buckets.
    ///
    /// # Arguments
    /// * `power` - Starting table size exponent, at most [`MAX_INITIAL_BUCKET_POWER`]
    ///
    /// # Returns
    /// `CacheError::InvalidConfig` when `power` exceeds the maximum.
    pub fn with_initial_power(power: u32) -> Result<Self> {
        if power > MAX_INITIAL_BUCKET_POWER {
            return Err(CacheError::InvalidConfig(format!(
                "initial bucket power {} exceeds maximum of {}",
                power, MAX_INITIAL_BUCKET_POWER
            )));
        }
        Ok(Self::with_buckets(1usize << power))
    }

    fn with_buckets(len: usize) -> Self {
        let tables = Tables {
            live: new_buckets(len),
            frozen: None,
        };
        Self {
            shared: Arc::new(Shared {
                tables: ArcSwap::from_pointee(tables),
                gate: RwLock::new(()),
                hasher: KeyHasher::default(),
                count: AtomicUsize::new(0),
                cursor: AtomicIsize::new(NOT_MIGRATING),
                migrating: AtomicBool::new(false),
                _values: PhantomData,
            }),
        }
    }

    // == Get ==
    /// Looks the key up in the live table, then in the frozen table while a
    /// migration is under way. Never blocks.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    ///
    /// # Returns
    /// The current value, or `None` if the key is not stored.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let hash = self.shared.hasher.hash(key);
        let tables = self.shared.tables.load();
        if let Some(value) = bucket_for(&tables.live, hash).get(key) {
            return Some(value);
        }
        tables
            .frozen
            .as_ref()
            .and_then(|frozen| bucket_for(frozen, hash).get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    // == Put ==
    /// Inserts or overwrites a value.
    ///
    /// New keys always land in the live table. Crossing the load factor
    /// doubles the table and starts the background migration.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    pub fn put(&self, key: &str, value: V) {
        let hash = self.shared.hasher.hash(key);
        let count = {
            let _gate = self.shared.gate.read();
            let tables = self.shared.tables.load();
            let added = bucket_for(&tables.live, hash).put(key, Arc::new(value));
            // A key still waiting in the frozen table is not new
            let added = added
                && !tables
                    .frozen
                    .as_ref()
                    .is_some_and(|frozen| bucket_for(frozen, hash).get(key).is_some());
            if !added {
                return;
            }
            self.shared.count.fetch_add(1, Ordering::AcqRel) + 1
        };

        self.maybe_grow(count);
    }

    fn maybe_grow(&self, count: usize) {
        if self.is_migrating() || !over_threshold(count, self.capacity()) {
            return;
        }

        {
            let _gate = self.shared.gate.write();
            if self.shared.cursor.load(Ordering::Acquire) != NOT_MIGRATING {
                return;
            }
            let current = self.shared.tables.load_full();
            let capacity = current.live.len();
            if !over_threshold(self.shared.count.load(Ordering::Acquire), capacity) {
                return;
            }

            self.shared.tables.store(Arc::new(current.doubled()));
            self.shared.cursor.store(0, Ordering::Release);
            debug!(from = capacity, to = capacity * 2, "growable map doubling");
        }

        self.kick_migration();
    }

    fn kick_migration(&self) {
        if self
            .shared
            .migrating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("growable-map-migrate".to_string())
            .spawn(move || shared.run_migration());
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn migration worker, migrating inline");
            self.shared.run_migration();
        }
    }

    // == Introspection ==
    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.shared.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live buckets.
    pub fn capacity(&self) -> usize {
        self.shared.tables.load().live.len()
    }

    pub fn is_migrating(&self) -> bool {
        self.shared.cursor.load(Ordering::Acquire) != NOT_MIGRATING
    }

    /// Index of the next frozen bucket to migrate, if migrating.
    pub fn migration_cursor(&self) -> Option<usize> {
        let cursor = self.shared.cursor.load(Ordering::Acquire);
        usize::try_from(cursor).ok()
    }

    /// Blocks until any in-flight migration has finished.
    pub fn wait_for_migration(&self) {
        while self.is_migrating() || self.shared.migrating.load(Ordering::Acquire) {
            thread::yield_now();
        }
    }

    /// True when every stored key is reachable through the live table alone.
    pub fn settled(&self) -> bool {
        self.shared.tables.load().frozen.is_none()
    }

    /// Entries currently held by the live table.
    pub fn live_len(&self) -> usize {
        self.shared.tables.load().live.iter().map(|b| b.len()).sum()
    }
}

impl<V, B> GrowableMap<V, B>
where
    V: Send + Sync + 'static,
    B: RemovableBucket<V> + 'static,
{
    // == Remove ==
    /// Deletes the key from both tables.
    ///
    /// Takes the write gate exclusively, so a removal never interleaves with
    /// a put deciding whether its key is new.
    ///
    /// # Returns
    /// The removed value, or `None` if the key was not stored.
    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        let hash = self.shared.hasher.hash(key);
        let _gate = self.shared.gate.write();
        let tables = self.shared.tables.load();

        let live = bucket_for(&tables.live, hash).remove(key);
        let frozen = tables
            .frozen
            .as_ref()
            .and_then(|frozen| bucket_for(frozen, hash).remove(key));

        let removed = live.or(frozen);
        if removed.is_some() {
            self.shared.count.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }
}

impl<V, B> Shared<V, B>
where
    V: Send + Sync + 'static,
    B: Bucket<V> + 'static,
{
    fn run_migration(&self) {
        loop {
            while self.migrate_step() {}
            self.migrating.store(false, Ordering::Release);

            // A doubling that raced the final step found the flag taken.
            if self.cursor.load(Ordering::Acquire) == NOT_MIGRATING
                || self
                    .migrating
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
    }

    /// Moves one frozen bucket into the live table. Returns false once done.
    fn migrate_step(&self) -> bool {
        let _gate = self.gate.write();
        let cursor = self.cursor.load(Ordering::Acquire);
        if cursor == NOT_MIGRATING {
            return false;
        }

        let tables = self.tables.load_full();
        let frozen = match &tables.frozen {
            Some(frozen) => frozen.clone(),
            None => {
                self.cursor.store(NOT_MIGRATING, Ordering::Release);
                return false;
            }
        };

        let index = cursor as usize;
        if index >= frozen.len() {
            let settled = Tables {
                live: tables.live.clone(),
                frozen: None,
            };
            // Puts during migration skip growth; catch up before settling
            let capacity = settled.live.len();
            if over_threshold(self.count.load(Ordering::Acquire), capacity) {
                self.tables.store(Arc::new(settled.doubled()));
                self.cursor.store(0, Ordering::Release);
                debug!(from = capacity, to = capacity * 2, "growable map doubling again");
                return true;
            }

            self.tables.store(Arc::new(settled));
            self.cursor.store(NOT_MIGRATING, Ordering::Release);
            debug!(capacity, "growable map migration complete");
            return false;
        }

        frozen[index].for_each(|key, value| {
            let target = bucket_for(&tables.live, self.hasher.hash(key));
            // The live table already holds a fresher write
            if target.get(key).is_none() {
                target.put(key, value.clone());
            }
        });
        self.cursor.store(cursor + 1, Ordering::Release);
        true
    }
}

fn bucket_for<B>(buckets: &[B], hash: u64) -> &B {
    &buckets[bucket_index(hash, buckets.len())]
}

fn over_threshold(count: usize, capacity: usize) -> bool {
    count as f64 >= capacity as f64 * GROW_LOAD_FACTOR
}
