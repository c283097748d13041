//! Cache Store Module
//!
//! Key-to-entry map paired with a recency list. The store itself is not
//! synchronized; the cache wraps it in a reader/writer lock. Methods taking
//! `&self` are safe under the shared lock: the only mutation they perform is
//! reordering the recency list, which has its own mutex.

use std::collections::HashMap;
use std::sync::Arc;

use generational_arena::Index;
use parking_lot::Mutex;

use crate::cache::{CacheEntry, CacheStats, RecencyList, StatsRecorder};
use crate::config::CacheConfig;

#[derive(Debug)]
struct Slot<V> {
    entry: Arc<CacheEntry<V>>,
    node: Index,
}

/// Result of the capacity check performed before inserting a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pressure {
    /// Entries evicted inline to honor the hard cap
    pub evicted: usize,
    /// The store is past the shed threshold; a background shed should run
    pub signal: bool,
}

// == Cache Store ==
/// Main cache storage with LRU ordering and TTL expiry.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: HashMap<String, Slot<V>>,
    recency: Mutex<RecencyList>,
    stats: StatsRecorder,
    max_size: usize,
    clean_size: usize,
    clean_full_threshold: usize,
}

impl<V> CacheStore<V> {
    // == Constructor ==
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.max_size),
            recency: Mutex::new(RecencyList::new()),
            stats: StatsRecorder::new(),
            max_size: config.max_size,
            clean_size: config.clean_size,
            clean_full_threshold: config.clean_full_threshold(),
        }
    }

    // == Get ==
    /// Looks up an entry and marks it most recently used.
    ///
    /// Expired entries are returned as-is; callers decide what expiry means.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        let slot = self.entries.get(key)?;
        self.recency.lock().move_to_front(slot.node);
        Some(slot.entry.clone())
    }

    /// Looks up an entry without touching recency.
    pub fn peek(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.entries.get(key).map(|slot| slot.entry.clone())
    }

    // == Insert ==
    /// Installs an entry, replacing any previous one for the same key.
    ///
    /// The entry becomes the most recently used. Does not apply capacity
    /// pressure; see [`CacheStore::relieve_pressure`].
    ///
    /// # Arguments
    /// * `entry` - The entry to store, keyed by `entry.key`
    ///
    /// # Returns
    /// The replaced entry, if the key was already present.
    pub fn insert(&mut self, entry: CacheEntry<V>) -> Option<Arc<CacheEntry<V>>> {
        let entry = Arc::new(entry);
        let recency = self.recency.get_mut();
        match self.entries.get_mut(&entry.key) {
            Some(slot) => {
                recency.move_to_front(slot.node);
                Some(std::mem::replace(&mut slot.entry, entry))
            }
            None => {
                let node = recency.push_front(entry.key.clone());
                self.entries.insert(entry.key.clone(), Slot { entry, node });
                None
            }
        }
    }

    // == Remove ==
    /// Removes a key and its recency node.
    ///
    /// # Arguments
    /// * `key` - The key to remove
    ///
    /// # Returns
    /// The removed entry, or `None` if the key was not stored.
    pub fn remove(&mut self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        let slot = self.entries.remove(key)?;
        self.recency.get_mut().remove(slot.node);
        Some(slot.entry)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Capacity ==
    /// Capacity check run before a new key is inserted.
    ///
    /// At the hard cap the oldest `clean_size` entries are shed inline.
    pub fn relieve_pressure(&mut self) -> Pressure {
        let len = self.entries.len();
        if len < self.clean_full_threshold {
            return Pressure {
                evicted: 0,
                signal: false,
            };
        }
        let evicted = if len >= self.max_size {
            self.shed_oldest()
        } else {
            0
        };
        Pressure {
            evicted,
            signal: true,
        }
    }

    // == Shed Oldest ==
    /// Evicts up to `clean_size` least recently used entries regardless of expiry.
    pub fn shed_oldest(&mut self) -> usize {
        let recency = self.recency.get_mut();
        let mut evicted = 0;
        while evicted < self.clean_size {
            match recency.pop_back() {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        self.stats.record_evictions(evicted);
        evicted
    }

    // == Clean Expired ==
    /// Examines up to `clean_size` entries from the LRU tail and removes the
    /// expired ones. Returns the number removed.
    pub fn clean_expired(&mut self) -> usize {
        let candidates = self.recency.get_mut().oldest(self.clean_size);
        let mut removed = 0;
        for key in candidates {
            let expired = self
                .entries
                .get(&key)
                .map(|slot| slot.entry.is_expired())
                .unwrap_or(false);
            if expired && self.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.stats.record_expirations(removed);
        removed
    }

    // == Length ==
    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // == Stats ==
    pub fn recorder(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    /// Asserts that every map key has exactly one list node and vice versa.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let recency = self.recency.lock();
        assert_eq!(recency.len(), self.entries.len(), "map/list size mismatch");
        let mut keys = recency.keys();
        keys.sort();
        let mut map_keys: Vec<String> = self.entries.keys().cloned().collect();
        map_keys.sort();
        assert_eq!(keys, map_keys, "map/list keys differ");
    }

    #[cfg(test)]
    pub(crate) fn recency_keys(&self) -> Vec<String> {
        self.recency.lock().keys()
    }
}
