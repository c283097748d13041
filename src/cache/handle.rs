//! Cache Facade
//!
//! `Cache` composes the store, the eviction task and the loader gateway
//! behind get/put/delete/compare-and-swap/load. Handles are cheap to clone
//! and share one store.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, CacheStore};
use crate::config::{CacheConfig, EntryOptions};
use crate::error::Result;
use crate::tasks::spawn_eviction_task;

pub(crate) struct Inner<V> {
    pub(crate) store: Arc<RwLock<CacheStore<V>>>,
    pub(crate) config: CacheConfig,
    pub(crate) defaults: EntryOptions<V>,
    pressure_tx: mpsc::Sender<()>,
    eviction: JoinHandle<()>,
}

impl<V> Inner<V> {
    /// Capacity check before inserting a key the store does not hold yet.
    pub(crate) fn apply_pressure(&self, store: &mut CacheStore<V>) {
        let pressure = store.relieve_pressure();
        if pressure.evicted > 0 {
            debug!(
                evicted = pressure.evicted,
                max_size = store.max_size(),
                "cache at capacity, evicted oldest entries inline"
            );
        }
        if pressure.signal {
            // A pending signal already covers this one
            let _ = self.pressure_tx.try_send(());
        }
    }

    /// Inserts an entry, applying capacity pressure when the key is new.
    pub(crate) fn install(
        &self,
        store: &mut CacheStore<V>,
        entry: CacheEntry<V>,
    ) -> Option<Arc<CacheEntry<V>>> {
        if !store.contains(&entry.key) {
            self.apply_pressure(store);
        }
        store.insert(entry)
    }
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        self.eviction.abort();
    }
}

// == Cache ==
/// Concurrent TTL/LRU cache.
pub struct Cache<V> {
    pub(crate) inner: Arc<Inner<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with default entry options.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime; the eviction task is
    /// spawned immediately.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_entry_defaults(config, EntryOptions::default())
    }

    /// Creates a cache whose `put`/`load` calls default to `defaults`.
    pub fn with_entry_defaults(config: CacheConfig, defaults: EntryOptions<V>) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(RwLock::new(CacheStore::new(&config)));
        let (pressure_tx, pressure_rx) = mpsc::channel(1);
        let eviction = spawn_eviction_task(
            store.clone(),
            config.effective_clean_duration(),
            pressure_rx,
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                config,
                defaults,
                pressure_tx,
                eviction,
            }),
        })
    }

    // == Options ==
    /// Copy of this cache's default entry options, for per-call overrides.
    pub fn entry_options(&self) -> EntryOptions<V> {
        self.inner.defaults.clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Get ==
    /// Retrieves the value or cached failure for a key.
    ///
    /// Returns `None` when the key is absent or its entry has expired.
    pub async fn get(&self, key: &str) -> Option<Result<V>> {
        let store = self.inner.store.read().await;
        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                store.recorder().record_hit();
                Some(entry.snapshot())
            }
            _ => {
                store.recorder().record_miss();
                None
            }
        }
    }

    // == Put ==
    /// Stores a value with the default entry options.
    ///
    /// Returns the previous value (or cached failure) when the key existed.
    pub async fn put(&self, key: &str, value: V) -> Option<Result<V>> {
        self.put_with(key, value, &self.inner.defaults).await
    }

    pub async fn put_with(&self, key: &str, value: V, opts: &EntryOptions<V>) -> Option<Result<V>> {
        let entry = CacheEntry::new(key.to_string(), value, opts.expire_after_write);
        let mut store = self.inner.store.write().await;
        self.inner
            .install(&mut store, entry)
            .map(|previous| previous.snapshot())
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) {
        self.inner.store.write().await.remove(key);
    }

    // == Size ==
    /// Number of entries currently held, expired ones included.
    pub async fn size(&self) -> usize {
        self.inner.store.read().await.len()
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.inner.store.read().await.stats()
    }
}

impl<V> Cache<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    // == Compare And Swap ==
    /// Replaces the value for `key` with `new` if it currently equals `expected`.
    ///
    /// `expected = None` means "the key is absent". Cached failures never
    /// match. Returns the value held after the call and whether it swapped.
    pub async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&V>,
        new: V,
    ) -> (Option<Result<V>>, bool) {
        self.compare_and_swap_with(key, expected, new, &self.inner.defaults)
            .await
    }

    pub async fn compare_and_swap_with(
        &self,
        key: &str,
        expected: Option<&V>,
        new: V,
        opts: &EntryOptions<V>,
    ) -> (Option<Result<V>>, bool) {
        {
            let store = self.inner.store.read().await;
            let current = store.peek(key);
            if !matches_expected(current.as_deref(), expected) {
                return (current.map(|entry| entry.snapshot()), false);
            }
        }

        let mut store = self.inner.store.write().await;
        let current = store.peek(key);
        if !matches_expected(current.as_deref(), expected) {
            return (current.map(|entry| entry.snapshot()), false);
        }

        let entry = CacheEntry::new(key.to_string(), new.clone(), opts.expire_after_write);
        self.inner.install(&mut store, entry);
        (Some(Ok(new)), true)
    }
}

fn matches_expected<V: PartialEq>(current: Option<&CacheEntry<V>>, expected: Option<&V>) -> bool {
    match (current, expected) {
        (None, None) => true,
        (Some(entry), Some(value)) => entry.holds(value),
        _ => false,
    }
}
