//! Loader Gateway
//!
//! Runs user loaders under a timeout, turns failures into short-lived
//! negative entries, and serves stale values while a single background
//! refresh runs.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::handle::Inner;
use crate::cache::{Cache, CacheEntry};
use crate::config::{EntryOptions, Loader};
use crate::error::{CacheError, Result};

/// Invokes the loader for `key`, racing it against the load timeout.
///
/// On timeout the loader task is left running and its result discarded.
pub(crate) async fn call_loader<V>(
    key: &str,
    loader: &Loader<V>,
    opts: &EntryOptions<V>,
) -> CacheEntry<V>
where
    V: Send + 'static,
{
    let task = tokio::spawn(loader(key.to_string()));

    let result = match tokio::time::timeout(opts.load_timeout, task).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => {
            warn!(key, error = %err, "loader failed");
            Err(CacheError::from(err))
        }
        Ok(Err(join_err)) => {
            warn!(key, error = %join_err, "loader task did not complete");
            Err(CacheError::LoaderPanicked(key.to_string()))
        }
        Err(_) => {
            warn!(key, timeout = ?opts.load_timeout, "loader timed out");
            Err(CacheError::LoadTimeout {
                key: key.to_string(),
                timeout: opts.load_timeout,
            })
        }
    };

    CacheEntry::from_result(key.to_string(), result, opts.expire_after_write)
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Load ==
    /// Returns the cached value for `key`, calling the loader on a miss.
    ///
    /// The flag is `true` when the result came from the cache without this
    /// call running the loader. Loader failures and timeouts are returned
    /// (and cached briefly) as `Err` values, never raised. The outer option
    /// is `None` only when no loader is configured and the key is absent.
    ///
    /// Expired entries are served stale while one caller refreshes them in
    /// the background, unless `sync_load` is set, in which case the caller
    /// reloads under the exclusive lock.
    pub async fn load(&self, key: &str, opts: &EntryOptions<V>) -> (Option<Result<V>>, bool) {
        let loader = match &opts.loader {
            Some(loader) => loader.clone(),
            None => {
                let found = self.get(key).await;
                let cached = found.is_some();
                return (found, cached);
            }
        };

        {
            let store = self.inner.store.read().await;
            if let Some(entry) = store.get(key) {
                let expired = entry.is_expired();
                if !expired || !opts.sync_load {
                    if expired && entry.try_claim_refresh() {
                        spawn_refresh(self.inner.clone(), key.to_string(), loader, opts.clone());
                    }
                    store.recorder().record_hit();
                    return (Some(entry.snapshot()), true);
                }
            }
        }

        // The write lock is held across the loader call so concurrent misses
        // on this key collapse into one load.
        let mut store = self.inner.store.write().await;
        if let Some(entry) = store.get(key) {
            if !entry.is_expired() {
                store.recorder().record_hit();
                return (Some(entry.snapshot()), true);
            }
        }
        store.recorder().record_miss();

        if !store.contains(key) {
            self.inner.apply_pressure(&mut store);
        }

        let entry = call_loader(key, &loader, opts).await;
        store.recorder().record_load(entry.result.is_err());
        let result = entry.snapshot();
        store.insert(entry);

        (Some(result), false)
    }

    /// Loads with the cache's default entry options.
    pub async fn load_default(&self, key: &str) -> (Option<Result<V>>, bool) {
        let opts = self.inner.defaults.clone();
        self.load(key, &opts).await
    }
}

/// Reloads `key` in a detached task and installs the fresh entry.
///
/// If the stale entry was swept or evicted meanwhile, it is re-inserted.
fn spawn_refresh<V>(inner: Arc<Inner<V>>, key: String, loader: Loader<V>, opts: EntryOptions<V>)
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let entry = call_loader(&key, &loader, &opts).await;
        let failed = entry.result.is_err();

        let mut store = inner.store.write().await;
        store.recorder().record_load(failed);
        inner.install(&mut store, entry);
        debug!(key = %key, failed, "background refresh installed");
    });
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::config::{loader_fn, CacheConfig, NEGATIVE_TTL};

    fn counting_loader(calls: Arc<AtomicUsize>, value: i64) -> Loader<i64> {
        loader_fn(move |_key: String| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        })
    }

    #[tokio::test]
    async fn test_load_without_loader_acts_as_get() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let opts = cache.entry_options();

        assert_eq!(cache.load("a", &opts).await.0.map(|r| r.is_ok()), None);

        cache.put("a", 1).await;
        let (value, cached) = cache.load("a", &opts).await;
        assert_eq!(value.unwrap().unwrap(), 1);
        assert!(cached);
    }

    #[tokio::test]
    async fn test_load_calls_loader_once_per_window() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = cache
            .entry_options()
            .with_loader(counting_loader(calls.clone(), 42));

        let (value, cached) = cache.load("k", &opts).await;
        assert_eq!(value.unwrap().unwrap(), 42);
        assert!(!cached);

        for _ in 0..5 {
            let (value, cached) = cache.load("k", &opts).await;
            assert_eq!(value.unwrap().unwrap(), 42);
            assert!(cached);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.loads, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout_is_cached_briefly() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let opts = cache
            .entry_options()
            .with_load_timeout(Duration::from_millis(100))
            .with_sync_load(true)
            .with_loader(loader_fn(|_key: String| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            }));

        let (value, cached) = cache.load("slow", &opts).await;
        let err = value.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(!cached);

        // Served from the negative entry
        let (value, cached) = cache.load("slow", &opts).await;
        assert!(value.unwrap().unwrap_err().is_timeout());
        assert!(cached);

        let stats = cache.stats().await;
        assert_eq!(stats.load_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loader_error_negative_ttl() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let opts = cache
            .entry_options()
            .with_sync_load(true)
            .with_loader(loader_fn(move |_key: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("upstream unavailable"))
                }
            }));

        let (value, _) = cache.load("k", &opts).await;
        assert!(matches!(value.unwrap(), Err(CacheError::Loader(_))));

        tokio::time::advance(Duration::from_millis(200)).await;
        cache.load("k", &opts).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(NEGATIVE_TTL).await;
        cache.load("k", &opts).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_loader_is_cached_as_failure() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let opts = cache
            .entry_options()
            .with_sync_load(true)
            .with_loader(loader_fn(move |key: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if key == "boom" {
                        panic!("loader exploded");
                    }
                    Ok(0)
                }
            }));

        let (value, cached) = cache.load("boom", &opts).await;
        assert!(!cached);
        match value.unwrap() {
            Err(CacheError::LoaderPanicked(key)) => assert_eq!(key, "boom"),
            other => panic!("expected LoaderPanicked, got {:?}", other),
        }

        // Still inside the negative window: served from the cached failure
        tokio::time::advance(Duration::from_millis(400)).await;
        let (value, cached) = cache.load("boom", &opts).await;
        assert!(cached);
        assert!(matches!(value.unwrap(), Err(CacheError::LoaderPanicked(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.load_failures, 1);

        tokio::time::advance(NEGATIVE_TTL).await;
        assert!(cache.get("boom").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_while_revalidate_refreshes_once() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(1);
        let opts = cache
            .entry_options()
            .with_expire_after_write(ttl)
            .with_loader(counting_loader(calls.clone(), 2));

        let put_opts = cache.entry_options().with_expire_after_write(ttl);
        cache.put_with("k", 1, &put_opts).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        // Every caller gets the stale value; only one refresh is spawned
        for _ in 0..3 {
            let (value, cached) = cache.load("k", &opts).await;
            assert_eq!(value.unwrap().unwrap(), 1);
            assert!(cached);
        }

        // Let the refresh task run
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k").await.unwrap().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_load_reloads_expired_entry() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = cache
            .entry_options()
            .with_sync_load(true)
            .with_expire_after_write(Duration::from_secs(3600))
            .with_loader(counting_loader(calls.clone(), 2));

        let put_opts = cache
            .entry_options()
            .with_expire_after_write(Duration::from_secs(1));
        cache.put_with("a", 1, &put_opts).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        let (value, cached) = cache.load("a", &opts).await;
        assert_eq!(value.unwrap().unwrap(), 2);
        assert!(!cached);
        assert_eq!(cache.get("a").await.unwrap().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reinserts_deleted_key() {
        let cache: Cache<i64> = Cache::new(CacheConfig::default()).unwrap();
        let ttl = Duration::from_secs(1);
        let put_opts = cache.entry_options().with_expire_after_write(ttl);
        cache.put_with("k", 1, &put_opts).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        let opts = cache
            .entry_options()
            .with_loader(loader_fn(|_key: String| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(9)
            }));
        cache.load("k", &opts).await;
        cache.delete("k").await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.get("k").await.unwrap().unwrap(), 9);
    }
}
