//! Configuration Module
//!
//! Cache-level sizing/cleanup parameters and per-entry load options.
//! Both are plain immutable values built once and handed to the cache.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::error::{CacheError, Result};

// == Defaults ==
pub const DEFAULT_MAX_SIZE: usize = 1024;
pub const DEFAULT_CLEAN_SIZE: usize = 32;
pub const DEFAULT_CLEAN_DURATION: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_CLEAN_FULL_THRESHOLD_PERCENT: f64 = 0.8;
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_EXPIRE_AFTER_WRITE: Duration = Duration::from_secs(300);

/// Shortest sweep interval the eviction task will run at.
pub const MIN_CLEAN_DURATION: Duration = DEFAULT_CLEAN_DURATION;

/// Lifetime of a cached loader failure or timeout.
pub const NEGATIVE_TTL: Duration = Duration::from_millis(500);

/// Cache-level configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Hard cap on the number of entries
    pub max_size: usize,
    /// Entries examined (sweep) or evicted (shed) per cleanup pass
    pub clean_size: usize,
    /// Interval between expiry sweeps
    pub clean_duration: Duration,
    /// Fraction of `max_size` at which a background shed is signalled
    pub clean_full_threshold_percent: f64,
}

impl CacheConfig {
    // == Builders ==
    /// Sets the hard cap on stored entries.
    ///
    /// # Arguments
    /// * `max_size` - Entry count at which inserts shed the oldest entries inline
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets how many entries one sweep examines or one shed evicts.
    ///
    /// # Arguments
    /// * `clean_size` - Entries handled per cleanup pass
    pub fn with_clean_size(mut self, clean_size: usize) -> Self {
        self.clean_size = clean_size;
        self
    }

    /// Sets the sweep interval. Values below [`MIN_CLEAN_DURATION`] are raised to it.
    pub fn with_clean_duration(mut self, clean_duration: Duration) -> Self {
        self.clean_duration = clean_duration;
        self
    }

    /// Fraction of `max_size`, in (0, 1], at which a background shed is signalled.
    pub fn with_clean_full_threshold_percent(mut self, percent: f64) -> Self {
        self.clean_full_threshold_percent = percent;
        self
    }

    // == Derived Values ==
    /// Sweep interval actually used by the eviction task.
    pub fn effective_clean_duration(&self) -> Duration {
        self.clean_duration.max(MIN_CLEAN_DURATION)
    }

    /// Size at which the background shed is signalled.
    pub fn clean_full_threshold(&self) -> usize {
        (self.max_size as f64 * self.clean_full_threshold_percent) as usize
    }

    // == Validation ==
    /// Rejects configurations the eviction logic cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.clean_size == 0 {
            return Err(CacheError::InvalidConfig(
                "clean_size must be greater than zero".to_string(),
            ));
        }
        let percent = self.clean_full_threshold_percent;
        if !(percent > 0.0 && percent <= 1.0) {
            return Err(CacheError::InvalidConfig(format!(
                "clean_full_threshold_percent must be in (0, 1], got {}",
                percent
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            clean_size: DEFAULT_CLEAN_SIZE,
            clean_duration: DEFAULT_CLEAN_DURATION,
            clean_full_threshold_percent: DEFAULT_CLEAN_FULL_THRESHOLD_PERCENT,
        }
    }
}

// == Loader ==
/// User-supplied computation producing the value for a key.
pub type Loader<V> = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

/// Wraps an async closure as a [`Loader`].
pub fn loader_fn<V, F, Fut>(f: F) -> Loader<V>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    Arc::new(move |key| f(key).boxed())
}

/// Per-entry options applied by `put`, `compare_and_swap` and `load`.
pub struct EntryOptions<V> {
    pub loader: Option<Loader<V>>,
    /// Block on the loader when an entry is expired instead of serving stale
    pub sync_load: bool,
    pub load_timeout: Duration,
    pub expire_after_write: Duration,
    /// Reserved; carried but not acted on.
    pub refresh_after_write: Option<Duration>,
}

impl<V> EntryOptions<V> {
    pub fn new() -> Self {
        Self {
            loader: None,
            sync_load: false,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            expire_after_write: DEFAULT_EXPIRE_AFTER_WRITE,
            refresh_after_write: None,
        }
    }

    /// Attaches the loader used by `load` on misses and refreshes.
    ///
    /// # Arguments
    /// * `loader` - Async computation producing the value for a key, see [`loader_fn`]
    pub fn with_loader(mut self, loader: Loader<V>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// When set, `load` reloads expired entries in the caller instead of
    /// serving the stale value.
    pub fn with_sync_load(mut self, sync_load: bool) -> Self {
        self.sync_load = sync_load;
        self
    }

    /// Sets the time a loader may run before the load fails with a timeout.
    ///
    /// # Arguments
    /// * `timeout` - Loader deadline; the loader keeps running past it but its result is dropped
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Sets the lifetime of values written or loaded with these options.
    ///
    /// # Arguments
    /// * `ttl` - Time until the entry expires; zero expires it immediately
    pub fn with_expire_after_write(mut self, ttl: Duration) -> Self {
        self.expire_after_write = ttl;
        self
    }

    pub fn with_refresh_after_write(mut self, refresh: Duration) -> Self {
        self.refresh_after_write = Some(refresh);
        self
    }
}

impl<V> Default for EntryOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for EntryOptions<V> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            sync_load: self.sync_load,
            load_timeout: self.load_timeout,
            expire_after_write: self.expire_after_write,
            refresh_after_write: self.refresh_after_write,
        }
    }
}

impl<V> fmt::Debug for EntryOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryOptions")
            .field("loader", &self.loader.as_ref().map(|_| "<fn>"))
            .field("sync_load", &self.sync_load)
            .field("load_timeout", &self.load_timeout)
            .field("expire_after_write", &self.expire_after_write)
            .field("refresh_after_write", &self.refresh_after_write)
            .finish()
    }
}
