//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.
//! Entries are immutable once built; refreshes and writes replace them whole.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::NEGATIVE_TTL;
use crate::error::Result;

// == Cache Entry ==
/// A cached value (or cached failure) with its expiration metadata.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub key: String,
    /// Loaded value, or the error the loader produced
    pub result: Result<V>,
    pub created_at: Instant,
    pub expires_at: Instant,
    /// Set by the caller that won the right to refresh this entry
    refresh_in_flight: AtomicBool,
}

impl<V> CacheEntry<V> {
    // == Constructors ==
    /// Creates an entry that expires `ttl` after now.
    pub fn new(key: String, value: V, ttl: Duration) -> Self {
        Self::build(key, Ok(value), ttl)
    }

    /// Creates an entry from a load outcome; failures use the negative TTL.
    pub fn from_result(key: String, result: Result<V>, ttl: Duration) -> Self {
        let ttl = if result.is_err() { NEGATIVE_TTL } else { ttl };
        Self::build(key, result, ttl)
    }

    fn build(key: String, result: Result<V>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            key,
            result,
            created_at: now,
            expires_at: now + ttl,
            refresh_in_flight: AtomicBool::new(false),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: the entry is expired once the current time reaches
    /// `expires_at`, so a zero TTL produces an immediately expired entry.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Remaining lifetime, zero when expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    // == Refresh Claim ==
    /// Attempts to claim the background refresh for this entry.
    ///
    /// Exactly one caller observes `true` for a given entry instance.
    pub fn try_claim_refresh(&self) -> bool {
        self.refresh_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight.load(Ordering::Acquire)
    }
}

impl<V: Clone> CacheEntry<V> {
    /// Copies the value or error out of the entry.
    pub fn snapshot(&self) -> Result<V> {
        self.result.clone()
    }
}

impl<V: PartialEq> CacheEntry<V> {
    /// True when the entry holds a value equal to `other`.
    pub fn holds(&self, other: &V) -> bool {
        matches!(&self.result, Ok(v) if v == other)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new("k".to_string(), 1, Duration::from_secs(1));
        assert!(!entry.is_expired());

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_expired_immediately() {
        let entry = CacheEntry::new("k".to_string(), 1, Duration::ZERO);
        assert!(entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_result_uses_negative_ttl() {
        let entry: CacheEntry<u32> = CacheEntry::from_result(
            "k".to_string(),
            Err(CacheError::from(anyhow::anyhow!("down"))),
            Duration::from_secs(3600),
        );
        assert_eq!(entry.expires_at - entry.created_at, NEGATIVE_TTL);

        tokio::time::advance(NEGATIVE_TTL).await;
        assert!(entry.is_expired());
    }

    #[tokio::test]
    async fn test_refresh_claimed_once() {
        let entry = CacheEntry::new("k".to_string(), 1, Duration::from_secs(1));
        assert!(!entry.is_refreshing());
        assert!(entry.try_claim_refresh());
        assert!(!entry.try_claim_refresh());
        assert!(entry.is_refreshing());
    }

    #[tokio::test]
    async fn test_holds_compares_values_only() {
        let ok = CacheEntry::new("k".to_string(), 7, Duration::from_secs(1));
        assert!(ok.holds(&7));
        assert!(!ok.holds(&8));

        let err: CacheEntry<i32> = CacheEntry::from_result(
            "k".to_string(),
            Err(CacheError::LoaderPanicked("k".into())),
            Duration::from_secs(1),
        );
        assert!(!err.holds(&7));
        assert!(err.snapshot().is_err());
    }
}
