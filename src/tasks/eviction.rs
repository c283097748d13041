//! Eviction Task
//!
//! Background task that trims the cache on two independent triggers: a timer
//! sweep that removes expired entries from the LRU tail, and a coalesced
//! capacity signal that sheds the oldest entries regardless of expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns the eviction task for a store.
///
/// The task exits once every sender of `pressure` has been dropped, i.e.
/// when the owning cache goes away.
///
/// # Arguments
/// * `store` - shared store to prune
/// * `interval` - time between expiry sweeps
/// * `pressure` - receives a message whenever the store crosses its shed threshold
pub fn spawn_eviction_task<V>(
    store: Arc<RwLock<CacheStore<V>>>,
    interval: Duration,
    mut pressure: mpsc::Receiver<()>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(?interval, "starting cache eviction task");

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = {
                        let mut guard = store.write().await;
                        if guard.is_empty() { 0 } else { guard.clean_expired() }
                    };
                    if removed > 0 {
                        info!(removed, "expiry sweep removed entries");
                    } else {
                        debug!("expiry sweep found nothing to remove");
                    }
                }
                signal = pressure.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    let (evicted, remaining) = {
                        let mut guard = store.write().await;
                        let evicted = guard.shed_oldest();
                        (evicted, guard.len())
                    };
                    debug!(evicted, remaining, "capacity shed evicted oldest entries");
                }
            }
        }

        debug!("cache dropped, eviction task exiting");
    })
}
