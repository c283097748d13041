//! Shared helpers for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use ttl_cache::{loader_fn, Loader};

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "ttl_cache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Loader that counts invocations, sleeps, then returns `value`.
#[allow(dead_code)]
pub fn slow_counting_loader(calls: Arc<AtomicUsize>, delay: Duration, value: String) -> Loader<String> {
    loader_fn(move |_key: String| {
        let calls = calls.clone();
        let value = value.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    })
}
