//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror. Errors produced while
//! loading are cached alongside values, so the type is cheaply cloneable.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Loader did not complete within its configured timeout
    #[error("Load timeout after {timeout:?} for key: {key}")]
    LoadTimeout { key: String, timeout: Duration },

    /// Loader returned an application error
    #[error("Loader failed: {0}")]
    Loader(Arc<anyhow::Error>),

    /// Loader task panicked or was cancelled by the runtime
    #[error("Loader panicked for key: {0}")]
    LoaderPanicked(String),

    /// Configuration rejected at construction
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    // == Classification ==
    /// Returns true for the timeout variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CacheError::LoadTimeout { .. })
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        CacheError::Loader(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
