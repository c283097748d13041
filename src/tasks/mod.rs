//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache.
//!
//! # Tasks
//! - Eviction: periodic expiry sweep plus capacity-pressure sheds

mod eviction;

pub use eviction::spawn_eviction_task;
