//! Key hashing and growth constants shared by the map variants.

use std::hash::BuildHasher;

/// Tables start with `2^INITIAL_BUCKET_POWER` buckets.
pub const INITIAL_BUCKET_POWER: u32 = 3;

/// Largest starting power accepted by `GrowableMap::with_initial_power`.
pub const MAX_INITIAL_BUCKET_POWER: u32 = 24;

/// Entries-per-bucket ratio at which the table doubles.
pub const GROW_LOAD_FACTOR: f64 = 0.75;

#[derive(Default)]
pub(crate) struct KeyHasher {
    state: ahash::RandomState,
}

impl KeyHasher {
    pub(crate) fn hash(&self, key: &str) -> u64 {
        self.state.hash_one(key)
    }
}

/// Bucket index for `hash` in a table of `len` buckets (a power of two).
pub(crate) fn bucket_index(hash: u64, len: usize) -> usize {
    debug_assert!(len.is_power_of_two());
    (hash as usize) & (len - 1)
}
