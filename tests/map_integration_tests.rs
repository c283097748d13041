//! Integration Tests for the Growable Map
//!
//! Hammers both bucket variants from many threads while the table doubles.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use ttl_cache::{GrowableMap, LockFreeMap, OrderedMap};

use common::init_tracing;

const THREADS: usize = 8;
const KEYS_PER_THREAD: usize = 2_000;

#[test]
fn test_lockfree_put_then_get_across_threads() {
    init_tracing();
    let map: LockFreeMap<usize> = GrowableMap::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = map.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..KEYS_PER_THREAD {
                    let key = format!("{}:{}", t, i);
                    map.put(&key, i);
                    // Own writes are always visible, mid-migration included
                    assert_eq!(map.get(&key).map(|v| *v), Some(i), "lost read for {}", key);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    map.wait_for_migration();
    assert!(map.settled());
    assert_eq!(map.len(), THREADS * KEYS_PER_THREAD);
    assert_eq!(map.live_len(), THREADS * KEYS_PER_THREAD);
    for t in 0..THREADS {
        for i in 0..KEYS_PER_THREAD {
            assert_eq!(map.get(&format!("{}:{}", t, i)).map(|v| *v), Some(i));
        }
    }
}

#[test]
fn test_lockfree_overwrites_during_growth_keep_latest() {
    init_tracing();
    let map: LockFreeMap<usize> = GrowableMap::new();
    for i in 0..KEYS_PER_THREAD {
        map.put(&i.to_string(), 0);
    }

    // Writers bump every key while new keys keep forcing growth
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = map.clone();
            thread::spawn(move || {
                if t == 0 {
                    for i in 0..KEYS_PER_THREAD * 4 {
                        map.put(&format!("grow-{}", i), i);
                    }
                } else {
                    for i in (t..KEYS_PER_THREAD).step_by(THREADS - 1) {
                        map.put(&i.to_string(), t);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    map.wait_for_migration();

    for i in 0..KEYS_PER_THREAD {
        let expected = if i == 0 { 0 } else { (i - 1) % (THREADS - 1) + 1 };
        assert_eq!(map.get(&i.to_string()).map(|v| *v), Some(expected), "key {}", i);
    }
    assert_eq!(map.len(), KEYS_PER_THREAD * 5);
}

#[test]
fn test_ordered_map_concurrent_puts_and_removes() {
    init_tracing();
    let map: OrderedMap<String> = GrowableMap::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = map.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..KEYS_PER_THREAD / 4 {
                    let key = format!("{}:{}", t, i);
                    map.put(&key, key.clone());
                    if i % 2 == 0 {
                        assert_eq!(map.remove(&key).as_deref(), Some(&key));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    map.wait_for_migration();
    let per_thread = KEYS_PER_THREAD / 4 / 2;
    assert_eq!(map.len(), THREADS * per_thread);
    assert_eq!(map.live_len(), THREADS * per_thread);
    for t in 0..THREADS {
        for i in 0..KEYS_PER_THREAD / 4 {
            let key = format!("{}:{}", t, i);
            assert_eq!(map.contains_key(&key), i % 2 == 1, "key {}", key);
        }
    }
}

#[test]
fn test_ordered_map_count_survives_put_remove_races_during_growth() {
    init_tracing();
    const SHARED_KEYS: usize = 64;
    const ROUNDS: usize = 3_000;
    let map: OrderedMap<usize> = GrowableMap::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = map.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..ROUNDS {
                    if t == 0 {
                        // Keeps the table doubling so shared keys sit frozen
                        map.put(&format!("grow-{}", i), i);
                        continue;
                    }
                    let key = format!("shared-{}", (i * 7 + t) % SHARED_KEYS);
                    if (i + t) % 3 == 0 {
                        map.remove(&key);
                    } else {
                        map.put(&key, i);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    map.wait_for_migration();

    let present = (0..SHARED_KEYS)
        .filter(|k| map.contains_key(&format!("shared-{}", k)))
        .count();
    assert_eq!(map.len(), ROUNDS + present);
    assert_eq!(map.live_len(), map.len());

    for k in 0..SHARED_KEYS {
        map.remove(&format!("shared-{}", k));
    }
    assert_eq!(map.len(), ROUNDS);
}
