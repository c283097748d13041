//! Ordered-tree bucket: a mutex-guarded balanced tree keyed by string order.
//!
//! Trades lock-freedom for true deletion and ordered traversal.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::map::{Bucket, RemovableBucket};

#[derive(Debug)]
pub struct OrderedBucket<V> {
    tree: Mutex<BTreeMap<String, Arc<V>>>,
}

impl<V> OrderedBucket<V> {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(BTreeMap::new()),
        }
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.tree.lock().keys().cloned().collect()
    }
}

impl<V> Default for OrderedBucket<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send + Sync> Bucket<V> for OrderedBucket<V> {
    fn get(&self, key: &str) -> Option<Arc<V>> {
        self.tree.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: Arc<V>) -> bool {
        self.tree.lock().insert(key.to_string(), value).is_none()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Arc<V>),
    {
        let tree = self.tree.lock();
        for (key, value) in tree.iter() {
            f(key, value);
        }
    }

    fn len(&self) -> usize {
        self.tree.lock().len()
    }
}

impl<V: Send + Sync> RemovableBucket<V> for OrderedBucket<V> {
    fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.tree.lock().remove(key)
    }
}
