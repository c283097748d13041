//! Lock-free bucket: an append-only singly linked chain.
//!
//! Nodes are linked with compare-and-swap on the `next` pointer of the last
//! node and are never unlinked, so readers can walk the chain without any
//! reclamation scheme. Values are swapped in place through `ArcSwap`.
//! Memory is released only when the bucket itself is dropped.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwap;

use crate::map::Bucket;

struct Node<V> {
    key: String,
    value: ArcSwap<V>,
    next: AtomicPtr<Node<V>>,
}

impl<V> Node<V> {
    fn new(key: &str, value: Arc<V>) -> Box<Self> {
        Box::new(Self {
            key: key.to_string(),
            value: ArcSwap::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }
}

pub struct LockFreeBucket<V> {
    head: AtomicPtr<Node<V>>,
    len: AtomicUsize,
    _owns: PhantomData<Box<Node<V>>>,
}

impl<V> LockFreeBucket<V> {
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            _owns: PhantomData,
        }
    }

    fn find(&self, key: &str) -> Option<&Node<V>> {
        let mut cursor = self.head.load(Ordering::Acquire);
        // SAFETY: nodes are never freed while the bucket is alive, and a
        // published pointer always refers to a fully initialized node.
        while let Some(node) = unsafe { cursor.as_ref() } {
            if node.key == key {
                return Some(node);
            }
            cursor = node.next.load(Ordering::Acquire);
        }
        None
    }
}

impl<V> Default for LockFreeBucket<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send + Sync> Bucket<V> for LockFreeBucket<V> {
    fn get(&self, key: &str) -> Option<Arc<V>> {
        self.find(key).map(|node| node.value.load_full())
    }

    fn put(&self, key: &str, value: Arc<V>) -> bool {
        let mut pending: Option<Box<Node<V>>> = None;
        let mut link = &self.head;

        loop {
            let current = link.load(Ordering::Acquire);
            // SAFETY: see `find`.
            if let Some(node) = unsafe { current.as_ref() } {
                if node.key == key {
                    node.value.store(value);
                    return false;
                }
                link = &node.next;
                continue;
            }

            let fresh = pending.take().unwrap_or_else(|| Node::new(key, value.clone()));
            let raw = Box::into_raw(fresh);
            match link.compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(_) => {
                    // SAFETY: the CAS failed, so `raw` was never published.
                    pending = Some(unsafe { Box::from_raw(raw) });
                    thread::yield_now();
                }
            }
        }
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Arc<V>),
    {
        let mut cursor = self.head.load(Ordering::Acquire);
        // SAFETY: see `find`.
        while let Some(node) = unsafe { cursor.as_ref() } {
            f(&node.key, &node.value.load_full());
            cursor = node.next.load(Ordering::Acquire);
        }
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

impl<V> Drop for LockFreeBucket<V> {
    fn drop(&mut self) {
        let mut cursor = *self.head.get_mut();
        while !cursor.is_null() {
            // SAFETY: `&mut self` means no reader remains; every node was
            // created by `Box::into_raw` and is owned solely by this chain.
            let mut node = unsafe { Box::from_raw(cursor) };
            cursor = *node.next.get_mut();
        }
    }
}
