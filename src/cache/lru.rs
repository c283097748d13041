//! Recency List Module
//!
//! Doubly linked list of keys ordered by last access, used for LRU eviction.
//! Nodes live in an arena and are addressed by index, so the store can keep
//! a stable handle per key and move it to the front in O(1).

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node {
    key: String,
    prev: Option<Index>,
    next: Option<Index>,
}

// == Recency List ==
/// Tracks access order for LRU eviction strategy.
///
/// - Head = Most recently used
/// - Tail = Least recently used
#[derive(Debug, Default)]
pub struct RecencyList {
    nodes: Arena<Node>,
    head: Option<Index>,
    tail: Option<Index>,
}

impl RecencyList {
    pub fn new() -> Self {
        Self::default()
    }

    fn unlink(&mut self, index: Index) {
        let (prev, next) = match self.nodes.get(index) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn link_front(&mut self, index: Index) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[index];
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.nodes[h].prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }

    // == Push Front ==
    /// Inserts a key as most recently used and returns its handle.
    pub fn push_front(&mut self, key: String) -> Index {
        let index = self.nodes.insert(Node {
            key,
            prev: None,
            next: None,
        });
        self.link_front(index);
        index
    }

    // == Move To Front ==
    /// Marks the node as most recently used. Stale handles are ignored.
    pub fn move_to_front(&mut self, index: Index) {
        if self.head == Some(index) || !self.nodes.contains(index) {
            return;
        }
        self.unlink(index);
        self.link_front(index);
    }

    // == Remove ==
    /// Removes the node and returns its key.
    pub fn remove(&mut self, index: Index) -> Option<String> {
        if !self.nodes.contains(index) {
            return None;
        }
        self.unlink(index);
        self.nodes.remove(index).map(|node| node.key)
    }

    // == Pop Back ==
    /// Removes and returns the least recently used key.
    pub fn pop_back(&mut self) -> Option<String> {
        let tail = self.tail?;
        self.remove(tail)
    }

    // == Oldest ==
    /// Collects up to `limit` keys starting from the least recently used.
    pub fn oldest(&self, limit: usize) -> Vec<String> {
        let mut keys = Vec::with_capacity(limit.min(self.nodes.len()));
        let mut cursor = self.tail;
        while let Some(index) = cursor {
            if keys.len() >= limit {
                break;
            }
            let node = &self.nodes[index];
            keys.push(node.key.clone());
            cursor = node.prev;
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let mut cursor = self.head;
        while let Some(index) = cursor {
            keys.push(self.nodes[index].key.clone());
            cursor = self.nodes[index].next;
        }
        keys
    }
}
