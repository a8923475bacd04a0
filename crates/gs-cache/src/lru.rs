//! Byte-budget LRU ledger.
//!
//! Tracks how many bytes each key retains and in which order keys were last
//! used. It does not own the cached values; callers evict the value themselves
//! when the ledger hands back a victim.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

#[derive(Clone, Debug)]
pub struct ByteLru<K> {
    /// Most recently used at the front.
    order: VecDeque<K>,
    sizes: HashMap<K, usize>,
    total: usize,
}

impl<K> Default for ByteLru<K> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            sizes: HashMap::new(),
            total: 0,
        }
    }
}

impl<K> ByteLru<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as most recently used. No-op for unknown keys.
    pub fn touch(&mut self, key: &K) {
        if self.sizes.contains_key(key) {
            self.order.retain(|k| k != key);
            self.order.push_front(key.clone());
        }
    }

    /// Record the retained size of `key` and mark it most recently used.
    pub fn set_size(&mut self, key: &K, bytes: usize) {
        match self.sizes.insert(key.clone(), bytes) {
            Some(previous) => {
                self.total = self.total - previous + bytes;
                self.order.retain(|k| k != key);
            }
            None => self.total += bytes,
        }
        self.order.push_front(key.clone());
    }

    /// Update the size of a known key without changing its recency.
    pub fn resize(&mut self, key: &K, bytes: usize) {
        if let Some(size) = self.sizes.get_mut(key) {
            self.total = self.total - *size + bytes;
            *size = bytes;
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<usize> {
        let bytes = self.sizes.remove(key)?;
        self.total -= bytes;
        self.order.retain(|k| k != key);
        Some(bytes)
    }

    /// Least recently used key other than `keep`.
    pub fn lru_except(&self, keep: &K) -> Option<&K> {
        self.order.iter().rev().find(|k| *k != keep)
    }

    /// Keys from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = &K> {
        self.order.iter().rev()
    }

    pub fn size_of(&self, key: &K) -> usize {
        self.sizes.get(key).copied().unwrap_or(0)
    }

    pub fn total_bytes(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.sizes.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_total_across_updates() {
        let mut lru = ByteLru::new();
        lru.set_size(&"a", 100);
        lru.set_size(&"b", 50);
        assert_eq!(lru.total_bytes(), 150);
        lru.set_size(&"a", 10);
        assert_eq!(lru.total_bytes(), 60);
        assert_eq!(lru.remove(&"b"), Some(50));
        assert_eq!(lru.total_bytes(), 10);
        assert_eq!(lru.remove(&"b"), None);
    }

    #[test]
    fn resize_keeps_order() {
        let mut lru = ByteLru::new();
        lru.set_size(&"a", 4);
        lru.set_size(&"b", 4);
        lru.resize(&"a", 2);
        assert_eq!(lru.total_bytes(), 6);
        assert_eq!(lru.iter_lru().next(), Some(&"a"));
    }

    #[test]
    fn touch_reorders() {
        let mut lru = ByteLru::new();
        lru.set_size(&"a", 1);
        lru.set_size(&"b", 1);
        lru.set_size(&"c", 1);
        assert_eq!(lru.lru_except(&"c"), Some(&"a"));
        lru.touch(&"a");
        assert_eq!(lru.lru_except(&"c"), Some(&"b"));
        assert_eq!(lru.iter_lru().copied().collect::<Vec<_>>(), vec!["b", "c", "a"]);
    }

    #[test]
    fn lru_except_skips_protected_key() {
        let mut lru = ByteLru::new();
        lru.set_size(&"only", 8);
        assert_eq!(lru.lru_except(&"only"), None);
    }
}
