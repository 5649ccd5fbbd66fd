//! Bounded caches with oldest-inserted eviction.
//!
//! Neither structure is internally synchronized; the engine wraps each one
//! in a `parking_lot::Mutex`. A capacity of zero disables the cache.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Map with a fixed capacity. When full, the oldest inserted key is evicted.
/// Overwriting an existing key keeps its original insertion position.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = value;
            return;
        }
        while self.map.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

/// Set with a fixed capacity and the same eviction rule as [`BoundedCache`].
#[derive(Debug)]
pub struct BoundedSet<K> {
    capacity: usize,
    set: HashSet<K>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone> BoundedSet<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            set: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.contains(key)
    }

    pub fn insert(&mut self, key: K) {
        if self.capacity == 0 || self.set.contains(&key) {
            return;
        }
        while self.set.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.set.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.set.insert(key);
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_evicts_oldest_inserted() {
        let mut cache = BoundedCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        // Overwrite keeps "a" as the oldest entry.
        cache.insert("a".to_string(), 10);
        cache.insert("c".to_string(), 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(&2));
        assert_eq!(cache.get("c"), Some(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = BoundedCache::new(0);
        cache.insert("a".to_string(), 1);
        assert!(cache.is_empty());

        let mut set = BoundedSet::new(0);
        set.insert("a".to_string());
        assert!(!set.contains("a"));
    }

    #[test]
    fn test_set_eviction_and_clear() {
        let mut set = BoundedSet::new(3);
        for name in ["a", "b", "c", "d"] {
            set.insert(name.to_string());
        }
        assert!(!set.contains("a"));
        assert!(set.contains("d"));
        assert_eq!(set.len(), 3);

        set.clear();
        assert!(set.is_empty());
    }
}
