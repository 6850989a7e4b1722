//! Bounded least-recently-used cache.
//!
//! Recency is tracked with a monotonically increasing tick per access; the
//! `order` index maps ticks back to keys so the oldest entry is found in
//! `O(log n)`.
//!
//! # Trade-offs
//!
//! - **Pros**: bounded memory, no collisions, exact LRU semantics
//! - **Cons**: every hit re-indexes the entry (two map operations)

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A capacity-bounded cache evicting the least recently used entry.
#[derive(Debug, Clone)]
pub struct LruCache<K, V> {
    map: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
    capacity: usize,
    tick: u64,
    hits: usize,
    misses: usize,
    evictions: usize,
}

impl<K, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: HashMap::new(),
            order: BTreeMap::new(),
            capacity,
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Number of entries dropped to make room for new ones.
    pub fn evictions(&self) -> usize {
        self.evictions
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn touch(&mut self, key: &K) -> bool {
        let tick = self.next_tick();
        match self.map.get_mut(key) {
            Some((_, last)) => {
                let old = std::mem::replace(last, tick);
                if let Some(k) = self.order.remove(&old) {
                    self.order.insert(tick, k);
                }
                true
            }
            None => false,
        }
    }

    /// Looks up a key, marking it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.touch(key) {
            self.hits += 1;
            self.map.get(key).map(|(v, _)| v)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Mutable lookup, marking the key as most recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.touch(key) {
            self.hits += 1;
            self.map.get_mut(key).map(|(v, _)| v)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Checks for a key without updating recency or counters.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts or replaces an entry, evicting the least recently used one when full.
    pub fn insert(&mut self, key: K, value: V) {
        let tick = self.next_tick();
        if let Some((_, old)) = self.map.remove(&key) {
            self.order.remove(&old);
        } else if self.map.len() >= self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.map.remove(&oldest);
                self.evictions += 1;
            }
        }
        self.order.insert(tick, key.clone());
        self.map.insert(key, (value, tick));
    }

    /// Returns the entry for `key`, inserting the result of `make` on a miss.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        if self.touch(&key) {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.insert(key.clone(), make());
        }
        match self.map.get_mut(&key) {
            Some((v, _)) => v,
            None => unreachable!("entry was just inserted"),
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (value, tick) = self.map.remove(key)?;
        self.order.remove(&tick);
        Some(value)
    }
}
