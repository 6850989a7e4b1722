//! Memoization containers used by the factor algebra and the inference engines.
//!
//! | Implementation | Bounded | Eviction | Use Case |
//! |----------------|---------|----------|----------|
//! | [`HashMapCache`] | No | None (explicit `clear`) | Per-evidence results that are dropped wholesale |
//! | [`LruCache`] | Yes | Least recently used | DTree node caches, reductions, posterior factors |
//!
//! Both record hit/miss counters so that engines can report how effective
//! their caching was.
//!
//! # Example
//!
//! ```
//! use bn_rs::cache::LruCache;
//!
//! let mut cache = LruCache::<&str, f64>::new(2);
//! cache.insert("a", 0.1);
//! cache.insert("b", 0.2);
//! cache.get(&"a"); // `a` becomes the most recent entry
//! cache.insert("c", 0.3); // evicts `b`
//! assert!(cache.contains(&"a"));
//! assert!(!cache.contains(&"b"));
//! ```

mod hashmap;
mod lru;

pub use hashmap::HashMapCache;
pub use lru::LruCache;
