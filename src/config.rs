//! Tuning constants for the engines and the elimination-order search.
//!
//! Nothing is read from the environment; callers pass these explicitly.
//!
//! ```
//! use std::time::Duration;
//! use bn_rs::config::{EngineConfig, SearchConfig};
//!
//! let engine = EngineConfig::default().with_cache_ratio(0.5).with_max_cached_count(1 << 12);
//! let search = SearchConfig::default().with_time_budget(Duration::from_millis(200));
//! assert_eq!(engine.max_cached_count, 4096);
//! assert_eq!(search.time_budget, Duration::from_millis(200));
//! ```

use std::time::Duration;

/// Cache sizing shared by the inference engines.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fraction of a DTree node's instantiation count reserved for its cache.
    pub cache_ratio: f64,
    /// Lower clamp of a DTree node cache.
    pub min_cached_count: usize,
    /// Upper clamp of a DTree node cache.
    pub max_cached_count: usize,
    /// Posterior factors kept by variable elimination (one per query set).
    pub posterior_cache_capacity: usize,
    /// Variables tracked by the reduction cache.
    pub reduction_cache_variables: usize,
    /// Evidence restrictions tracked per variable by the reduction cache.
    pub reduction_cache_values: usize,
    /// Joint probabilities kept by simple conditioning.
    pub joint_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ratio: 1.0,
            min_cached_count: 16,
            max_cached_count: 1 << 16,
            posterior_cache_capacity: 64,
            reduction_cache_variables: 256,
            reduction_cache_values: 64,
            joint_cache_capacity: 4096,
        }
    }
}

impl EngineConfig {
    pub fn with_cache_ratio(mut self, ratio: f64) -> Self {
        self.cache_ratio = ratio;
        self
    }

    pub fn with_min_cached_count(mut self, count: usize) -> Self {
        self.min_cached_count = count;
        self
    }

    pub fn with_max_cached_count(mut self, count: usize) -> Self {
        self.max_cached_count = count;
        self
    }

    pub fn with_posterior_cache_capacity(mut self, capacity: usize) -> Self {
        self.posterior_cache_capacity = capacity;
        self
    }

    pub fn with_reduction_cache(mut self, variables: usize, values: usize) -> Self {
        self.reduction_cache_variables = variables;
        self.reduction_cache_values = values;
        self
    }

    pub fn with_joint_cache_capacity(mut self, capacity: usize) -> Self {
        self.joint_cache_capacity = capacity;
        self
    }
}

/// Parameters of the elimination-order search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Wall-clock budget of the depth-first search.
    pub time_budget: Duration,
    /// Explored partial states remembered by the depth-first search.
    pub memo_capacity: usize,
    /// Start the depth-first search from the greedy min-fill order.
    pub seed_with_greedy: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(10),
            memo_capacity: 100_000,
            seed_with_greedy: true,
        }
    }
}

impl SearchConfig {
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    pub fn with_seed_with_greedy(mut self, seed: bool) -> Self {
        self.seed_with_greedy = seed;
        self
    }
}
