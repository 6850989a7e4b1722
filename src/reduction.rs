//! Memoized evidence reductions of network factors.
//!
//! The same variable factor is reduced by the same evidence values over and
//! over across queries. [`ReductionCache`] keeps the results in a two-level
//! LRU: the outer level is keyed by the variable owning the factor, the inner
//! level by the evidence restricted to that factor's scope.

use log::trace;

use crate::assignment::Assignment;
use crate::cache::LruCache;
use crate::factor::Factor;
use crate::network::Network;
use crate::types::VarId;

#[derive(Debug, Clone)]
pub struct ReductionCache {
    per_variable: LruCache<VarId, LruCache<Assignment, Factor>>,
    values_per_variable: usize,
    hits: usize,
    misses: usize,
}

impl ReductionCache {
    pub fn new(variables: usize, values_per_variable: usize) -> Self {
        Self {
            per_variable: LruCache::new(variables),
            values_per_variable,
            hits: 0,
            misses: 0,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.per_variable.clear();
    }

    /// The factor of `var` reduced by `evidence`.
    pub fn reduced(&mut self, network: &Network, var: VarId, evidence: &Assignment) -> Factor {
        let factor = network.factor(var);
        let key = evidence.project(factor.scope());
        if key.is_empty() {
            return factor.clone();
        }

        let capacity = self.values_per_variable;
        let per_value = self
            .per_variable
            .get_or_insert_with(var, || LruCache::new(capacity));
        if let Some(f) = per_value.get(&key) {
            self.hits += 1;
            return f.clone();
        }

        trace!("reduction miss for {} under {}", var, key);
        self.misses += 1;
        let reduced = factor.reduction(&key);
        per_value.insert(key, reduced.clone());
        reduced
    }
}
