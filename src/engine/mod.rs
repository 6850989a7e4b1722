//! Inference engines.
//!
//! Every engine answers the same queries through [`InferenceEngine`]:
//!
//! | Query | Method |
//! |-------|--------|
//! | `Pr(X = v \| e)` | [`InferenceEngine::probability`] |
//! | `Pr(X \| e)` as a vector | [`InferenceEngine::distribution`] |
//! | `Pr(e)` | [`InferenceEngine::evidence_probability`] |
//! | one full sample consistent with `e` | [`InferenceEngine::sample`] |
//!
//! Engines borrow the [`Network`] immutably and own their evidence and
//! caches. An engine instance is not meant to be shared between threads;
//! create one instance per thread over the same network instead.
//!
//! `Pr(∅) = 1` exactly. When `Pr(e) = 0`, posterior queries fail with
//! [`Error::ZeroProbability`].

mod best;
mod elimination;
mod recursive;
mod simple;

pub use best::BestEngine;
pub use elimination::VariableElimination;
pub use recursive::RecursiveConditioning;
pub use simple::SimpleConditioning;

use rand::{Rng, RngCore};

use crate::assignment::Assignment;
use crate::error::{Error, Result};
use crate::evidence::Evidence;
use crate::network::Network;
use crate::types::VarId;
use crate::utils::roulette;

/// Hit and miss counters of an engine's memo tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::ops::Add for CacheStats {
    type Output = CacheStats;

    fn add(self, rhs: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + rhs.hits,
            misses: self.misses + rhs.misses,
        }
    }
}

pub trait InferenceEngine {
    fn network(&self) -> &Network;

    fn evidence_state(&self) -> &Evidence;

    fn evidence_state_mut(&mut self) -> &mut Evidence;

    /// `Pr(var = value | evidence)`.
    fn probability(&mut self, var: VarId, value: usize) -> Result<f64>;

    /// `Pr(evidence)`.
    fn evidence_probability(&mut self) -> Result<f64>;

    /// Draws one complete assignment from `Pr(· | evidence)`.
    fn sample(&mut self, rng: &mut dyn RngCore) -> Result<Assignment>;

    /// The posterior distribution of `var`, indexed by value.
    fn distribution(&mut self, var: VarId) -> Result<Vec<f64>> {
        let card = self.network().get(var)?.cardinality();
        (0..card).map(|value| self.probability(var, value)).collect()
    }

    fn evidence(&self) -> &Assignment {
        self.evidence_state().values()
    }

    /// Asserts `var = value`, replacing any previous value of `var`.
    fn set_evidence(&mut self, var: VarId, value: usize) -> Result<()> {
        self.network().check_value(var, value)?;
        self.evidence_state_mut().assert(var, value);
        Ok(())
    }

    fn set_evidence_by_name(&mut self, name: &str, label: &str) -> Result<()> {
        let var = self.network().id(name)?;
        let value = self.network().value_index(var, label)?;
        self.set_evidence(var, value)
    }

    /// Asserts every pair of `assignment`. Nothing is asserted if any pair is invalid.
    fn extend_evidence(&mut self, assignment: &Assignment) -> Result<()> {
        for (var, value) in assignment.iter() {
            self.network().check_value(var, value)?;
        }
        for (var, value) in assignment.iter() {
            self.evidence_state_mut().assert(var, value);
        }
        Ok(())
    }

    /// Replaces the whole evidence.
    fn replace_evidence(&mut self, assignment: Assignment) -> Result<()> {
        for (var, value) in assignment.iter() {
            self.network().check_value(var, value)?;
        }
        self.evidence_state_mut().replace(assignment);
        Ok(())
    }

    fn remove_evidence(&mut self, var: VarId) {
        self.evidence_state_mut().retract(var);
    }

    fn clear_evidence(&mut self) {
        self.evidence_state_mut().clear();
    }

    fn probability_by_name(&mut self, name: &str, label: &str) -> Result<f64> {
        let var = self.network().id(name)?;
        let value = self.network().value_index(var, label)?;
        self.probability(var, value)
    }
}

/// Answer for a query variable that is part of the evidence: 1 for the
/// observed value, 0 otherwise. `None` if `var` is not observed.
pub(crate) fn observed_probability(evidence: &Assignment, var: VarId, value: usize) -> Option<f64> {
    evidence
        .get(var)
        .map(|observed| if observed == value { 1.0 } else { 0.0 })
}

/// Forward sampling in topological order, without evidence.
pub(crate) fn ancestral_sample(network: &Network, rng: &mut dyn RngCore) -> Result<Assignment> {
    let mut sample = Assignment::new();
    for &var in network.topological_order() {
        let variable = network.variable(var);
        let parent_values: Vec<usize> = variable
            .parents()
            .iter()
            .map(|&p| sample.get(p).ok_or(Error::InvalidHandle(p)))
            .collect::<Result<_>>()?;
        let dist = variable.distribution(&parent_values)?;
        let value = roulette(dist, rng.gen::<f64>()).ok_or(Error::ZeroProbability)?;
        sample.insert(var, value);
    }
    Ok(sample)
}

/// Exact sequential sampling: each unobserved variable is drawn from its
/// posterior given the evidence and the values drawn so far.
///
/// The engine's evidence is restored afterwards, also on failure.
pub(crate) fn sequential_sample<E>(engine: &mut E, rng: &mut dyn RngCore) -> Result<Assignment>
where
    E: InferenceEngine + ?Sized,
{
    let original = engine.evidence().clone();
    let res = draw_sequentially(engine, rng);
    engine.evidence_state_mut().replace(original);
    res
}

fn draw_sequentially<E>(engine: &mut E, rng: &mut dyn RngCore) -> Result<Assignment>
where
    E: InferenceEngine + ?Sized,
{
    if engine.evidence_probability()? == 0.0 {
        return Err(Error::ZeroProbability);
    }
    let order = engine.network().topological_order().to_vec();
    for var in order {
        if engine.evidence().contains(var) {
            continue;
        }
        let dist = engine.distribution(var)?;
        let value = roulette(&dist, rng.gen::<f64>()).ok_or(Error::ZeroProbability)?;
        engine.evidence_state_mut().assert(var, value);
    }
    Ok(engine.evidence().clone())
}
