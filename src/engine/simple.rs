use log::{debug, trace};
use rand::RngCore;

use crate::assignment::Assignment;
use crate::cache::{HashMapCache, LruCache};
use crate::config::EngineConfig;
use crate::engine::{ancestral_sample, observed_probability, sequential_sample, CacheStats, InferenceEngine};
use crate::error::{Error, Result};
use crate::evidence::Evidence;
use crate::network::Network;
use crate::types::VarId;

/// Inference by summing the joint distribution.
///
/// `Pr(X = v | e)` is `Pr(e, X = v) / Pr(e)`, where each joint probability is
/// a sum over the nuisance variables of the product of the CPT entries. Only
/// the variables that are ancestors of the fixed ones take part in the sum;
/// every other variable marginalizes to one.
///
/// The last value of a variable is derived as `1 − Σ(others)` once all other
/// values are known. Marginals are cached per `(variable, value)` under the
/// current evidence; joint probabilities are cached per `(assignment,
/// nuisance set)` and stay valid across evidence changes.
///
/// Exponential in the number of relevant variables: meant for small networks.
#[derive(Debug)]
pub struct SimpleConditioning<'a> {
    network: &'a Network,
    evidence: Evidence,
    evidence_probability: Option<f64>,
    marginals: HashMapCache<(VarId, usize), f64>,
    joints: LruCache<(Assignment, Vec<VarId>), f64>,
}

impl<'a> SimpleConditioning<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_config(network, &EngineConfig::default())
    }

    pub fn with_config(network: &'a Network, config: &EngineConfig) -> Self {
        Self {
            network,
            evidence: Evidence::new(),
            evidence_probability: None,
            marginals: HashMapCache::default(),
            joints: LruCache::new(config.joint_cache_capacity),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.marginals.hits() + self.joints.hits(),
            misses: self.marginals.misses() + self.joints.misses(),
        }
    }

    fn sync(&mut self) {
        if self.evidence.take_dirty() {
            debug!("evidence changed to {}, dropping marginals", self.evidence.values());
            self.marginals.clear();
            self.evidence_probability = None;
        }
    }

    /// `Pr(fixed)`: the joint probability of a partial assignment.
    pub fn joint(&mut self, fixed: &Assignment) -> f64 {
        if fixed.is_empty() {
            return 1.0;
        }

        let relevant = self.network.ancestors(fixed.vars());
        let order: Vec<VarId> = self
            .network
            .topological_order()
            .iter()
            .copied()
            .filter(|v| relevant.contains(v))
            .collect();
        let nuisance: Vec<VarId> = order.iter().copied().filter(|&v| !fixed.contains(v)).collect();

        let key = (fixed.clone(), nuisance);
        if let Some(&p) = self.joints.get(&key) {
            return p;
        }

        trace!("joint({}) over {} relevant variables", fixed, order.len());
        let mut current = fixed.clone();
        let p = self.enumerate(&order, fixed, &mut current);
        self.joints.insert(key, p);
        p
    }

    fn enumerate(&self, order: &[VarId], fixed: &Assignment, current: &mut Assignment) -> f64 {
        let Some((&var, rest)) = order.split_first() else {
            return 1.0;
        };
        let variable = self.network.variable(var);

        // Parents precede `var` in topological order, so they are assigned.
        if let Some(value) = fixed.get(var) {
            let p = variable.probability_given(value, current).unwrap_or(0.0);
            if p == 0.0 {
                return 0.0;
            }
            return p * self.enumerate(rest, fixed, current);
        }

        let mut sum = 0.0;
        for value in 0..variable.cardinality() {
            let p = variable.probability_given(value, current).unwrap_or(0.0);
            if p == 0.0 {
                continue;
            }
            current.insert(var, value);
            sum += p * self.enumerate(rest, fixed, current);
        }
        current.remove(var);
        sum
    }

    fn nonzero_evidence_probability(&mut self) -> Result<f64> {
        let pe = self.evidence_probability()?;
        if pe == 0.0 {
            return Err(Error::ZeroProbability);
        }
        Ok(pe)
    }
}

impl InferenceEngine for SimpleConditioning<'_> {
    fn network(&self) -> &Network {
        self.network
    }

    fn evidence_state(&self) -> &Evidence {
        &self.evidence
    }

    fn evidence_state_mut(&mut self) -> &mut Evidence {
        &mut self.evidence
    }

    fn probability(&mut self, var: VarId, value: usize) -> Result<f64> {
        debug!("SimpleConditioning::probability(var = {}, value = {})", var, value);
        self.network.check_value(var, value)?;
        self.sync();

        if let Some(p) = observed_probability(self.evidence.values(), var, value) {
            self.nonzero_evidence_probability()?;
            return Ok(p);
        }
        if let Some(&p) = self.marginals.get(&(var, value)) {
            return Ok(p);
        }

        let pe = self.nonzero_evidence_probability()?;

        let card = self.network.cardinality(var);
        let others: Vec<f64> = (0..card)
            .filter(|&v| v != value)
            .filter_map(|v| self.marginals.peek(&(var, v)).copied())
            .collect();
        let p = if card > 1 && others.len() == card - 1 {
            (1.0 - others.iter().sum::<f64>()).max(0.0)
        } else {
            let fixed = self.evidence.values().with(var, value);
            self.joint(&fixed) / pe
        };

        self.marginals.insert((var, value), p);
        Ok(p)
    }

    fn evidence_probability(&mut self) -> Result<f64> {
        self.sync();
        if let Some(pe) = self.evidence_probability {
            return Ok(pe);
        }
        let evidence = self.evidence.values().clone();
        let pe = self.joint(&evidence);
        self.evidence_probability = Some(pe);
        Ok(pe)
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> Result<Assignment> {
        self.sync();
        if self.evidence.values().is_empty() {
            ancestral_sample(self.network, rng)
        } else {
            sequential_sample(self, rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::approx_eq;

    use test_log::test;

    /// gender -> age
    fn gender_age() -> (Network, VarId, VarId) {
        let mut net = Network::new("population");
        let gender = net.add_variable("gender", ["male", "female"]).unwrap();
        let age = net.add_variable("age", ["<15", ">=15"]).unwrap();
        net.add_parent(age, gender).unwrap();
        net.set_probabilities(gender, &[0.55, 0.45]).unwrap();
        net.set_probabilities(age, &[0.55, 0.45, 0.50, 0.50]).unwrap();
        (net, gender, age)
    }

    #[test]
    fn test_prior_and_posterior() {
        let (net, gender, age) = gender_age();
        let mut engine = SimpleConditioning::new(&net);
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.5275, 1e-9));

        engine.set_evidence(gender, 0).unwrap();
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.55, 1e-9));
        engine.set_evidence(gender, 1).unwrap();
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.50, 1e-9));
        engine.clear_evidence();
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.5275, 1e-9));
    }

    #[test]
    fn test_last_value_is_derived() {
        let (net, _, age) = gender_age();
        let mut engine = SimpleConditioning::new(&net);
        let dist = engine.distribution(age).unwrap();
        assert!(approx_eq(dist[0] + dist[1], 1.0, 1e-12));
        assert!(approx_eq(dist[1], 0.4725, 1e-9));
    }

    #[test]
    fn test_joint_cache_survives_evidence_changes() {
        let (net, gender, age) = gender_age();
        let mut engine = SimpleConditioning::new(&net);
        engine.set_evidence(gender, 0).unwrap();
        engine.probability(age, 0).unwrap();
        let misses = engine.joints.misses();

        engine.clear_evidence();
        engine.set_evidence(gender, 0).unwrap();
        engine.probability(age, 0).unwrap();
        assert_eq!(engine.joints.misses(), misses);
    }

    #[test]
    fn test_evidence_variable_query() {
        let (net, gender, _) = gender_age();
        let mut engine = SimpleConditioning::new(&net);
        engine.set_evidence(gender, 1).unwrap();
        assert_eq!(engine.probability(gender, 1).unwrap(), 1.0);
        assert_eq!(engine.probability(gender, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_out_of_range_value() {
        let (net, gender, _) = gender_age();
        let mut engine = SimpleConditioning::new(&net);
        assert!(engine.probability(gender, 2).is_err());
        assert!(engine.set_evidence(gender, 5).is_err());
        assert!(engine.evidence().is_empty());
    }
}
