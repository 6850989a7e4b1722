use log::{debug, trace};
use rand::RngCore;

use crate::assignment::Assignment;
use crate::cache::LruCache;
use crate::config::EngineConfig;
use crate::engine::{ancestral_sample, sequential_sample, CacheStats, InferenceEngine};
use crate::error::Result;
use crate::evidence::Evidence;
use crate::factor::Factor;
use crate::network::Network;
use crate::reduction::ReductionCache;
use crate::types::VarId;

/// Variable elimination.
///
/// For a query set `Q` under evidence `e`, every relevant factor is reduced
/// by `e`, then each variable outside `Q ∪ e` is summed out of the product of
/// the factors mentioning it. Only ancestors of `Q ∪ e` are relevant.
///
/// Variables are eliminated largest-domain-first unless an order is supplied.
/// Unnormalized posteriors `P(Q, e)` are cached per query set; an evidence
/// change drops them together with the reduction cache.
#[derive(Debug)]
pub struct VariableElimination<'a> {
    network: &'a Network,
    evidence: Evidence,
    order: Option<Vec<VarId>>,
    reductions: ReductionCache,
    posteriors: LruCache<Vec<VarId>, Factor>,
}

impl<'a> VariableElimination<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_config(network, &EngineConfig::default())
    }

    pub fn with_config(network: &'a Network, config: &EngineConfig) -> Self {
        Self {
            network,
            evidence: Evidence::new(),
            order: None,
            reductions: ReductionCache::new(config.reduction_cache_variables, config.reduction_cache_values),
            posteriors: LruCache::new(config.posterior_cache_capacity),
        }
    }

    /// Uses a precomputed elimination order (e.g. from [`crate::moral::MoralGraph::best_first`]).
    ///
    /// Variables missing from the order are eliminated last, largest domain first.
    pub fn with_order(network: &'a Network, order: Vec<VarId>) -> Result<Self> {
        for &v in &order {
            network.get(v)?;
        }
        let mut engine = Self::new(network);
        engine.order = Some(order);
        Ok(engine)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.posteriors.hits() + self.reductions.hits(),
            misses: self.posteriors.misses() + self.reductions.misses(),
        }
    }

    fn sync(&mut self) {
        if self.evidence.take_dirty() {
            debug!("evidence changed to {}, dropping posteriors", self.evidence.values());
            self.posteriors.clear();
            self.reductions.clear();
        }
    }

    fn elimination_order(&self, candidates: Vec<VarId>) -> Vec<VarId> {
        let mut order = Vec::with_capacity(candidates.len());
        let mut rest = candidates;
        if let Some(given) = &self.order {
            for &v in given {
                if let Some(i) = rest.iter().position(|&x| x == v) {
                    order.push(rest.swap_remove(i));
                }
            }
        }
        rest.sort_by_key(|&v| (std::cmp::Reverse(self.network.cardinality(v)), v));
        order.extend(rest);
        order
    }

    /// Unnormalized `P(query, e)` over the unobserved query variables.
    fn joint(&mut self, query: &[VarId]) -> Factor {
        let mut key: Vec<VarId> = query.to_vec();
        key.sort();
        key.dedup();
        if let Some(f) = self.posteriors.get(&key) {
            return f.clone();
        }

        let evidence = self.evidence.values().clone();
        let relevant = self.network.ancestors(key.iter().copied().chain(evidence.vars()));
        let mut factors: Vec<Factor> = relevant
            .iter()
            .map(|&v| self.reductions.reduced(self.network, v, &evidence))
            .collect();

        let candidates: Vec<VarId> = relevant
            .iter()
            .copied()
            .filter(|v| key.binary_search(v).is_err() && !evidence.contains(*v))
            .collect();
        let order = self.elimination_order(candidates);
        trace!("eliminating {:?} for query {:?}", order, key);

        for x in order {
            let (with, without): (Vec<Factor>, Vec<Factor>) = factors.into_iter().partition(|f| f.contains(x));
            factors = without;
            let product = with.iter().fold(Factor::identity(), |acc, f| acc.multiply(f));
            factors.push(product.sum_out(x));
        }

        let mut result = factors.iter().fold(Factor::identity(), |acc, f| acc.multiply(f));
        if result.is_identity() {
            result = Factor::scalar(1.0);
        }
        self.posteriors.insert(key, result.clone());
        result
    }

    /// The posterior `P(vars | e)` as a normalized factor.
    ///
    /// Observed variables are included as point masses on their observed value.
    pub fn posterior(&mut self, vars: &[VarId]) -> Result<Factor> {
        debug!("VariableElimination::posterior(vars = {:?})", vars);
        for &v in vars {
            self.network.get(v)?;
        }
        self.sync();

        let evidence = self.evidence.values().clone();
        let (observed, free): (Vec<VarId>, Vec<VarId>) = vars.iter().copied().partition(|&v| evidence.contains(v));

        let mut factor = self.joint(&free);
        factor.normalize()?;
        for x in observed {
            let card = self.network.cardinality(x);
            let point = Factor::from_fn([(x, card)], |a| if a.get(x) == evidence.get(x) { 1.0 } else { 0.0 });
            factor = factor.multiply(&point);
        }
        Ok(factor)
    }
}

impl InferenceEngine for VariableElimination<'_> {
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
        self.network.check_value(var, value)?;
        let posterior = self.posterior(&[var])?;
        posterior.get(&Assignment::from([(var, value)]))
    }

    fn distribution(&mut self, var: VarId) -> Result<Vec<f64>> {
        let card = self.network.get(var)?.cardinality();
        let posterior = self.posterior(&[var])?;
        (0..card)
            .map(|value| posterior.get(&Assignment::from([(var, value)])))
            .collect()
    }

    fn evidence_probability(&mut self) -> Result<f64> {
        self.sync();
        if self.evidence.values().is_empty() {
            return Ok(1.0);
        }
        Ok(self.joint(&[]).sum())
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
    use crate::error::Error;
    use crate::utils::approx_eq;

    use test_log::test;

    /// rain -> sprinkler, {rain, sprinkler} -> grass
    fn sprinkler() -> (Network, VarId, VarId, VarId) {
        let mut net = Network::new("sprinkler");
        let rain = net.add_variable("rain", ["true", "false"]).unwrap();
        let sprinkler = net.add_variable("sprinkler", ["true", "false"]).unwrap();
        let grass = net.add_variable("grass_wet", ["true", "false"]).unwrap();
        net.add_parent(sprinkler, rain).unwrap();
        net.add_parent(grass, sprinkler).unwrap();
        net.add_parent(grass, rain).unwrap();
        net.set_probabilities(rain, &[0.2, 0.8]).unwrap();
        net.set_probabilities(sprinkler, &[0.01, 0.99, 0.4, 0.6]).unwrap();
        // rows: (s, r) = (t, t), (t, f), (f, t), (f, f)
        net.set_probabilities(grass, &[0.99, 0.01, 0.9, 0.1, 0.8, 0.2, 0.0, 1.0])
            .unwrap();
        (net, rain, sprinkler, grass)
    }

    #[test]
    fn test_posteriors() {
        let (net, rain, sprinkler, grass) = sprinkler();
        let mut engine = VariableElimination::new(&net);
        assert!(approx_eq(engine.probability(sprinkler, 0).unwrap(), 0.322, 1e-4));

        engine.set_evidence(grass, 0).unwrap();
        assert!(approx_eq(engine.probability(sprinkler, 0).unwrap(), 0.6467, 1e-4));
        assert!(approx_eq(engine.probability(rain, 0).unwrap(), 0.3577, 1e-4));

        engine.set_evidence(sprinkler, 0).unwrap();
        assert!(approx_eq(engine.probability(rain, 0).unwrap(), 0.0068, 1e-4));
    }

    #[test]
    fn test_posterior_factor() {
        let (net, rain, sprinkler, grass) = sprinkler();
        let mut engine = VariableElimination::new(&net);
        engine.set_evidence(grass, 0).unwrap();
        let joint = engine.posterior(&[rain, sprinkler, grass]).unwrap();
        assert_eq!(joint.scope().len(), 3);
        assert!(approx_eq(joint.sum(), 1.0, 1e-9));
        let rain_only = joint.marginal(rain);
        assert!(approx_eq(
            rain_only.get(&Assignment::from([(rain, 0)])).unwrap(),
            0.3577,
            1e-4
        ));
    }

    #[test]
    fn test_supplied_order_gives_same_answer() {
        let (net, rain, sprinkler, grass) = sprinkler();
        let mut engine = VariableElimination::with_order(&net, vec![grass, sprinkler, rain]).unwrap();
        assert!(approx_eq(engine.probability(sprinkler, 0).unwrap(), 0.322, 1e-4));
        assert!(VariableElimination::with_order(&net, vec![VarId::new(7)]).is_err());
    }

    #[test]
    fn test_posterior_cache() {
        let (net, _, sprinkler, _) = sprinkler();
        let mut engine = VariableElimination::new(&net);
        engine.probability(sprinkler, 0).unwrap();
        engine.probability(sprinkler, 1).unwrap();
        assert_eq!(engine.posteriors.misses(), 1);
        assert_eq!(engine.posteriors.hits(), 1);
    }

    #[test]
    fn test_zero_probability_evidence() {
        let (net, rain, sprinkler, grass) = sprinkler();
        let mut engine = VariableElimination::new(&net);
        // Grass is never wet when neither the sprinkler nor the rain is on.
        engine.set_evidence(sprinkler, 1).unwrap();
        engine.set_evidence(rain, 1).unwrap();
        engine.set_evidence(grass, 0).unwrap();
        assert_eq!(engine.evidence_probability().unwrap(), 0.0);
        assert!(matches!(engine.probability(grass, 0), Err(Error::ZeroProbability)));
    }
}
