use log::{debug, info, trace};
use num_bigint::BigUint;
use rand::{Rng, RngCore};

use crate::assignment::Assignment;
use crate::cache::LruCache;
use crate::config::EngineConfig;
use crate::dtree::{DTree, NodeKind};
use crate::engine::{ancestral_sample, observed_probability, CacheStats, InferenceEngine};
use crate::error::{Error, Result};
use crate::evidence::Evidence;
use crate::network::Network;
use crate::types::{NodeId, VarId};
use crate::utils::{roulette, Instantiations};

/// Per-node data attached to the dtree once it is built.
#[derive(Debug)]
struct NodeState {
    vars: Vec<VarId>,
    cutset: Vec<VarId>,
    /// `None` for leaves, which read their factor directly.
    cache: Option<LruCache<Assignment, f64>>,
}

/// Recursive conditioning over a decomposition tree (RC1).
///
/// The value of an internal node under an assignment is the sum, over the
/// instantiations of its unassigned cutset variables, of the product of its
/// children's values. A leaf whose variable is unassigned is worth 1; an
/// assigned leaf reads its factor.
///
/// Every variable summed at a node has its own factor below that node (the
/// lowest common ancestor of its occurrences cuts it otherwise), so node
/// values are probabilities and enumeration stops once the sum reaches 1.
///
/// Node values are cached keyed by the assignment projected onto the node's
/// variables. That key holds everything the value depends on, so the caches
/// stay valid when the evidence changes.
///
/// The dtree is built on first use: from the supplied order, or from the
/// min-fill order of the moral graph.
#[derive(Debug)]
pub struct RecursiveConditioning<'a> {
    network: &'a Network,
    evidence: Evidence,
    config: EngineConfig,
    order: Option<Vec<VarId>>,
    dtree: Option<DTree>,
    nodes: Vec<NodeState>,
    evidence_probability: Option<f64>,
}

impl<'a> RecursiveConditioning<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self::with_config(network, &EngineConfig::default())
    }

    pub fn with_config(network: &'a Network, config: &EngineConfig) -> Self {
        Self {
            network,
            evidence: Evidence::new(),
            config: config.clone(),
            order: None,
            dtree: None,
            nodes: Vec::new(),
            evidence_probability: None,
        }
    }

    /// Builds the dtree from a precomputed elimination order.
    pub fn with_order(network: &'a Network, order: Vec<VarId>) -> Result<Self> {
        for &v in &order {
            network.get(v)?;
        }
        let mut engine = Self::new(network);
        engine.order = Some(order);
        Ok(engine)
    }

    /// Uses a ready-made dtree. It must hold one leaf per variable and a single root.
    pub fn with_dtree(network: &'a Network, dtree: DTree) -> Result<Self> {
        dtree.check(network)?;
        let mut engine = Self::new(network);
        engine.install(dtree);
        Ok(engine)
    }

    pub fn dtree(&mut self) -> Result<&DTree> {
        self.ensure_dtree()?;
        self.dtree.as_ref().ok_or(Error::Disconnected)
    }

    pub fn stats(&self) -> CacheStats {
        self.nodes
            .iter()
            .filter_map(|n| n.cache.as_ref())
            .fold(CacheStats::default(), |acc, cache| {
                acc + CacheStats {
                    hits: cache.hits(),
                    misses: cache.misses(),
                }
            })
    }

    fn ensure_dtree(&mut self) -> Result<()> {
        if self.dtree.is_some() {
            return Ok(());
        }
        let dtree = match &self.order {
            Some(order) => DTree::from_order(self.network, order)?,
            None => DTree::from_network(self.network)?,
        };
        self.install(dtree);
        Ok(())
    }

    fn install(&mut self, dtree: DTree) {
        self.nodes = dtree
            .nodes()
            .map(|n| {
                let vars: Vec<VarId> = dtree.vars(n).iter().copied().collect();
                let cache = match dtree.kind(n) {
                    NodeKind::Leaf { .. } => None,
                    NodeKind::Internal { .. } => Some(LruCache::new(self.cache_capacity(&vars))),
                };
                NodeState {
                    cutset: dtree.cutset(n).iter().copied().collect(),
                    vars,
                    cache,
                }
            })
            .collect();
        info!(
            "RecursiveConditioning: dtree with {} nodes, cutwidth {}, contextwidth {}",
            dtree.len(),
            dtree.cutwidth(),
            dtree.contextwidth()
        );
        self.dtree = Some(dtree);
    }

    /// `cache_ratio × Π card(vars)`, clamped to `[min_cached_count, max_cached_count]`.
    fn cache_capacity(&self, vars: &[VarId]) -> usize {
        let combined = vars
            .iter()
            .fold(BigUint::from(1u32), |acc, &v| acc * BigUint::from(self.network.cardinality(v)));
        let count = usize::try_from(&combined).map_or(f64::INFINITY, |c| c as f64);
        let min = self.config.min_cached_count as f64;
        let max = (self.config.max_cached_count as f64).max(min);
        (count * self.config.cache_ratio).clamp(min, max) as usize
    }

    fn sync(&mut self) {
        if self.evidence.take_dirty() {
            debug!("evidence changed to {}", self.evidence.values());
            self.evidence_probability = None;
        }
    }

    /// The recursive-conditioning value of the whole tree: `Pr(assignment)`.
    pub fn joint(&mut self, assignment: &Assignment) -> Result<f64> {
        self.ensure_dtree()?;
        let Some(root) = self.dtree.as_ref().and_then(DTree::root) else {
            // No variables at all.
            return Ok(1.0);
        };
        self.rc(root, assignment)
    }

    fn rc(&mut self, node: NodeId, assignment: &Assignment) -> Result<f64> {
        let dtree = self.dtree.as_ref().ok_or(Error::Disconnected)?;
        let (left, right) = match dtree.kind(node) {
            NodeKind::Leaf { var, .. } => {
                if !assignment.contains(*var) {
                    return Ok(1.0);
                }
                return self.network.factor(*var).lookup(assignment);
            }
            NodeKind::Internal { left, right } => (*left, *right),
        };

        let state = &mut self.nodes[node.index()];
        let key = assignment.project(&state.vars);
        if let Some(&value) = state.cache.as_mut().and_then(|c| c.get(&key)) {
            return Ok(value);
        }

        let free: Vec<VarId> = state.cutset.iter().copied().filter(|&v| !key.contains(v)).collect();
        let cards: Vec<usize> = free.iter().map(|&v| self.network.cardinality(v)).collect();
        trace!("rc({}) enumerating {:?}", node, free);

        let mut sum = 0.0;
        let mut current = key.clone();
        for inst in Instantiations::new(cards) {
            for (&v, &x) in free.iter().zip(&inst) {
                current.insert(v, x);
            }
            let l = self.rc(left, &current)?;
            if l == 0.0 {
                continue;
            }
            let r = self.rc(right, &current)?;
            sum += l * r;
            if sum >= 1.0 {
                break;
            }
        }

        if let Some(cache) = self.nodes[node.index()].cache.as_mut() {
            cache.insert(key, sum);
        }
        Ok(sum)
    }

    fn nonzero_evidence_probability(&mut self) -> Result<f64> {
        let pe = self.evidence_probability()?;
        if pe == 0.0 {
            return Err(Error::ZeroProbability);
        }
        Ok(pe)
    }

    /// Draws a complete assignment consistent with the evidence by descending the dtree.
    ///
    /// At every leaf whose variable is still undefined, the value is drawn with
    /// weights `Pr(running ∪ {X = v})`, which makes each draw exact.
    pub fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Assignment> {
        self.ensure_dtree()?;
        self.sync();
        self.nonzero_evidence_probability()?;
        let mut running = self.evidence.values().clone();
        if let Some(root) = self.dtree.as_ref().and_then(DTree::root) {
            self.generate_node(root, &mut running, rng)?;
        }
        Ok(running)
    }

    fn generate_node(&mut self, node: NodeId, running: &mut Assignment, rng: &mut dyn RngCore) -> Result<()> {
        let dtree = self.dtree.as_ref().ok_or(Error::Disconnected)?;
        match dtree.kind(node) {
            NodeKind::Internal { left, right } => {
                let (left, right) = (*left, *right);
                self.generate_node(left, running, rng)?;
                self.generate_node(right, running, rng)
            }
            NodeKind::Leaf { var, .. } => {
                let var = *var;
                if running.contains(var) {
                    return Ok(());
                }
                let weights = (0..self.network.cardinality(var))
                    .map(|v| self.joint(&running.with(var, v)))
                    .collect::<Result<Vec<f64>>>()?;
                let value = roulette(&weights, rng.gen::<f64>()).ok_or(Error::ZeroProbability)?;
                running.insert(var, value);
                Ok(())
            }
        }
    }
}

impl InferenceEngine for RecursiveConditioning<'_> {
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
        debug!("RecursiveConditioning::probability(var = {}, value = {})", var, value);
        self.network.check_value(var, value)?;
        self.sync();

        let pe = self.nonzero_evidence_probability()?;
        if let Some(p) = observed_probability(self.evidence.values(), var, value) {
            return Ok(p);
        }
        let extended = self.evidence.values().with(var, value);
        Ok(self.joint(&extended)? / pe)
    }

    fn evidence_probability(&mut self) -> Result<f64> {
        self.sync();
        if let Some(pe) = self.evidence_probability {
            return Ok(pe);
        }
        let pe = if self.evidence.values().is_empty() {
            1.0
        } else {
            let evidence = self.evidence.values().clone();
            self.joint(&evidence)?
        };
        self.evidence_probability = Some(pe);
        Ok(pe)
    }

    fn sample(&mut self, rng: &mut dyn RngCore) -> Result<Assignment> {
        self.sync();
        if self.evidence.values().is_empty() {
            ancestral_sample(self.network, rng)
        } else {
            self.generate(rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::approx_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

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

    /// p -> x, p -> y
    fn shared_parent() -> (Network, Vec<VarId>) {
        let mut net = Network::new("shared");
        let p = net.add_variable("p", ["0", "1"]).unwrap();
        let x = net.add_variable("x", ["0", "1"]).unwrap();
        let y = net.add_variable("y", ["0", "1"]).unwrap();
        net.add_parent(x, p).unwrap();
        net.add_parent(y, p).unwrap();
        net.set_probabilities(p, &[0.3, 0.7]).unwrap();
        net.set_probabilities(x, &[1.0, 0.0, 0.9, 0.1]).unwrap();
        net.set_probabilities(y, &[1.0, 0.0, 0.8, 0.2]).unwrap();
        (net, vec![p, x, y])
    }

    #[test]
    fn test_gender_age() {
        let (net, gender, age) = gender_age();
        let mut engine = RecursiveConditioning::new(&net);
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.5275, 1e-9));
        engine.set_evidence(gender, 0).unwrap();
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.55, 1e-9));
        engine.set_evidence(gender, 1).unwrap();
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.50, 1e-9));
        engine.clear_evidence();
        assert!(approx_eq(engine.probability(age, 0).unwrap(), 0.5275, 1e-9));
    }

    #[test]
    fn test_hand_built_dtree() {
        let (net, ids) = shared_parent();
        let (p, x, y) = (ids[0], ids[1], ids[2]);

        // x and y are composed first, the parent's leaf joins at the root.
        let mut tree = DTree::new();
        let lp = tree.add_leaf(&net, p).unwrap();
        let lx = tree.add_leaf(&net, x).unwrap();
        let ly = tree.add_leaf(&net, y).unwrap();
        let xy = tree.compose(lx, ly);
        tree.compose(xy, lp);

        let mut engine = RecursiveConditioning::with_dtree(&net, tree).unwrap();
        engine.set_evidence(x, 0).unwrap();
        engine.set_evidence(y, 0).unwrap();
        // 0.3 * 1 * 1 + 0.7 * 0.9 * 0.8
        let expected = 0.3 + 0.7 * 0.72;
        assert!(approx_eq(engine.evidence_probability().unwrap(), expected, 1e-12));
        assert!(approx_eq(engine.probability(p, 0).unwrap(), 0.3 / expected, 1e-12));
    }

    #[test]
    fn test_caches_survive_evidence_changes() {
        let (net, gender, age) = gender_age();
        let mut engine = RecursiveConditioning::new(&net);
        engine.set_evidence(gender, 0).unwrap();
        engine.probability(age, 0).unwrap();
        let before = engine.stats();

        engine.clear_evidence();
        engine.set_evidence(gender, 0).unwrap();
        engine.probability(age, 0).unwrap();
        let after = engine.stats();
        assert_eq!(after.misses, before.misses);
        assert!(after.hits > before.hits);
    }

    #[test]
    fn test_with_dtree_rejects_incomplete_tree() {
        let (net, ids) = shared_parent();
        let mut tree = DTree::new();
        tree.add_leaf(&net, ids[0]).unwrap();
        assert!(RecursiveConditioning::with_dtree(&net, tree).is_err());
    }

    #[test]
    fn test_generate_on_fresh_engine() {
        let (net, ids) = shared_parent();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut engine = RecursiveConditioning::new(&net);
        let sample = engine.generate(&mut rng).unwrap();
        assert_eq!(sample.len(), net.len());

        let mut engine = RecursiveConditioning::new(&net);
        engine.set_evidence(ids[1], 1).unwrap();
        let sample = engine.generate(&mut rng).unwrap();
        assert_eq!(sample.len(), net.len());
        assert_eq!(sample.get(ids[1]), Some(1));
        // x = 1 is impossible under p = 0.
        assert_eq!(sample.get(ids[0]), Some(1));
    }

    #[test]
    fn test_leaves_have_no_cache() {
        let (net, ids) = shared_parent();
        let mut engine = RecursiveConditioning::new(&net);
        engine.set_evidence(ids[1], 0).unwrap();
        engine.probability(ids[2], 0).unwrap();

        let (leaves, internal) = {
            let dtree = engine.dtree().unwrap();
            let leaves = dtree.leaves();
            let internal = dtree.len() - leaves.len();
            (leaves, internal)
        };
        assert!(leaves.iter().all(|l| engine.nodes[l.index()].cache.is_none()));
        assert_eq!(engine.nodes.iter().filter(|n| n.cache.is_some()).count(), internal);
        assert!(engine.stats().misses > 0);
    }

    #[test]
    fn test_empty_network() {
        let net = Network::new("empty");
        let mut engine = RecursiveConditioning::new(&net);
        assert_eq!(engine.evidence_probability().unwrap(), 1.0);
        assert_eq!(engine.joint(&Assignment::new()).unwrap(), 1.0);
    }
}
