//! Elimination-order search.
//!
//! Finding an order of minimal width is the treewidth problem, which is
//! NP-hard. Three strategies are offered on [`MoralGraph`]:
//!
//! - **Greedy**: [`MoralGraph::min_fill_order`] and [`MoralGraph::min_degree_order`]
//!   pick, at every step, the node adding the fewest fill edges (resp. with the
//!   fewest neighbors). Fast, no guarantee.
//! - **Depth-first branch-and-bound**: [`MoralGraph::branch_and_bound`] explores
//!   prefixes depth-first under a wall-clock budget, pruning with the clique
//!   lower bound and memoizing eliminated sets.
//! - **Best-first**: [`MoralGraph::best_first`] is an A* search over the sets of
//!   remaining nodes. The first complete state popped is optimal.
//!
//! The remaining graph only depends on *which* nodes were eliminated, not on
//! the order, so the eliminated set identifies a search state.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::cache::LruCache;
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::moral::MoralGraph;
use crate::types::VarId;

/// Statistics collected during an order search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Search states expanded
    pub expanded: usize,
    /// Branches cut by the lower bound
    pub pruned: usize,
    /// States skipped because an equivalent state was already explored
    pub memo_hits: usize,
    /// Whether the time budget ran out
    pub timed_out: bool,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// An elimination order together with its realized width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationOrder {
    pub order: Vec<VarId>,
    pub width: usize,
    /// True when the search proved the width minimal.
    pub optimal: bool,
    pub stats: SearchStats,
}

struct BranchAndBound<'a> {
    config: &'a SearchConfig,
    start: Instant,
    best: Option<(Vec<VarId>, usize)>,
    memo: LruCache<BTreeSet<VarId>, usize>,
    stats: SearchStats,
}

impl BranchAndBound<'_> {
    fn out_of_time(&mut self) -> bool {
        if !self.stats.timed_out && self.start.elapsed() >= self.config.time_budget {
            self.stats.timed_out = true;
        }
        self.stats.timed_out
    }

    fn best_width(&self) -> usize {
        self.best.as_ref().map_or(usize::MAX, |(_, w)| *w)
    }

    fn search(&mut self, graph: &MoralGraph, prefix: &mut Vec<VarId>, eliminated: &mut BTreeSet<VarId>, width: usize) {
        if graph.is_empty() {
            if width < self.best_width() {
                debug!("branch_and_bound: new best width {} for {:?}", width, prefix);
                self.best = Some((prefix.clone(), width));
            }
            return;
        }
        if self.out_of_time() {
            return;
        }

        if let Some(&seen) = self.memo.get(eliminated) {
            if seen <= width {
                self.stats.memo_hits += 1;
                return;
            }
        }
        self.memo.insert(eliminated.clone(), width);

        let bound = width.max(graph.clique_lower_bound());
        if bound >= self.best_width() {
            self.stats.pruned += 1;
            return;
        }
        self.stats.expanded += 1;

        let mut candidates: Vec<VarId> = graph.nodes().collect();
        candidates.sort_by_key(|&v| (graph.fill_in(v), graph.degree(v)));

        for v in candidates {
            let degree = graph.degree(v);
            let next_width = width.max(degree);
            if next_width >= self.best_width() {
                self.stats.pruned += 1;
                continue;
            }
            let next = graph.eliminated(v);
            prefix.push(v);
            eliminated.insert(v);
            self.search(&next, prefix, eliminated, next_width);
            eliminated.remove(&v);
            prefix.pop();
            if self.stats.timed_out {
                return;
            }
        }
    }
}

/// A* search node.
#[derive(Debug)]
struct Frontier {
    f: usize,
    depth: usize,
    seq: usize,
    g: usize,
    order: Vec<VarId>,
    graph: MoralGraph,
}

impl Frontier {
    fn key(&self) -> (Reverse<usize>, usize, Reverse<usize>) {
        // Lowest f first, deepest first among ties, then insertion order.
        (Reverse(self.f), self.depth, Reverse(self.seq))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl MoralGraph {
    fn greedy_order(&self, mut score: impl FnMut(&MoralGraph, VarId) -> (usize, usize)) -> Vec<VarId> {
        let mut graph = self.clone();
        let mut order = Vec::with_capacity(graph.len());
        loop {
            let Some(v) = graph.nodes().min_by_key(|&v| (score(&graph, v), v)) else {
                break;
            };
            graph.eliminate(v);
            order.push(v);
        }
        order
    }

    /// Greedy order eliminating the node with the fewest fill edges first.
    pub fn min_fill_order(&self) -> Vec<VarId> {
        self.greedy_order(|g, v| (g.fill_in(v), g.degree(v)))
    }

    /// Greedy order eliminating the node with the fewest neighbors first.
    pub fn min_degree_order(&self) -> Vec<VarId> {
        self.greedy_order(|g, v| (g.degree(v), g.fill_in(v)))
    }

    /// Depth-first branch-and-bound search for a minimum-width order.
    ///
    /// When the time budget runs out, the best order found so far is returned
    /// with `optimal == false`. If no complete order was found by then, the
    /// search fails with [`Error::SearchTimeout`].
    pub fn branch_and_bound(&self, config: &SearchConfig) -> Result<EliminationOrder> {
        debug!("branch_and_bound(nodes = {}, budget = {:?})", self.len(), config.time_budget);

        let mut bb = BranchAndBound {
            config,
            start: Instant::now(),
            best: None,
            memo: LruCache::new(config.memo_capacity),
            stats: SearchStats::default(),
        };

        if config.seed_with_greedy {
            let order = self.min_fill_order();
            let width = self.width_of(&order)?;
            debug!("branch_and_bound: greedy seed of width {}", width);
            bb.best = Some((order, width));
        }

        let mut prefix = Vec::with_capacity(self.len());
        let mut eliminated = BTreeSet::new();
        bb.search(self, &mut prefix, &mut eliminated, 0);
        bb.stats.elapsed = bb.start.elapsed();

        let timed_out = bb.stats.timed_out;
        match bb.best {
            Some((order, width)) => {
                if timed_out {
                    warn!(
                        "Order search ran out of time after {:?}; returning width {} (may be sub-optimal)",
                        bb.stats.elapsed, width
                    );
                } else {
                    info!(
                        "Optimal elimination order of width {} found in {:?} ({} expanded, {} pruned)",
                        width, bb.stats.elapsed, bb.stats.expanded, bb.stats.pruned
                    );
                }
                Ok(EliminationOrder {
                    order,
                    width,
                    optimal: !timed_out,
                    stats: bb.stats,
                })
            }
            None if timed_out => Err(Error::SearchTimeout(config.time_budget)),
            None => Err(Error::SearchExhausted),
        }
    }

    /// Best-first (A*) search for a minimum-width order.
    ///
    /// States are sets of remaining nodes; the priority of a state is
    /// `max(width so far, clique lower bound of the remaining graph)`, never
    /// smaller than its parent's.
    pub fn best_first(&self) -> Result<EliminationOrder> {
        debug!("best_first(nodes = {})", self.len());

        let start = Instant::now();
        let mut stats = SearchStats::default();
        let mut heap = BinaryHeap::new();
        let mut closed: HashSet<BTreeSet<VarId>> = HashSet::new();
        let mut best_g: HashMap<BTreeSet<VarId>, usize> = HashMap::new();
        let mut seq = 0;

        heap.push(Frontier {
            f: self.clique_lower_bound(),
            depth: 0,
            seq,
            g: 0,
            order: Vec::new(),
            graph: self.clone(),
        });

        while let Some(node) = heap.pop() {
            if node.graph.is_empty() {
                stats.elapsed = start.elapsed();
                info!(
                    "Optimal elimination order of width {} found in {:?} ({} expanded)",
                    node.g, stats.elapsed, stats.expanded
                );
                return Ok(EliminationOrder {
                    order: node.order,
                    width: node.g,
                    optimal: true,
                    stats,
                });
            }

            let remaining = node.graph.node_set();
            if !closed.insert(remaining) {
                stats.memo_hits += 1;
                continue;
            }
            stats.expanded += 1;

            for v in node.graph.nodes() {
                let g = node.g.max(node.graph.degree(v));
                let graph = node.graph.eliminated(v);
                let key = graph.node_set();
                if closed.contains(&key) {
                    stats.memo_hits += 1;
                    continue;
                }
                if best_g.get(&key).is_some_and(|&known| known <= g) {
                    stats.pruned += 1;
                    continue;
                }
                best_g.insert(key, g);

                let f = node.f.max(g).max(graph.clique_lower_bound());
                let mut order = node.order.clone();
                order.push(v);
                seq += 1;
                heap.push(Frontier {
                    f,
                    depth: order.len(),
                    seq,
                    g,
                    order,
                    graph,
                });
            }
        }

        Err(Error::SearchExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    use test_log::test;

    fn permutations(items: &[VarId]) -> Vec<Vec<VarId>> {
        if items.is_empty() {
            return vec![Vec::new()];
        }
        let mut res = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                res.push(tail);
            }
        }
        res
    }

    fn exhaustive_width(graph: &MoralGraph) -> usize {
        let nodes: Vec<VarId> = graph.nodes().collect();
        permutations(&nodes)
            .iter()
            .map(|order| graph.width_of(order).unwrap())
            .min()
            .unwrap()
    }

    /// Builds a network over `n` binary variables with the given (parent, child) edges.
    fn network(n: usize, edges: &[(usize, usize)]) -> Network {
        let mut net = Network::new("test");
        let ids: Vec<VarId> = (0..n)
            .map(|i| net.add_variable(format!("x{}", i), ["0", "1"]).unwrap())
            .collect();
        for &(p, c) in edges {
            net.add_parent(ids[c], ids[p]).unwrap();
        }
        net
    }

    fn fixtures() -> Vec<Network> {
        vec![
            // chain
            network(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]),
            // 2x3 grid, directed left to right and top to bottom
            network(6, &[(0, 1), (1, 2), (3, 4), (4, 5), (0, 3), (1, 4), (2, 5)]),
            // two v-structures sharing a child
            network(6, &[(0, 2), (1, 2), (2, 3), (1, 4), (3, 5), (4, 5)]),
            // dense
            network(5, &[(0, 1), (0, 2), (1, 2), (1, 3), (2, 3), (3, 4), (0, 4)]),
        ]
    }

    #[test]
    fn test_greedy_orders_are_complete() {
        for net in fixtures() {
            let g = MoralGraph::from_network(&net);
            for order in [g.min_fill_order(), g.min_degree_order()] {
                assert_eq!(order.len(), g.len());
                assert!(g.width_of(&order).is_ok());
            }
        }
    }

    #[test]
    fn test_chain_width() {
        let g = MoralGraph::from_network(&fixtures()[0]);
        assert_eq!(g.width_of(&g.min_fill_order()).unwrap(), 1);
    }

    #[test]
    fn test_branch_and_bound_is_optimal() {
        for net in fixtures() {
            let g = MoralGraph::from_network(&net);
            let expected = exhaustive_width(&g);
            for seed in [true, false] {
                let config = SearchConfig::default().with_seed_with_greedy(seed);
                let res = g.branch_and_bound(&config).unwrap();
                assert!(res.optimal);
                assert_eq!(res.width, expected);
                assert_eq!(g.width_of(&res.order).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_best_first_is_optimal() {
        for net in fixtures() {
            let g = MoralGraph::from_network(&net);
            let expected = exhaustive_width(&g);
            let res = g.best_first().unwrap();
            assert!(res.optimal);
            assert_eq!(res.width, expected);
            assert_eq!(g.width_of(&res.order).unwrap(), expected);
        }
    }

    #[test]
    fn test_timeout_without_seed_fails() {
        let g = MoralGraph::from_network(&fixtures()[1]);
        let config = SearchConfig::default()
            .with_time_budget(Duration::ZERO)
            .with_seed_with_greedy(false);
        assert!(matches!(g.branch_and_bound(&config), Err(Error::SearchTimeout(_))));
    }

    #[test]
    fn test_timeout_with_seed_returns_greedy() {
        let g = MoralGraph::from_network(&fixtures()[1]);
        let config = SearchConfig::default().with_time_budget(Duration::ZERO);
        let res = g.branch_and_bound(&config).unwrap();
        assert!(!res.optimal);
        assert!(res.stats.timed_out);
        assert_eq!(res.order, g.min_fill_order());
    }

    #[test]
    fn test_empty_graph() {
        let g = MoralGraph::default();
        let res = g.branch_and_bound(&SearchConfig::default()).unwrap();
        assert!(res.order.is_empty());
        assert_eq!(res.width, 0);
        let res = g.best_first().unwrap();
        assert!(res.order.is_empty());
    }
}
