//! Moral graphs.
//!
//! Moralization turns the network DAG into an undirected graph: every
//! parent-child edge loses its direction and every pair of co-parents gets
//! connected. The result is the state space of the elimination-order search.
//!
//! A moral graph is a disposable value. Search branches explore it by cloning
//! and then removing or eliminating nodes; the original is never mutated.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::network::Network;
use crate::types::VarId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoralGraph {
    adjacency: BTreeMap<VarId, BTreeSet<VarId>>,
}

impl MoralGraph {
    /// Moral graph over all variables of the network.
    pub fn from_network(network: &Network) -> Self {
        Self::restricted(network, network.ids())
    }

    /// Moral graph induced on a subset of the variables.
    pub fn restricted(network: &Network, vars: impl IntoIterator<Item = VarId>) -> Self {
        let keep: BTreeSet<VarId> = vars.into_iter().collect();
        let mut graph = MoralGraph::default();
        for &v in &keep {
            graph.add_node(v);
        }
        for var in network.variables() {
            let parents = var.parents();
            if keep.contains(&var.id()) {
                for &p in parents {
                    graph.add_edge(var.id(), p);
                }
            }
            for (i, &p) in parents.iter().enumerate() {
                for &q in &parents[i + 1..] {
                    graph.add_edge(p, q);
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, v: VarId) {
        self.adjacency.entry(v).or_default();
    }

    /// Adds an undirected edge if both endpoints are nodes of the graph.
    pub fn add_edge(&mut self, a: VarId, b: VarId) {
        if a == b || !self.adjacency.contains_key(&a) || !self.adjacency.contains_key(&b) {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn contains(&self, v: VarId) -> bool {
        self.adjacency.contains_key(&v)
    }

    pub fn nodes(&self) -> impl Iterator<Item = VarId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn node_set(&self) -> BTreeSet<VarId> {
        self.adjacency.keys().copied().collect()
    }

    pub fn has_edge(&self, a: VarId, b: VarId) -> bool {
        self.adjacency.get(&a).is_some_and(|n| n.contains(&b))
    }

    pub fn neighbors(&self, v: VarId) -> impl Iterator<Item = VarId> + '_ {
        self.adjacency.get(&v).into_iter().flatten().copied()
    }

    /// Number of neighbors of `v` (0 for unknown nodes).
    pub fn degree(&self, v: VarId) -> usize {
        self.adjacency.get(&v).map_or(0, BTreeSet::len)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Number of edges eliminating `v` would add between its neighbors.
    pub fn fill_in(&self, v: VarId) -> usize {
        let neighbors: Vec<VarId> = self.neighbors(v).collect();
        let mut missing = 0;
        for (i, &a) in neighbors.iter().enumerate() {
            for &b in &neighbors[i + 1..] {
                if !self.has_edge(a, b) {
                    missing += 1;
                }
            }
        }
        missing
    }

    /// Removes `v` and its incident edges.
    pub fn remove(&mut self, v: VarId) {
        if let Some(neighbors) = self.adjacency.remove(&v) {
            for n in neighbors {
                if let Some(adj) = self.adjacency.get_mut(&n) {
                    adj.remove(&v);
                }
            }
        }
    }

    /// Eliminates `v`: connects its neighbors pairwise, then removes it.
    ///
    /// Returns the degree of `v` at elimination time.
    pub fn eliminate(&mut self, v: VarId) -> usize {
        let neighbors: Vec<VarId> = self.neighbors(v).collect();
        for (i, &a) in neighbors.iter().enumerate() {
            for &b in &neighbors[i + 1..] {
                self.add_edge(a, b);
            }
        }
        self.remove(v);
        neighbors.len()
    }

    /// A copy of the graph with `v` eliminated.
    pub fn eliminated(&self, v: VarId) -> Self {
        let mut g = self.clone();
        g.eliminate(v);
        g
    }

    /// Realized width of an elimination order: the largest degree of a variable
    /// at the moment it is eliminated.
    ///
    /// The order must mention every node exactly once.
    pub fn width_of(&self, order: &[VarId]) -> Result<usize> {
        let mut g = self.clone();
        let mut width = 0;
        for &v in order {
            if !g.contains(v) {
                return Err(Error::InvalidHandle(v));
            }
            width = width.max(g.eliminate(v));
        }
        if let Some(v) = g.nodes().next() {
            return Err(Error::InvalidHandle(v));
        }
        Ok(width)
    }

    /// A maximum clique (Bron–Kerbosch with pivoting).
    pub fn max_clique(&self) -> Vec<VarId> {
        let mut best = Vec::new();
        let mut current = Vec::new();
        self.bron_kerbosch(&mut current, self.node_set(), BTreeSet::new(), &mut best);
        best
    }

    fn bron_kerbosch(
        &self,
        current: &mut Vec<VarId>,
        mut candidates: BTreeSet<VarId>,
        mut excluded: BTreeSet<VarId>,
        best: &mut Vec<VarId>,
    ) {
        if candidates.is_empty() {
            if excluded.is_empty() && current.len() > best.len() {
                *best = current.clone();
            }
            return;
        }
        // Branches that cannot beat the best clique so far are skipped.
        if current.len() + candidates.len() <= best.len() {
            return;
        }

        let pivot = candidates
            .iter()
            .chain(excluded.iter())
            .copied()
            .max_by_key(|&u| self.neighbors(u).filter(|n| candidates.contains(n)).count());
        let skip: BTreeSet<VarId> = pivot.map(|u| self.neighbors(u).collect()).unwrap_or_default();

        let branch: Vec<VarId> = candidates.difference(&skip).copied().collect();
        for v in branch {
            let neighbors: BTreeSet<VarId> = self.neighbors(v).collect();
            current.push(v);
            self.bron_kerbosch(
                current,
                candidates.intersection(&neighbors).copied().collect(),
                excluded.intersection(&neighbors).copied().collect(),
                best,
            );
            current.pop();
            candidates.remove(&v);
            excluded.insert(v);
        }
    }

    /// Admissible treewidth lower bound: size of a maximum clique minus one.
    pub fn clique_lower_bound(&self) -> usize {
        self.max_clique().len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn v(i: u32) -> VarId {
        VarId::new(i)
    }

    /// a -> c <- b, c -> d
    fn v_structure() -> Network {
        let mut net = Network::new("v");
        let a = net.add_variable("a", ["0", "1"]).unwrap();
        let b = net.add_variable("b", ["0", "1"]).unwrap();
        let c = net.add_variable("c", ["0", "1"]).unwrap();
        let d = net.add_variable("d", ["0", "1"]).unwrap();
        net.add_parent(c, a).unwrap();
        net.add_parent(c, b).unwrap();
        net.add_parent(d, c).unwrap();
        net
    }

    #[test]
    fn test_moralization_marries_parents() {
        let g = MoralGraph::from_network(&v_structure());
        assert_eq!(g.len(), 4);
        assert!(g.has_edge(v(0), v(1)));
        assert!(g.has_edge(v(0), v(2)));
        assert!(g.has_edge(v(2), v(3)));
        assert!(!g.has_edge(v(0), v(3)));
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.degree(v(2)), 3);
    }

    #[test]
    fn test_restricted() {
        let net = v_structure();
        let g = MoralGraph::restricted(&net, [v(0), v(1), v(3)]);
        assert_eq!(g.len(), 3);
        // Co-parents stay married even though their child is left out.
        assert!(g.has_edge(v(0), v(1)));
        assert_eq!(g.degree(v(3)), 0);
    }

    #[test]
    fn test_clone_and_remove_leave_original_intact() {
        let g = MoralGraph::from_network(&v_structure());
        let mut h = g.clone();
        h.remove(v(2));
        assert_eq!(h.len(), 3);
        assert_eq!(h.degree(v(3)), 0);
        assert_eq!(g.degree(v(3)), 1);
    }

    #[test]
    fn test_eliminate_adds_fill_edges() {
        let g = MoralGraph::from_network(&v_structure());
        assert_eq!(g.fill_in(v(2)), 2);
        let h = g.eliminated(v(2));
        assert!(h.has_edge(v(0), v(3)));
        assert!(h.has_edge(v(1), v(3)));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_width_of() {
        let g = MoralGraph::from_network(&v_structure());
        assert_eq!(g.width_of(&[v(3), v(0), v(1), v(2)]).unwrap(), 2);
        assert_eq!(g.width_of(&[v(2), v(0), v(1), v(3)]).unwrap(), 3);
        assert!(g.width_of(&[v(0), v(1)]).is_err());
    }

    #[test]
    fn test_max_clique() {
        let g = MoralGraph::from_network(&v_structure());
        let clique = g.max_clique();
        assert_eq!(clique.len(), 3);
        assert_eq!(g.clique_lower_bound(), 2);
        assert_eq!(MoralGraph::default().clique_lower_bound(), 0);
    }
}
