//! Decomposition trees.
//!
//! A [`DTree`] is a full binary tree whose leaves are the factors of the
//! network (one per variable). It structures recursive conditioning: every
//! internal node splits its factors in two halves that become independent
//! once the node's *cutset* is instantiated.
//!
//! Nodes live in an arena addressed by [`NodeId`]; parent links are plain
//! indices.
//!
//! # Derived sets
//!
//! For a node `n` with children `l` and `r`:
//!
//! - `vars(n)`: variables mentioned by the factors below `n`.
//! - `acutset(n)`: union of the cutsets of all ancestors of `n`.
//! - `cutset(n) = (vars(l) ∩ vars(r)) \ acutset(n)`, and `vars(n) \ acutset(n)` for a leaf.
//! - `context(n) = vars(n) ∩ acutset(n)`.
//!
//! The sets are computed together on first access and dropped whenever the
//! topology changes.
//!
//! The ancestor cutset is the *union* of the ancestors' cutsets. One edition
//! of the published algorithm states it as an intersection; the union is the
//! reading under which every leaf sees all its parents instantiated.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::moral::MoralGraph;
use crate::network::Network;
use crate::types::{NodeId, VarId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The factor of `var`, mentioning `scope` (the variable and its parents).
    Leaf { var: VarId, scope: Vec<VarId> },
    Internal { left: NodeId, right: NodeId },
}

#[derive(Debug, Clone)]
struct DNode {
    kind: NodeKind,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct Derived {
    vars: Vec<BTreeSet<VarId>>,
    cutset: Vec<BTreeSet<VarId>>,
    acutset: Vec<BTreeSet<VarId>>,
    context: Vec<BTreeSet<VarId>>,
}

#[derive(Debug, Clone, Default)]
pub struct DTree {
    nodes: Vec<DNode>,
    derived: OnceLock<Derived>,
}

impl DTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a balanced dtree from an elimination order (eo2dtree).
    ///
    /// For each variable of the order in turn, the trees mentioning it are
    /// composed into one. Trees left at the end are composed under the root.
    /// Variables missing from the order are simply never used as pivots.
    pub fn from_order(network: &Network, order: &[VarId]) -> Result<Self> {
        debug!("DTree::from_order(order = {:?})", order);

        let mut tree = DTree::new();
        let mut pool: Vec<(NodeId, BTreeSet<VarId>)> = Vec::with_capacity(network.len());
        for var in network.ids() {
            let leaf = tree.add_leaf(network, var)?;
            let vars = tree.leaf_scope(leaf).iter().copied().collect();
            pool.push((leaf, vars));
        }

        for &x in order {
            network.get(x)?;
            let (with, without): (Vec<_>, Vec<_>) = pool.into_iter().partition(|(_, vars)| vars.contains(&x));
            pool = without;
            if with.is_empty() {
                continue;
            }
            let vars = with.iter().flat_map(|(_, v)| v.iter().copied()).collect();
            let ids: Vec<NodeId> = with.into_iter().map(|(id, _)| id).collect();
            let node = tree.balanced(&ids);
            pool.push((node, vars));
        }

        let ids: Vec<NodeId> = pool.into_iter().map(|(id, _)| id).collect();
        if !ids.is_empty() {
            tree.balanced(&ids);
        }

        info!(
            "DTree built: {} nodes, height {}, cutwidth {}, contextwidth {}",
            tree.len(),
            tree.height(),
            tree.cutwidth(),
            tree.contextwidth()
        );
        Ok(tree)
    }

    /// Builds a dtree from the greedy min-fill order of the network's moral graph.
    pub fn from_network(network: &Network) -> Result<Self> {
        let order = MoralGraph::from_network(network).min_fill_order();
        Self::from_order(network, &order)
    }

    fn balanced(&mut self, ids: &[NodeId]) -> NodeId {
        match ids {
            [single] => *single,
            _ => {
                let (l, r) = ids.split_at(ids.len() / 2);
                let left = self.balanced(l);
                let right = self.balanced(r);
                self.compose(left, right)
            }
        }
    }

    /// Adds a detached leaf holding the factor of `var`.
    pub fn add_leaf(&mut self, network: &Network, var: VarId) -> Result<NodeId> {
        let variable = network.get(var)?;
        let mut scope: Vec<VarId> = variable.parents().to_vec();
        scope.push(var);
        scope.sort();
        Ok(self.push(NodeKind::Leaf { var, scope }))
    }

    /// Joins two detached subtrees under a new internal node.
    ///
    /// # Panics
    ///
    /// Panics if either node already has a parent or if both are the same node.
    pub fn compose(&mut self, left: NodeId, right: NodeId) -> NodeId {
        assert_ne!(left, right, "cannot compose a node with itself");
        assert!(self.nodes[left.index()].parent.is_none(), "{} already has a parent", left);
        assert!(self.nodes[right.index()].parent.is_none(), "{} already has a parent", right);

        let id = self.push(NodeKind::Internal { left, right });
        self.nodes[left.index()].parent = Some(id);
        self.nodes[right.index()].parent = Some(id);
        id
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(DNode { kind, parent: None });
        self.derived = OnceLock::new();
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }

    /// The unique node without a parent, if the tree is connected.
    pub fn root(&self) -> Option<NodeId> {
        let mut roots = self.nodes().filter(|&n| self.nodes[n.index()].parent.is_none());
        let root = roots.next()?;
        match roots.next() {
            Some(_) => None,
            None => Some(root),
        }
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.index()].kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    pub fn children(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        match self.kind(node) {
            NodeKind::Internal { left, right } => Some((*left, *right)),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn is_leaf(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Leaf { .. })
    }

    /// The variable whose factor sits at a leaf.
    pub fn leaf_var(&self, node: NodeId) -> Option<VarId> {
        match self.kind(node) {
            NodeKind::Leaf { var, .. } => Some(*var),
            NodeKind::Internal { .. } => None,
        }
    }

    fn leaf_scope(&self, node: NodeId) -> &[VarId] {
        match self.kind(node) {
            NodeKind::Leaf { scope, .. } => scope,
            NodeKind::Internal { .. } => &[],
        }
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes().filter(|&n| self.is_leaf(n)).collect()
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        fn go(tree: &DTree, node: NodeId) -> usize {
            match tree.children(node) {
                Some((l, r)) => 1 + go(tree, l).max(go(tree, r)),
                None => 0,
            }
        }
        self.root().map_or(0, |r| go(self, r))
    }

    // ─── Derived sets ─────────────────────────────────────────────────────────

    fn derived(&self) -> &Derived {
        self.derived.get_or_init(|| self.derive())
    }

    fn derive(&self) -> Derived {
        let n = self.nodes.len();
        let mut d = Derived {
            vars: vec![BTreeSet::new(); n],
            cutset: vec![BTreeSet::new(); n],
            acutset: vec![BTreeSet::new(); n],
            context: vec![BTreeSet::new(); n],
        };

        // Children are always created before their parent.
        for node in self.nodes() {
            let vars = match self.kind(node) {
                NodeKind::Leaf { scope, .. } => scope.iter().copied().collect(),
                NodeKind::Internal { left, right } => {
                    d.vars[left.index()].union(&d.vars[right.index()]).copied().collect()
                }
            };
            d.vars[node.index()] = vars;
        }

        // Parents are visited before their children going backwards.
        for node in self.nodes().rev() {
            let i = node.index();
            let acutset = match self.parent(node) {
                Some(p) => d.acutset[p.index()].union(&d.cutset[p.index()]).copied().collect(),
                None => BTreeSet::new(),
            };
            let cutset = match self.kind(node) {
                NodeKind::Leaf { .. } => d.vars[i].difference(&acutset).copied().collect(),
                NodeKind::Internal { left, right } => d.vars[left.index()]
                    .intersection(&d.vars[right.index()])
                    .filter(|v| !acutset.contains(v))
                    .copied()
                    .collect(),
            };
            d.context[i] = d.vars[i].intersection(&acutset).copied().collect();
            d.cutset[i] = cutset;
            d.acutset[i] = acutset;
        }
        d
    }

    pub fn vars(&self, node: NodeId) -> &BTreeSet<VarId> {
        &self.derived().vars[node.index()]
    }

    pub fn cutset(&self, node: NodeId) -> &BTreeSet<VarId> {
        &self.derived().cutset[node.index()]
    }

    pub fn acutset(&self, node: NodeId) -> &BTreeSet<VarId> {
        &self.derived().acutset[node.index()]
    }

    pub fn context(&self, node: NodeId) -> &BTreeSet<VarId> {
        &self.derived().context[node.index()]
    }

    /// Largest cutset of an internal node.
    pub fn cutwidth(&self) -> usize {
        self.nodes()
            .filter(|&n| !self.is_leaf(n))
            .map(|n| self.cutset(n).len())
            .max()
            .unwrap_or(0)
    }

    /// Largest context.
    pub fn contextwidth(&self) -> usize {
        self.nodes().map(|n| self.context(n).len()).max().unwrap_or(0)
    }

    /// Checks that every network variable has exactly one leaf and that the tree is connected.
    pub fn check(&self, network: &Network) -> Result<()> {
        let mut seen = BTreeSet::new();
        for leaf in self.leaves() {
            if let Some(var) = self.leaf_var(leaf) {
                network.get(var)?;
                if !seen.insert(var) {
                    return Err(Error::InvalidHandle(var));
                }
            }
        }
        if let Some(missing) = network.ids().find(|v| !seen.contains(v)) {
            return Err(Error::InvalidHandle(missing));
        }
        if !self.is_empty() && self.root().is_none() {
            return Err(Error::Disconnected);
        }
        Ok(())
    }
}
