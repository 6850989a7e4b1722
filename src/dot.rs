//! Network and DTree to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! - **Networks** are rendered as a `digraph`: one node per variable, one
//!   arrow per parent edge, variables grouped by depth (roots at the top).
//! - **DTrees** are rendered as an undirected `graph`: leaves show the
//!   variable whose CPT they hold, internal nodes show their cutset.
//!
//! # Examples
//!
//! ```
//! use bn_rs::network::Network;
//!
//! let mut net = Network::new("tiny");
//! let a = net.add_variable("a", ["t", "f"]).unwrap();
//! let b = net.add_variable("b", ["t", "f"]).unwrap();
//! net.add_parent(b, a).unwrap();
//!
//! let dot = net.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.contains("v0 -> v1"));
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::dtree::{DTree, NodeKind};
use crate::network::Network;
use crate::types::VarId;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for variable nodes and DTree leaves (default: "ellipse")
    pub node_shape: &'static str,
    /// Shape for internal DTree nodes (default: "box")
    pub internal_shape: &'static str,
    /// Style for network edges (default: "solid")
    pub edge_style: &'static str,
    /// Whether to list each variable's domain under its name (default: false)
    pub show_domains: bool,
    /// Whether to group variables of equal depth on one rank (default: true)
    pub rank_by_depth: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "ellipse",
            internal_shape: "box",
            edge_style: "solid",
            show_domains: false,
            rank_by_depth: true,
        }
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\\\""))
}

fn names(network: &Network, vars: impl IntoIterator<Item = VarId>) -> String {
    vars.into_iter()
        .map(|v| network.variable(v).name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Network {
    /// Converts the network structure to DOT format.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {} {{", quote(self.name()))?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        // Depth = longest path from a root; parents precede children in topological order.
        let mut depth = vec![0usize; self.len()];
        for &v in self.topological_order() {
            depth[v.index()] = self
                .parents(v)
                .iter()
                .map(|p| depth[p.index()] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut levels = BTreeMap::<usize, Vec<VarId>>::new();
        for v in self.ids() {
            levels.entry(depth[v.index()]).or_default().push(v);
        }

        for level in levels.values() {
            if config.rank_by_depth {
                writeln!(dot, "{{ rank=same")?;
            }
            for &v in level {
                let variable = self.variable(v);
                let label = if config.show_domains {
                    format!("{}\\n{{{}}}", variable.name(), variable.domain().join(", "))
                } else {
                    variable.name().to_string()
                };
                writeln!(dot, "{} [label={}];", v, quote(&label))?;
            }
            if config.rank_by_depth {
                writeln!(dot, "}}")?;
            }
        }

        for v in self.ids() {
            for &p in self.parents(v) {
                writeln!(dot, "{} -> {} [style={}];", p, v, config.edge_style)?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

impl DTree {
    /// Converts the decomposition tree to DOT format.
    ///
    /// Leaves are labeled with their variable, internal nodes with their cutset.
    pub fn to_dot(&self, network: &Network) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(network, &DotConfig::default())
    }

    pub fn to_dot_with_config(&self, network: &Network, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "graph dtree {{")?;

        for node in self.nodes() {
            match self.kind(node) {
                NodeKind::Leaf { var, .. } => {
                    writeln!(
                        dot,
                        "n{} [shape={}, label={}];",
                        node.index(),
                        config.node_shape,
                        quote(network.variable(*var).name())
                    )?;
                }
                NodeKind::Internal { .. } => {
                    let label = format!("{{{}}}", names(network, self.cutset(node).iter().copied()));
                    writeln!(dot, "n{} [shape={}, label={}];", node.index(), config.internal_shape, quote(&label))?;
                }
            }
        }

        for node in self.nodes() {
            if let Some((left, right)) = self.children(node) {
                writeln!(dot, "n{} -- n{};", node.index(), left.index())?;
                writeln!(dot, "n{} -- n{};", node.index(), right.index())?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn chain() -> Network {
        let mut net = Network::new("chain");
        let a = net.add_variable("a", ["t", "f"]).unwrap();
        let b = net.add_variable("b", ["t", "f"]).unwrap();
        let c = net.add_variable("c", ["lo", "hi"]).unwrap();
        net.add_parent(b, a).unwrap();
        net.add_parent(c, b).unwrap();
        net
    }

    #[test]
    fn test_network_to_dot() {
        let net = chain();
        let dot = net.to_dot().unwrap();
        assert!(dot.starts_with("digraph \"chain\" {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("v0 -> v1"));
        assert!(dot.contains("v1 -> v2"));
        assert_eq!(dot.matches("rank=same").count(), 3);
    }

    #[test]
    fn test_network_to_dot_with_config() {
        let net = chain();
        let config = DotConfig {
            show_domains: true,
            rank_by_depth: false,
            ..DotConfig::default()
        };
        let dot = net.to_dot_with_config(&config).unwrap();
        assert!(dot.contains("{lo, hi}"));
        assert!(!dot.contains("rank=same"));
    }

    #[test]
    fn test_dtree_to_dot() {
        let net = chain();
        let dtree = DTree::from_network(&net).unwrap();
        let dot = dtree.to_dot(&net).unwrap();
        assert!(dot.starts_with("graph dtree {"));
        // Three leaves and two internal nodes joined by four edges.
        assert_eq!(dot.matches("shape=ellipse").count(), 3);
        assert_eq!(dot.matches("shape=box").count(), 2);
        assert_eq!(dot.matches(" -- ").count(), 4);
    }

    /// Helper test to write DOT files for manual inspection (disabled by default)
    #[test]
    #[ignore]
    fn test_write_dot_file() {
        let net = chain();
        std::fs::write("network.dot", net.to_dot().unwrap()).unwrap();
        let dtree = DTree::from_network(&net).unwrap();
        std::fs::write("dtree.dot", dtree.to_dot(&net).unwrap()).unwrap();
    }
}
