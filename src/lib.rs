//! # bn-rs: Exact inference over discrete Bayesian networks
//!
//! **`bn-rs`** answers probabilistic queries over discrete Bayesian networks:
//! marginal and posterior probabilities `Pr(X = v | e)`, the probability of the
//! evidence `Pr(e)`, posterior factors over sets of variables, and samples
//! consistent with the evidence.
//!
//! ## Key Features
//!
//! - **Arena-backed networks**: variables live in a [`Network`][crate::network::Network] and are addressed by
//!   lightweight [`VarId`][crate::types::VarId] handles. Cycles are rejected as edges are added.
//! - **Four exact engines** behind one [`InferenceEngine`][crate::engine::InferenceEngine] trait:
//!   simple conditioning, variable elimination, recursive conditioning over a decomposition tree,
//!   and a dispatcher picking the best one per query.
//! - **Caching everywhere**: factor reductions, posteriors and recursive-conditioning contexts are
//!   memoized in bounded LRU caches with hit/miss statistics.
//! - **Elimination-order search**: greedy heuristics, depth-first branch-and-bound with a time budget,
//!   and best-first (A*) search for a minimum-width order.
//! - **Exchange**: XMLBIF 0.3 reading and writing, Graphviz export.
//!
//! ## Basic Usage
//!
//! ```rust
//! use bn_rs::engine::{InferenceEngine, VariableElimination};
//! use bn_rs::network::Network;
//!
//! let mut net = Network::new("population");
//! let gender = net.add_variable("gender", ["male", "female"]).unwrap();
//! let age = net.add_variable("age", ["<15", ">=15"]).unwrap();
//! net.add_parent(age, gender).unwrap();
//! net.set_probabilities(gender, &[0.55, 0.45]).unwrap();
//! // One row per parent value, own value varying fastest.
//! net.set_probabilities(age, &[0.55, 0.45, 0.50, 0.50]).unwrap();
//!
//! let mut engine = VariableElimination::new(&net);
//! let p = engine.probability(age, 0).unwrap();
//! assert!((p - 0.5275).abs() < 1e-9);
//!
//! engine.set_evidence_by_name("gender", "male").unwrap();
//! let p = engine.probability(age, 0).unwrap();
//! assert!((p - 0.55).abs() < 1e-9);
//! ```
//!
//! ## Core Components
//!
//! - **[`network`]**: network authoring, validity and graph queries.
//! - **[`factor`]**: the factor algebra every engine is built on.
//! - **[`engine`]**: the inference engines.
//! - **[`order`]** and **[`dtree`]**: elimination orders and decomposition trees.
//! - **[`bif`]** and **[`dot`]**: XMLBIF exchange and Graphviz export.

pub mod assignment;
pub mod bif;
pub mod cache;
pub mod config;
pub mod dot;
pub mod dtree;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod factor;
pub mod moral;
pub mod network;
pub mod order;
pub mod reduction;
pub mod types;
pub mod utils;
pub mod variable;
