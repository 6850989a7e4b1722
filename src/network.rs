//! The Bayesian network: an arena of [`Variable`]s addressed by [`VarId`].
//!
//! The network owns every variable and CPT. Engines borrow it immutably, so a
//! finished network can be shared by any number of engine instances (also
//! across threads). Authoring requires `&mut self` and is not concurrent.
//!
//! # Derived data
//!
//! Two derived structures are memoized and recomputed on the next read after
//! an authoring call marks them dirty (an empty [`OnceLock`] is the dirty tag):
//!
//! - the topological order (roots first), reset when a variable or an edge is added;
//! - the factor of each variable, reset when that variable's table changes shape or content.
//!
//! Directed cycles are rejected when an edge is added, so the topological
//! enumeration always terminates.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::OnceLock;

use log::debug;
use num_bigint::BigUint;

use crate::assignment::Assignment;
use crate::error::{Error, Result};
use crate::factor::Factor;
use crate::types::VarId;
use crate::variable::Variable;

#[derive(Debug, Clone, Default)]
pub struct Network {
    name: String,
    variables: Vec<Variable>,
    index: HashMap<String, VarId>,
    topological: OnceLock<Vec<VarId>>,
    factors: Vec<OnceLock<Factor>>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables.iter().map(Variable::id)
    }

    /// The variable behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not issued by this network.
    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.index()]
    }

    pub fn get(&self, var: VarId) -> Result<&Variable> {
        self.variables.get(var.index()).ok_or(Error::InvalidHandle(var))
    }

    fn get_mut(&mut self, var: VarId) -> Result<&mut Variable> {
        self.variables
            .get_mut(var.index())
            .ok_or(Error::InvalidHandle(var))
    }

    pub fn id(&self, name: &str) -> Result<VarId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    pub fn variable_by_name(&self, name: &str) -> Result<&Variable> {
        self.id(name).map(|v| self.variable(v))
    }

    pub fn cardinality(&self, var: VarId) -> usize {
        self.variable(var).cardinality()
    }

    pub fn value_index(&self, var: VarId, label: &str) -> Result<usize> {
        let v = self.get(var)?;
        v.value_index(label).ok_or_else(|| Error::UnknownValue {
            variable: v.name().to_string(),
            value: label.to_string(),
        })
    }

    pub fn check_value(&self, var: VarId, value: usize) -> Result<()> {
        self.get(var)?.check_value(value)
    }

    // ─── Authoring ────────────────────────────────────────────────────────────

    /// Adds a root variable with the given ordered domain and a uniform table.
    pub fn add_variable<S: Into<String>>(
        &mut self,
        name: impl Into<String>,
        domain: impl IntoIterator<Item = S>,
    ) -> Result<VarId> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateVariable(name));
        }
        let mut labels: Vec<String> = Vec::new();
        for label in domain {
            let label = label.into();
            if labels.contains(&label) {
                return Err(Error::DuplicateValue {
                    variable: name,
                    value: label,
                });
            }
            labels.push(label);
        }

        let id = VarId::new(self.variables.len() as u32);
        debug!("add_variable(name = {}, id = {}, domain = {:?})", name, id, labels);
        self.index.insert(name.clone(), id);
        self.variables.push(Variable::new(id, name, labels));
        self.factors.push(OnceLock::new());
        self.topological = OnceLock::new();
        Ok(id)
    }

    /// Appends a value to the domain of `var` and returns its index.
    ///
    /// The new value gets probability zero in `var`'s own table; children gain
    /// zero rows for it and stay invalid until those rows are authored.
    pub fn add_domain_value(&mut self, var: VarId, label: impl Into<String>) -> Result<usize> {
        let label = label.into();
        let v = self.get(var)?;
        if v.value_index(&label).is_some() {
            return Err(Error::DuplicateValue {
                variable: v.name().to_string(),
                value: label,
            });
        }
        debug!("add_domain_value(var = {}, label = {})", var, label);

        let v = self.get_mut(var)?;
        v.push_value(label);
        let card = v.cardinality();
        self.factors[var.index()] = OnceLock::new();

        for child in self.children(var) {
            let c = &mut self.variables[child.index()];
            if let Some(pos) = c.parents().iter().position(|&p| p == var) {
                c.grow_parent(pos, card);
            }
            self.factors[child.index()] = OnceLock::new();
        }
        Ok(card - 1)
    }

    /// Adds the edge `parent -> child`.
    ///
    /// The parent becomes the last (fastest varying) parent dimension of the
    /// child's table; existing rows are copied across the parent's values.
    pub fn add_parent(&mut self, child: VarId, parent: VarId) -> Result<()> {
        let c = self.get(child)?;
        let p = self.get(parent)?;
        if child == parent {
            return Err(Error::SelfParent(c.name().to_string()));
        }
        if c.has_parent(parent) {
            return Ok(());
        }
        if self.ancestors([parent]).contains(&child) {
            return Err(Error::Cycle {
                child: c.name().to_string(),
                parent: p.name().to_string(),
            });
        }
        debug!("add_parent(child = {}, parent = {})", c.name(), p.name());

        let card = p.cardinality();
        self.variables[child.index()].push_parent(parent, card);
        self.factors[child.index()] = OnceLock::new();
        self.topological = OnceLock::new();
        Ok(())
    }

    /// Replaces the whole flat table of `var` (see [`Variable`] for the layout).
    pub fn set_probabilities(&mut self, var: VarId, table: &[f64]) -> Result<()> {
        self.get_mut(var)?.set_table(table)?;
        self.factors[var.index()] = OnceLock::new();
        Ok(())
    }

    /// Sets one row: the distribution of `var` for one instantiation of its parents.
    pub fn set_distribution(&mut self, var: VarId, parent_values: &[usize], probs: &[f64]) -> Result<()> {
        self.get_mut(var)?.set_row(parent_values, probs)?;
        self.factors[var.index()] = OnceLock::new();
        Ok(())
    }

    /// Sets `P(var = value | parents)` with the parent values read from `parents`.
    pub fn set_probability(&mut self, var: VarId, value: usize, parents: &Assignment, p: f64) -> Result<()> {
        let v = self.get(var)?;
        let parent_values = parents
            .key(v.parents())
            .ok_or_else(|| Error::IncompleteAssignment {
                missing: v
                    .parents()
                    .iter()
                    .copied()
                    .filter(|&x| !parents.contains(x))
                    .collect(),
            })?;
        self.get_mut(var)?.set_entry(value, &parent_values, p)?;
        self.factors[var.index()] = OnceLock::new();
        Ok(())
    }

    // ─── Structure ────────────────────────────────────────────────────────────

    pub fn parents(&self, var: VarId) -> &[VarId] {
        self.variable(var).parents()
    }

    pub fn children(&self, var: VarId) -> Vec<VarId> {
        self.variables
            .iter()
            .filter(|v| v.has_parent(var))
            .map(Variable::id)
            .collect()
    }

    /// Variables without parents.
    pub fn roots(&self) -> Vec<VarId> {
        self.variables
            .iter()
            .filter(|v| v.parents().is_empty())
            .map(Variable::id)
            .collect()
    }

    /// Variables without children.
    pub fn leaves(&self) -> Vec<VarId> {
        let mut has_child = vec![false; self.len()];
        for v in &self.variables {
            for &p in v.parents() {
                has_child[p.index()] = true;
            }
        }
        self.ids().filter(|v| !has_child[v.index()]).collect()
    }

    /// Root-to-leaf enumeration of the variables (memoized).
    ///
    /// Ties are broken by handle, so the order is deterministic.
    pub fn topological_order(&self) -> &[VarId] {
        self.topological.get_or_init(|| {
            let mut indegree: Vec<usize> = self.variables.iter().map(|v| v.parents().len()).collect();
            let mut children: Vec<Vec<VarId>> = vec![Vec::new(); self.len()];
            for v in &self.variables {
                for &p in v.parents() {
                    children[p.index()].push(v.id());
                }
            }
            let mut ready: BTreeSet<VarId> = self.ids().filter(|v| indegree[v.index()] == 0).collect();
            let mut order = Vec::with_capacity(self.len());
            while let Some(v) = ready.pop_first() {
                order.push(v);
                for &c in &children[v.index()] {
                    indegree[c.index()] -= 1;
                    if indegree[c.index()] == 0 {
                        ready.insert(c);
                    }
                }
            }
            debug_assert_eq!(order.len(), self.len(), "network must be acyclic");
            order
        })
    }

    /// The given variables together with all their ancestors.
    pub fn ancestors(&self, vars: impl IntoIterator<Item = VarId>) -> BTreeSet<VarId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<VarId> = vars.into_iter().collect();
        while let Some(v) = queue.pop_front() {
            if v.index() >= self.len() || !seen.insert(v) {
                continue;
            }
            queue.extend(self.parents(v).iter().copied());
        }
        seen
    }

    /// The factor `P(var | parents(var))` (memoized).
    pub fn factor(&self, var: VarId) -> &Factor {
        self.factors[var.index()].get_or_init(|| Factor::from_variable(self.variable(var)))
    }

    /// Number of complete instantiations of the network.
    pub fn state_space_size(&self) -> BigUint {
        self.variables
            .iter()
            .fold(BigUint::from(1u32), |acc, v| acc * BigUint::from(v.cardinality()))
    }

    // ─── Validity ─────────────────────────────────────────────────────────────

    pub fn is_valid(&self) -> bool {
        self.variables.iter().all(Variable::is_valid)
    }

    /// Per-node reasons for invalidity; empty for a valid network.
    pub fn problems(&self) -> Vec<(VarId, Vec<String>)> {
        self.variables
            .iter()
            .map(|v| (v.id(), v.problems()))
            .filter(|(_, p)| !p.is_empty())
            .collect()
    }

    // ─── Labels ───────────────────────────────────────────────────────────────

    /// Builds an assignment from `(variable name, value label)` pairs.
    pub fn assignment_from_labels<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Assignment> {
        pairs
            .into_iter()
            .map(|(name, label)| {
                let var = self.id(name)?;
                Ok((var, self.value_index(var, label)?))
            })
            .collect()
    }

    /// `(variable name, value label)` pairs of an assignment.
    pub fn labels(&self, assignment: &Assignment) -> Vec<(&str, &str)> {
        assignment
            .iter()
            .filter_map(|(var, value)| {
                let v = self.variables.get(var.index())?;
                Some((v.name(), v.label(value)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::approx_eq;

    use test_log::test;

    /// a -> b -> c, a -> c
    fn chain() -> (Network, VarId, VarId, VarId) {
        let mut net = Network::new("chain");
        let c = net.add_variable("c", ["t", "f"]).unwrap();
        let b = net.add_variable("b", ["t", "f"]).unwrap();
        let a = net.add_variable("a", ["t", "f"]).unwrap();
        net.add_parent(b, a).unwrap();
        net.add_parent(c, b).unwrap();
        net.add_parent(c, a).unwrap();
        (net, a, b, c)
    }

    #[test]
    fn test_lookup() {
        let (net, a, _, _) = chain();
        assert_eq!(net.id("a").unwrap(), a);
        assert!(matches!(net.id("zzz"), Err(Error::UnknownVariable(_))));
        assert_eq!(net.value_index(a, "f").unwrap(), 1);
        assert!(matches!(net.value_index(a, "x"), Err(Error::UnknownValue { .. })));
        assert!(net.check_value(a, 2).is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut net = Network::new("dup");
        net.add_variable("a", ["x", "y"]).unwrap();
        assert!(matches!(net.add_variable("a", ["x"]), Err(Error::DuplicateVariable(_))));
        assert!(matches!(net.add_variable("b", ["x", "x"]), Err(Error::DuplicateValue { .. })));
    }

    #[test]
    fn test_topological_order() {
        let (net, a, b, c) = chain();
        assert_eq!(net.topological_order(), &[a, b, c]);
        assert_eq!(net.roots(), vec![a]);
        assert_eq!(net.leaves(), vec![c]);
        assert_eq!(net.children(a), vec![c, b]);
    }

    #[test]
    fn test_topological_order_invalidated() {
        let (mut net, a, _, _) = chain();
        assert_eq!(net.topological_order().len(), 3);
        let d = net.add_variable("d", ["t", "f"]).unwrap();
        net.add_parent(a, d).unwrap();
        assert_eq!(net.topological_order()[0], d);
        assert_eq!(net.topological_order().len(), 4);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut net, a, _, c) = chain();
        assert!(matches!(net.add_parent(a, c), Err(Error::Cycle { .. })));
        assert!(matches!(net.add_parent(a, a), Err(Error::SelfParent(_))));
        // Re-adding an existing edge is a no-op.
        net.add_parent(c, a).unwrap();
        assert_eq!(net.parents(c).len(), 2);
    }

    #[test]
    fn test_ancestors() {
        let (net, a, b, c) = chain();
        assert_eq!(net.ancestors([b]), BTreeSet::from([a, b]));
        assert_eq!(net.ancestors([c]).len(), 3);
        assert!(net.ancestors([]).is_empty());
    }

    #[test]
    fn test_factor_memo_invalidated() {
        let (mut net, a, b, _) = chain();
        net.set_probabilities(b, &[0.9, 0.1, 0.3, 0.7]).unwrap();
        let p = net.factor(b).lookup(&Assignment::from([(a, 1), (b, 0)])).unwrap();
        assert_eq!(p, 0.3);

        net.set_distribution(b, &[1], &[0.6, 0.4]).unwrap();
        let p = net.factor(b).lookup(&Assignment::from([(a, 1), (b, 0)])).unwrap();
        assert_eq!(p, 0.6);

        net.set_probability(b, 0, &Assignment::from([(a, 0)]), 0.5).unwrap();
        net.set_probability(b, 1, &Assignment::from([(a, 0)]), 0.5).unwrap();
        assert!(net.is_valid());
        assert!(net.set_probability(b, 0, &Assignment::new(), 0.5).is_err());
    }

    #[test]
    fn test_add_domain_value_resizes_children() {
        let (mut net, a, b, c) = chain();
        assert!(net.is_valid());
        let idx = net.add_domain_value(a, "maybe").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(net.cardinality(a), 3);
        assert_eq!(net.variable(b).cpt().len(), 6);
        assert_eq!(net.variable(c).cpt().len(), 12);

        let problems = net.problems();
        let invalid: Vec<VarId> = problems.iter().map(|(v, _)| *v).collect();
        assert_eq!(invalid, vec![c, b]);
        assert!(!net.is_valid());

        net.set_distribution(b, &[2], &[0.5, 0.5]).unwrap();
        for bv in 0..2 {
            net.set_distribution(c, &[bv, 2], &[0.5, 0.5]).unwrap();
        }
        assert!(net.is_valid());
        assert_eq!(net.factor(a).len(), 3);
    }

    #[test]
    fn test_state_space_size() {
        let (mut net, a, _, _) = chain();
        net.add_domain_value(a, "maybe").unwrap();
        assert_eq!(net.state_space_size(), BigUint::from(12u32));
    }

    #[test]
    fn test_labels() {
        let (net, a, b, _) = chain();
        let e = net.assignment_from_labels([("a", "t"), ("b", "f")]).unwrap();
        assert_eq!(e, Assignment::from([(a, 0), (b, 1)]));
        assert_eq!(net.labels(&e), vec![("b", "f"), ("a", "t")]);
        assert!(net.assignment_from_labels([("a", "nope")]).is_err());
        assert!(approx_eq(net.factor(a).sum(), 1.0, 1e-12));
    }
}
