//! Factor algebra.
//!
//! A [`Factor`] is a function from complete assignments over its *scope* to
//! non-negative reals. It is the shared substrate of every inference engine.
//!
//! # Representation
//!
//! - The scope is kept sorted by [`VarId`], together with the cardinality of
//!   each scope variable.
//! - Values live in a map from *row keys* (value indices aligned with the
//!   scope) to `f64`. A missing row means `0`.
//! - A factor with an empty scope and one stored row is a scalar.
//! - A factor with an empty value map is the multiplicative identity: it
//!   stands for "no constraint yet", not for zero. Operations that could
//!   otherwise produce an empty map store explicit zeros instead.
//!
//! # Operations
//!
//! | Operation | Result scope |
//! |-----------|--------------|
//! | [`Factor::multiply`] | `scope(a) ∪ scope(b)` |
//! | [`Factor::sum_out`] | `scope(a) \ {x}` |
//! | [`Factor::reduce`] | `scope(a) \ {x}` (in place, rows merged by addition) |
//! | [`Factor::reduction`] | `scope(a) \ vars(evidence)` |
//!
//! Multiplication skips the second lookup entirely when the first operand is
//! zero; engines rely on the same skip to avoid evaluating expensive subtrees.

use std::collections::HashMap;
use std::fmt;

use log::{debug, trace};

use crate::assignment::Assignment;
use crate::error::{Error, Result};
use crate::types::VarId;
use crate::utils::Instantiations;
use crate::variable::Variable;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Factor {
    scope: Vec<VarId>,
    cards: Vec<usize>,
    values: HashMap<Vec<usize>, f64>,
}

impl Factor {
    /// The multiplicative identity (empty scope, no values).
    pub fn identity() -> Self {
        Self::default()
    }

    /// A scalar factor holding a single value.
    pub fn scalar(value: f64) -> Self {
        let mut values = HashMap::with_capacity(1);
        values.insert(Vec::new(), value);
        Self {
            scope: Vec::new(),
            cards: Vec::new(),
            values,
        }
    }

    /// An all-zero factor over the given variables.
    pub fn zeros(vars: impl IntoIterator<Item = (VarId, usize)>) -> Self {
        let mut vars: Vec<_> = vars.into_iter().collect();
        vars.sort_by_key(|&(v, _)| v);
        vars.dedup_by_key(|&mut (v, _)| v);
        let (scope, cards): (Vec<_>, Vec<_>) = vars.into_iter().unzip();
        let values = Instantiations::new(cards.clone()).map(|k| (k, 0.0)).collect();
        Self {
            scope,
            cards,
            values,
        }
    }

    /// Builds a factor by evaluating `f` on every assignment over `vars`.
    pub fn from_fn(
        vars: impl IntoIterator<Item = (VarId, usize)>,
        mut f: impl FnMut(&Assignment) -> f64,
    ) -> Self {
        let mut factor = Self::zeros(vars);
        for key in Instantiations::new(factor.cards.clone()) {
            let a = factor.assignment_of(&key);
            factor.values.insert(key, f(&a));
        }
        factor
    }

    /// The factor `P(var | parents(var))` of a variable's CPT.
    pub fn from_variable(variable: &Variable) -> Self {
        let own = (variable.id(), variable.cardinality());
        let parents = variable
            .parents()
            .iter()
            .copied()
            .zip(variable.parent_cards().iter().copied());
        let mut factor = Self::zeros(std::iter::once(own).chain(parents));

        // Position of the variable and of each parent inside the sorted scope.
        let own_pos = factor.position(variable.id());
        let parent_pos: Vec<Option<usize>> =
            variable.parents().iter().map(|&p| factor.position(p)).collect();

        for pv in Instantiations::new(variable.parent_cards().to_vec()) {
            let Ok(dist) = variable.distribution(&pv) else {
                continue;
            };
            for (value, &p) in dist.iter().enumerate() {
                let mut key = vec![0; factor.scope.len()];
                if let Some(i) = own_pos {
                    key[i] = value;
                }
                for (pos, &x) in parent_pos.iter().zip(&pv) {
                    if let Some(i) = *pos {
                        key[i] = x;
                    }
                }
                factor.values.insert(key, p);
            }
        }
        factor
    }

    pub fn scope(&self) -> &[VarId] {
        &self.scope
    }

    pub fn cards(&self) -> &[usize] {
        &self.cards
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.scope.binary_search(&var).is_ok()
    }

    fn position(&self, var: VarId) -> Option<usize> {
        self.scope.binary_search(&var).ok()
    }

    pub fn cardinality(&self, var: VarId) -> Option<usize> {
        self.position(var).map(|i| self.cards[i])
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True for the multiplicative identity.
    pub fn is_identity(&self) -> bool {
        self.values.is_empty()
    }

    /// The value of a scalar factor.
    pub fn unique_value(&self) -> Option<f64> {
        if self.scope.is_empty() && self.values.len() == 1 {
            self.values.get(&Vec::new()).copied()
        } else {
            None
        }
    }

    fn assignment_of(&self, key: &[usize]) -> Assignment {
        self.scope.iter().copied().zip(key.iter().copied()).collect()
    }

    pub(crate) fn value_at(&self, key: &[usize]) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Value for an assignment covering exactly the scope.
    ///
    /// Partial coverage is an error: sum the missing variables out first.
    pub fn get(&self, assignment: &Assignment) -> Result<f64> {
        let extra: Vec<VarId> = assignment.vars().filter(|&v| !self.contains(v)).collect();
        if !extra.is_empty() {
            return Err(Error::ScopeMismatch { extra });
        }
        self.lookup(assignment)
    }

    /// Value for an assignment covering at least the scope; other variables are ignored.
    pub fn lookup(&self, assignment: &Assignment) -> Result<f64> {
        match assignment.key(&self.scope) {
            Some(key) => Ok(self.value_at(&key)),
            None => Err(Error::IncompleteAssignment {
                missing: self
                    .scope
                    .iter()
                    .copied()
                    .filter(|&v| !assignment.contains(v))
                    .collect(),
            }),
        }
    }

    /// Sets the value for an assignment covering exactly the scope.
    pub fn set(&mut self, assignment: &Assignment, value: f64) -> Result<()> {
        self.get(assignment)?;
        if let Some(key) = assignment.key(&self.scope) {
            self.values.insert(key, value);
        }
        Ok(())
    }

    /// Iterates over stored rows as `(assignment, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Assignment, f64)> + '_ {
        self.values
            .iter()
            .map(|(k, &v)| (self.assignment_of(k), v))
    }

    /// Sum of all stored values.
    pub fn sum(&self) -> f64 {
        self.values.values().sum()
    }

    /// Pointwise product.
    pub fn multiply(&self, other: &Factor) -> Factor {
        debug!("multiply(a = {:?}, b = {:?})", self.scope, other.scope);

        if self.is_identity() {
            return other.clone();
        }
        if other.is_identity() {
            return self.clone();
        }

        // Merge the two sorted scopes.
        let mut scope = Vec::with_capacity(self.scope.len() + other.scope.len());
        let mut cards = Vec::with_capacity(scope.capacity());
        let (mut i, mut j) = (0, 0);
        while i < self.scope.len() || j < other.scope.len() {
            let take_a = j >= other.scope.len()
                || (i < self.scope.len() && self.scope[i] <= other.scope[j]);
            if take_a {
                if j < other.scope.len() && self.scope[i] == other.scope[j] {
                    j += 1;
                }
                scope.push(self.scope[i]);
                cards.push(self.cards[i]);
                i += 1;
            } else {
                scope.push(other.scope[j]);
                cards.push(other.cards[j]);
                j += 1;
            }
        }

        let pos_a: Vec<usize> = self
            .scope
            .iter()
            .map(|v| scope.binary_search(v).unwrap_or_default())
            .collect();
        let pos_b: Vec<usize> = other
            .scope
            .iter()
            .map(|v| scope.binary_search(v).unwrap_or_default())
            .collect();

        let mut values = HashMap::new();
        let mut ka = vec![0; pos_a.len()];
        let mut kb = vec![0; pos_b.len()];
        for key in Instantiations::new(cards.clone()) {
            for (k, &p) in ka.iter_mut().zip(&pos_a) {
                *k = key[p];
            }
            let a = self.value_at(&ka);
            if a == 0.0 {
                values.insert(key, 0.0);
                continue;
            }
            for (k, &p) in kb.iter_mut().zip(&pos_b) {
                *k = key[p];
            }
            let b = other.value_at(&kb);
            values.insert(key, if b == 0.0 { 0.0 } else { a * b });
        }

        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Projection: sums `var` out of the factor.
    pub fn sum_out(&self, var: VarId) -> Factor {
        debug!("sum_out(scope = {:?}, var = {})", self.scope, var);

        let Some(pos) = self.position(var) else {
            return self.clone();
        };
        let card = self.cards[pos];
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        scope.remove(pos);
        cards.remove(pos);

        let mut values = HashMap::new();
        let mut full = vec![0; self.scope.len()];
        for key in Instantiations::new(cards.clone()) {
            full[..pos].copy_from_slice(&key[..pos]);
            full[pos + 1..].copy_from_slice(&key[pos..]);
            let mut sum = 0.0;
            for x in 0..card {
                full[pos] = x;
                sum += self.value_at(&full);
            }
            values.insert(key, sum);
        }

        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Sums out every variable but `var`.
    pub fn marginal(&self, var: VarId) -> Factor {
        let others: Vec<VarId> = self.scope.iter().copied().filter(|&v| v != var).collect();
        others.into_iter().fold(self.clone(), |f, v| f.sum_out(v))
    }

    /// Restricts the factor to `var = value` in place and drops `var` from the scope.
    ///
    /// Rows that collide once `var` is dropped are merged by addition.
    pub fn reduce(&mut self, var: VarId, value: usize) {
        let Some(pos) = self.position(var) else {
            return;
        };
        trace!("reduce(scope = {:?}, {} = {})", self.scope, var, value);

        self.scope.remove(pos);
        self.cards.remove(pos);
        let old = std::mem::take(&mut self.values);
        for (mut key, v) in old {
            if key[pos] != value {
                continue;
            }
            key.remove(pos);
            *self.values.entry(key).or_insert(0.0) += v;
        }
        if self.values.is_empty() {
            // Keep the factor distinguishable from the identity.
            for key in Instantiations::new(self.cards.clone()) {
                self.values.insert(key, 0.0);
            }
        }
    }

    /// Non-mutating application of [`Factor::reduce`] for every evidence pair.
    pub fn reduction(&self, evidence: &Assignment) -> Factor {
        let mut res = self.clone();
        for (var, value) in evidence.iter() {
            res.reduce(var, value);
        }
        res
    }

    /// Rescales the values so that they sum to one.
    ///
    /// Fails with [`Error::ZeroProbability`] when the total mass is zero.
    pub fn normalize(&mut self) -> Result<()> {
        let sum = self.sum();
        if sum == 1.0 {
            return Ok(());
        }
        if sum <= 0.0 || !sum.is_finite() {
            return Err(Error::ZeroProbability);
        }
        for v in self.values.values_mut() {
            *v /= sum;
        }
        Ok(())
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows: Vec<_> = self.values.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        writeln!(f, "Factor over {:?}:", self.scope)?;
        for (key, v) in rows {
            writeln!(f, "  {:?} -> {}", key, v)?;
        }
        Ok(())
    }
}
