//! Partial assignments of values to variables.
//!
//! An [`Assignment`] maps variables to value indices. It is the common currency
//! of the crate: evidence, factor rows, recursive-conditioning cache keys and
//! samples are all assignments. The map is ordered by [`VarId`], so equal
//! assignments hash and compare equal regardless of insertion order.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::VarId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Assignment(BTreeMap<VarId, usize>);

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, var: VarId) -> Option<usize> {
        self.0.get(&var).copied()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.0.contains_key(&var)
    }

    /// Sets `var` to `value`, returning the previous value.
    pub fn insert(&mut self, var: VarId, value: usize) -> Option<usize> {
        self.0.insert(var, value)
    }

    pub fn remove(&mut self, var: VarId) -> Option<usize> {
        self.0.remove(&var)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Returns a copy extended with `var = value`.
    pub fn with(&self, var: VarId, value: usize) -> Self {
        let mut res = self.clone();
        res.insert(var, value);
        res
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, usize)> + '_ {
        self.0.iter().map(|(&v, &x)| (v, x))
    }

    /// Restriction of the assignment to the given variables.
    pub fn project<'a>(&self, vars: impl IntoIterator<Item = &'a VarId>) -> Self {
        vars.into_iter()
            .filter_map(|&v| self.get(v).map(|x| (v, x)))
            .collect()
    }

    /// Union of two assignments; on conflict the values of `other` win.
    pub fn union(&self, other: &Assignment) -> Self {
        let mut res = self.clone();
        res.0.extend(other.iter());
        res
    }

    /// True if both assignments agree on every variable they share.
    pub fn is_consistent_with(&self, other: &Assignment) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .iter()
            .all(|(v, x)| large.get(v).map_or(true, |y| x == y))
    }

    /// Values of the given variables, in order, if all of them are assigned.
    pub fn key(&self, vars: &[VarId]) -> Option<Vec<usize>> {
        vars.iter().map(|&v| self.get(v)).collect()
    }
}

impl FromIterator<(VarId, usize)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (VarId, usize)>>(iter: T) -> Self {
        Assignment(iter.into_iter().collect())
    }
}

impl Extend<(VarId, usize)> for Assignment {
    fn extend<T: IntoIterator<Item = (VarId, usize)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl<const N: usize> From<[(VarId, usize); N]> for Assignment {
    fn from(pairs: [(VarId, usize); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (v, x)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", v, x)?;
        }
        write!(f, "}}")
    }
}
