//! Discrete variables and their conditional probability tables.
//!
//! # CPT layout
//!
//! The table is stored flat, one *row* per instantiation of the parents and one
//! column per value of the variable itself:
//!
//! ```text
//! index(value, parents) = row(parents) * |domain| + value
//! row(parents)          = Σ parents[i] * stride[i]
//! stride[last]          = 1
//! stride[i]             = stride[i + 1] * |domain(parents[i + 1])|
//! ```
//!
//! The variable's own value varies fastest, then the last parent, and the first
//! parent varies slowest. This is the row-major order of the XMLBIF `TABLE`
//! element with parents listed in `GIVEN` order.

use crate::assignment::Assignment;
use crate::error::{Error, Result};
use crate::types::VarId;
use crate::utils::{instantiation_count, Instantiations};

/// Tolerance used when checking that CPT rows sum to one.
pub const CPT_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone)]
pub struct Variable {
    id: VarId,
    name: String,
    domain: Vec<String>,
    parents: Vec<VarId>,
    parent_cards: Vec<usize>,
    strides: Vec<usize>,
    cpt: Vec<f64>,
}

impl Variable {
    /// Creates a root variable with a uniform distribution over `domain`.
    pub(crate) fn new(id: VarId, name: String, domain: Vec<String>) -> Self {
        let card = domain.len();
        let cpt = if card == 0 {
            Vec::new()
        } else {
            vec![1.0 / card as f64; card]
        };
        Self {
            id,
            name,
            domain,
            parents: Vec::new(),
            parent_cards: Vec::new(),
            strides: Vec::new(),
            cpt,
        }
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &[String] {
        &self.domain
    }

    pub fn cardinality(&self) -> usize {
        self.domain.len()
    }

    pub fn label(&self, value: usize) -> Option<&str> {
        self.domain.get(value).map(String::as_str)
    }

    pub fn value_index(&self, label: &str) -> Option<usize> {
        self.domain.iter().position(|d| d == label)
    }

    /// Parents in CPT-dimension order.
    pub fn parents(&self) -> &[VarId] {
        &self.parents
    }

    pub fn parent_cards(&self) -> &[usize] {
        &self.parent_cards
    }

    pub fn has_parent(&self, var: VarId) -> bool {
        self.parents.contains(&var)
    }

    /// The flat table.
    pub fn cpt(&self) -> &[f64] {
        &self.cpt
    }

    /// Number of parent instantiations (rows of the table).
    pub fn row_count(&self) -> usize {
        instantiation_count(&self.parent_cards)
    }

    pub(crate) fn check_value(&self, value: usize) -> Result<()> {
        if value < self.cardinality() {
            Ok(())
        } else {
            Err(Error::ValueOutOfRange {
                variable: self.name.clone(),
                index: value,
                cardinality: self.cardinality(),
            })
        }
    }

    fn row_index(&self, parent_values: &[usize]) -> Result<usize> {
        if parent_values.len() != self.parents.len() {
            return Err(Error::TableSize {
                variable: self.name.clone(),
                expected: self.parents.len(),
                actual: parent_values.len(),
            });
        }
        let mut row = 0;
        for ((&p, &card), &stride) in parent_values
            .iter()
            .zip(&self.parent_cards)
            .zip(&self.strides)
        {
            if p >= card {
                return Err(Error::ValueOutOfRange {
                    variable: format!("parent of {}", self.name),
                    index: p,
                    cardinality: card,
                });
            }
            row += p * stride;
        }
        Ok(row)
    }

    /// `P(self = value | parents = parent_values)`.
    pub fn probability(&self, value: usize, parent_values: &[usize]) -> Result<f64> {
        self.check_value(value)?;
        let row = self.row_index(parent_values)?;
        Ok(self.cpt[row * self.cardinality() + value])
    }

    /// `P(self = value | parents)` with parent values read from an assignment.
    ///
    /// Returns `None` if a parent is not assigned.
    pub fn probability_given(&self, value: usize, assignment: &Assignment) -> Option<f64> {
        let mut row = 0;
        for (&p, &stride) in self.parents.iter().zip(&self.strides) {
            row += assignment.get(p)? * stride;
        }
        self.cpt.get(row * self.cardinality() + value).copied()
    }

    /// The conditional distribution for one parent instantiation.
    pub fn distribution(&self, parent_values: &[usize]) -> Result<&[f64]> {
        let row = self.row_index(parent_values)?;
        let card = self.cardinality();
        Ok(&self.cpt[row * card..(row + 1) * card])
    }

    fn recompute_strides(&mut self) {
        let mut strides = vec![0; self.parent_cards.len()];
        let mut acc = 1;
        for i in (0..self.parent_cards.len()).rev() {
            strides[i] = acc;
            acc *= self.parent_cards[i];
        }
        self.strides = strides;
    }

    /// Appends a new value with probability zero in every row.
    pub(crate) fn push_value(&mut self, label: String) {
        let old_card = self.cardinality();
        let rows = self.row_count();
        self.domain.push(label);
        let card = self.cardinality();
        let mut cpt = Vec::with_capacity(rows * card);
        for r in 0..rows {
            if old_card == 0 {
                // A variable with an empty domain has no mass to preserve.
                cpt.push(1.0);
            } else {
                cpt.extend_from_slice(&self.cpt[r * old_card..(r + 1) * old_card]);
                cpt.push(0.0);
            }
        }
        self.cpt = cpt;
    }

    /// Appends a parent as the fastest-varying parent dimension.
    ///
    /// Every existing row is copied across the values of the new parent, so a
    /// valid table stays valid.
    pub(crate) fn push_parent(&mut self, parent: VarId, card: usize) {
        let own = self.cardinality();
        let mut cpt = Vec::with_capacity(self.cpt.len() * card);
        for row in self.cpt.chunks(own.max(1)) {
            for _ in 0..card {
                cpt.extend_from_slice(row);
            }
        }
        self.parents.push(parent);
        self.parent_cards.push(card);
        self.cpt = cpt;
        self.recompute_strides();
    }

    /// Grows the domain of the parent at position `pos` to `new_card`.
    ///
    /// Rows for the new parent values are zero until authored.
    pub(crate) fn grow_parent(&mut self, pos: usize, new_card: usize) {
        let own = self.cardinality();
        let old_strides = self.strides.clone();
        let old_card = self.parent_cards[pos];
        let old_cpt = std::mem::take(&mut self.cpt);

        self.parent_cards[pos] = new_card;
        self.recompute_strides();
        self.cpt = vec![0.0; self.row_count() * own];

        for pv in Instantiations::new(self.parent_cards.clone()) {
            if pv[pos] >= old_card {
                continue;
            }
            let old_row: usize = pv.iter().zip(&old_strides).map(|(p, s)| p * s).sum();
            let new_row: usize = pv.iter().zip(&self.strides).map(|(p, s)| p * s).sum();
            self.cpt[new_row * own..(new_row + 1) * own]
                .copy_from_slice(&old_cpt[old_row * own..(old_row + 1) * own]);
        }
    }

    fn check_probability(&self, p: f64) -> Result<()> {
        if p.is_finite() && (0.0..=1.0 + CPT_EPSILON).contains(&p) {
            Ok(())
        } else {
            Err(Error::InvalidProbability {
                variable: self.name.clone(),
                value: p,
            })
        }
    }

    pub(crate) fn set_table(&mut self, table: &[f64]) -> Result<()> {
        let expected = self.row_count() * self.cardinality();
        if table.len() != expected {
            return Err(Error::TableSize {
                variable: self.name.clone(),
                expected,
                actual: table.len(),
            });
        }
        for &p in table {
            self.check_probability(p)?;
        }
        self.cpt.copy_from_slice(table);
        Ok(())
    }

    pub(crate) fn set_row(&mut self, parent_values: &[usize], probs: &[f64]) -> Result<()> {
        let card = self.cardinality();
        if probs.len() != card {
            return Err(Error::TableSize {
                variable: self.name.clone(),
                expected: card,
                actual: probs.len(),
            });
        }
        for &p in probs {
            self.check_probability(p)?;
        }
        let row = self.row_index(parent_values)?;
        self.cpt[row * card..(row + 1) * card].copy_from_slice(probs);
        Ok(())
    }

    pub(crate) fn set_entry(&mut self, value: usize, parent_values: &[usize], p: f64) -> Result<()> {
        self.check_value(value)?;
        self.check_probability(p)?;
        let row = self.row_index(parent_values)?;
        let card = self.cardinality();
        self.cpt[row * card + value] = p;
        Ok(())
    }

    /// Reasons why the table is not a valid conditional distribution.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let card = self.cardinality();
        if card == 0 {
            problems.push("empty domain".to_string());
            return problems;
        }
        for (r, row) in self.cpt.chunks(card).enumerate() {
            if let Some(p) = row.iter().find(|p| !p.is_finite() || **p < 0.0) {
                problems.push(format!("row {} contains invalid probability {}", r, p));
                continue;
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > CPT_EPSILON {
                problems.push(format!("row {} sums to {} instead of 1", r, sum));
            }
        }
        problems
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }
}
