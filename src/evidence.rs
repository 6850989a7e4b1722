//! Evidence owned by an inference engine.
//!
//! Mutating the evidence only flips a dirty flag; engines consume the flag at
//! the start of their next query and drop whatever caches depended on the old
//! evidence.

use crate::assignment::Assignment;
use crate::types::VarId;

#[derive(Debug, Clone, Default)]
pub struct Evidence {
    values: Assignment,
    dirty: bool,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &Assignment {
        &self.values
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the dirty flag and resets it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Asserts `var = value`. Re-asserting the current value is a no-op.
    pub fn assert(&mut self, var: VarId, value: usize) {
        if self.values.insert(var, value) != Some(value) {
            self.dirty = true;
        }
    }

    pub fn retract(&mut self, var: VarId) {
        if self.values.remove(var).is_some() {
            self.dirty = true;
        }
    }

    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.dirty = true;
        }
    }

    /// Replaces the evidence wholesale.
    pub fn replace(&mut self, values: Assignment) {
        if self.values != values {
            self.values = values;
            self.dirty = true;
        }
    }
}
