//! Type-safe handles into the network and DTree arenas.
//!
//! Variables and decomposition-tree nodes are stored in flat vectors and
//! addressed by index. The newtypes below keep the two index spaces apart.
use std::fmt;

/// A variable handle (0-indexed position in the owning [`Network`][crate::network::Network]).
///
/// # Invariants
///
/// - A `VarId` is only meaningful for the network that issued it
/// - Handles are stable: variables are never removed from a network
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Creates a handle from a raw index.
    pub const fn new(index: u32) -> Self {
        VarId(index)
    }

    /// Returns the position of the variable in the network arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw handle as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<VarId> for u32 {
    fn from(var: VarId) -> Self {
        var.0
    }
}

impl From<u32> for VarId {
    fn from(index: u32) -> Self {
        VarId(index)
    }
}

/// A node handle inside a [`DTree`][crate::dtree::DTree] arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}
