//! Error types for network authoring, inference, search and exchange I/O.

use std::time::Duration;

use thiserror::Error;

use crate::types::VarId;

/// Errors reported by the inference core.
///
/// Every error is local to the operation that raised it: engines and
/// networks stay usable for subsequent, independent calls.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// No variable with this name exists in the network.
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// The handle does not belong to the network.
    #[error("invalid variable handle {0}")]
    InvalidHandle(VarId),

    /// The label is not part of the variable's domain.
    #[error("value `{value}` is not in the domain of `{variable}`")]
    UnknownValue { variable: String, value: String },

    /// The value index is outside the variable's domain.
    #[error("value index {index} is out of range for `{variable}` (cardinality {cardinality})")]
    ValueOutOfRange {
        variable: String,
        index: usize,
        cardinality: usize,
    },

    #[error("duplicate variable `{0}`")]
    DuplicateVariable(String),

    #[error("duplicate value `{value}` in the domain of `{variable}`")]
    DuplicateValue { variable: String, value: String },

    #[error("variable `{0}` cannot be its own parent")]
    SelfParent(String),

    /// Adding the edge `parent -> child` would close a directed cycle.
    #[error("adding `{parent}` as a parent of `{child}` would create a cycle")]
    Cycle { child: String, parent: String },

    #[error("table for `{variable}` has {actual} entries, expected {expected}")]
    TableSize {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid probability {value} for `{variable}`")]
    InvalidProbability { variable: String, value: f64 },

    /// The assignment does not cover the whole scope of a factor.
    #[error("assignment does not cover the factor scope: missing {missing:?}")]
    IncompleteAssignment { missing: Vec<VarId> },

    /// The assignment mentions variables outside the factor scope.
    #[error("assignment mentions variables outside the factor scope: {extra:?}")]
    ScopeMismatch { extra: Vec<VarId> },

    /// The evidence has probability zero, so every posterior is undefined.
    #[error("division by zero probability: the evidence is impossible")]
    ZeroProbability,

    /// Malformed exchange data.
    #[error("parse error at {path}: {message}")]
    Parse { path: String, message: String },

    /// The search budget expired before any complete elimination order was found.
    #[error("no elimination order found within {0:?}")]
    SearchTimeout(Duration),

    #[error("elimination order search exhausted without a complete order")]
    SearchExhausted,

    /// The decomposition tree has more than one root.
    #[error("decomposition tree is not connected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    pub(crate) fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
