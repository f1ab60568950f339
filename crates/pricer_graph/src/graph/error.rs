//! Graph construction errors.
//!
//! Every variant indicates a defect in the code that builds the graph. They
//! are surfaced immediately and never retried.

use crate::ops::{Arity, OpKind};
use thiserror::Error;

/// Error raised while appending to or querying a [`ComputationGraph`](super::ComputationGraph).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// An input index does not precede the node being appended.
    #[error("node {node} ({op}) references input {input} which is not yet defined")]
    ForwardReference {
        /// Index the node would have received
        node: usize,
        /// Operator kind
        op: OpKind,
        /// Offending input index
        input: usize,
    },

    /// Operator called with the wrong number of inputs.
    #[error("operator {op} expects {expected} inputs, got {actual}")]
    Arity {
        /// Operator kind
        op: OpKind,
        /// Accepted input count
        expected: Arity,
        /// Supplied input count
        actual: usize,
    },

    /// Label already names another node.
    #[error("label '{label}' already assigned to node {existing}")]
    DuplicateLabel {
        /// Fully prefixed label
        label: String,
        /// Node that owns the label
        existing: usize,
    },

    /// No node carries the requested label.
    #[error("no node labelled '{0}'")]
    NotFound(String),

    /// Index outside the graph.
    #[error("node {node} out of range (graph size {size})")]
    UnknownNode {
        /// Requested index
        node: usize,
        /// Current graph size
        size: usize,
    },
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
