//! Evaluation errors.

use crate::graph::{GraphError, NodeIndex};
use thiserror::Error;

/// Error raised by the forward or backward evaluator.
///
/// Cancellation is not an error; see [`EvalStatus`](super::EvalStatus).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// An input node is read but no value was bound to it.
    #[error("input node {node} ({}) read by {} but never bound", describe(.label), consumer_name(.consumer))]
    UnboundInput {
        /// Unbound input node
        node: NodeIndex,
        /// Label of the input node
        label: Option<String>,
        /// First node reading the input, `None` if it is only retained
        consumer: Option<NodeIndex>,
    },

    /// Non-finite value produced while numeric violations are fatal.
    #[error("non-finite value at node {node} ({})", describe(.label))]
    NumericDomainViolation {
        /// Offending node
        node: NodeIndex,
        /// Label of the offending node
        label: Option<String>,
    },

    /// A value needed by a node is no longer (or was never) in the store.
    #[error("value of node {node} required by node {consumer} is not available")]
    MissingValue {
        /// Node whose value is missing
        node: NodeIndex,
        /// Node that needed it
        consumer: NodeIndex,
    },

    /// Bound value has the wrong number of paths.
    #[error("binding for node {node} has {actual} paths, expected {expected}")]
    SizeMismatch {
        /// Bound node
        node: NodeIndex,
        /// Path count of the registry
        expected: usize,
        /// Path count of the bound value
        actual: usize,
    },

    /// Retention bitmap does not match the graph.
    #[error("retention bitmap covers {actual} nodes but graph has {expected}")]
    RetentionSize {
        /// Graph size
        expected: usize,
        /// Bitmap size
        actual: usize,
    },

    /// Structural problem in the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn describe(label: &Option<String>) -> &str {
    label.as_deref().unwrap_or("unlabelled")
}

fn consumer_name(consumer: &Option<NodeIndex>) -> String {
    match consumer {
        Some(c) => format!("node {}", c),
        None => "the retained outputs".to_string(),
    }
}

/// Result alias for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;
