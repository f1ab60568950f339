//! Node records stored in the graph arena.

use crate::ops::OpKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a node in the graph arena.
pub type NodeIndex = usize;

/// Origin of the value of an input node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InputKind {
    /// Literal from the constant pool
    Constant,
    /// Model parameter, broadcast across paths
    Parameter,
    /// Slice of the path tensor
    RandomVariate,
    /// Any other externally bound value
    Variable,
}

impl InputKind {
    /// Mnemonic used in SSA dumps.
    pub fn name(self) -> &'static str {
        match self {
            InputKind::Constant => "const",
            InputKind::Parameter => "param",
            InputKind::RandomVariate => "rv",
            InputKind::Variable => "var",
        }
    }
}

/// What a node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    /// Value supplied by the caller through input bindings
    Input(InputKind),
    /// Value computed from earlier nodes
    Operation(OpKind),
}

/// A node of the computation graph. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) args: Vec<NodeIndex>,
    pub(crate) label: Option<String>,
}

impl Node {
    /// Node kind.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Operator kind, `None` for input nodes.
    #[inline]
    pub fn op(&self) -> Option<OpKind> {
        match self.kind {
            NodeKind::Operation(op) => Some(op),
            NodeKind::Input(_) => None,
        }
    }

    /// Returns `true` for input nodes.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input(_))
    }

    /// Ordered input indices.
    #[inline]
    pub fn args(&self) -> &[NodeIndex] {
        &self.args
    }

    /// Label given at creation, including any prefix.
    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Half-open range `[first, last)` of node indices appended by one contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRange {
    /// First index in the range
    pub first: NodeIndex,
    /// One past the last index
    pub last: NodeIndex,
}

impl NodeRange {
    /// Creates a range; `last` is clamped to be at least `first`.
    pub fn new(first: NodeIndex, last: NodeIndex) -> Self {
        Self {
            first,
            last: last.max(first),
        }
    }

    /// Number of nodes in the range.
    #[inline]
    pub fn len(&self) -> usize {
        self.last - self.first
    }

    /// Returns `true` if no node was appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    /// Returns `true` if `node` lies in the range.
    #[inline]
    pub fn contains(&self, node: NodeIndex) -> bool {
        (self.first..self.last).contains(&node)
    }

    /// Iterates the indices in the range.
    pub fn iter(&self) -> std::ops::Range<NodeIndex> {
        self.first..self.last
    }
}
