//! # Computation Graph
//!
//! Append-only arena of nodes addressed by index. A node may only reference
//! nodes with a smaller index, so index order is always a valid topological
//! order and the evaluator can walk the arena front to back.
//!
//! The graph owns structure only: node kinds, input indices and labels.
//! Values live in the evaluator's value store.
//!
//! ## Labels and prefixes
//!
//! Labels are global. [`ComputationGraph::set_prefix`] prepends a scope to
//! every label created afterwards, which lets several trades use the same
//! local names (`"npv_0"`, `"npv_1"`, ...) inside one shared graph.
//!
//! # Example
//!
//! ```rust
//! use pricer_graph::graph::{ComputationGraph, InputKind};
//! use pricer_graph::ops::OpKind;
//!
//! let mut g = ComputationGraph::new();
//! let x = g.insert_input(InputKind::Variable, Some("x")).unwrap();
//! let two = g.constant(2.0);
//!
//! g.set_prefix("T1_");
//! let y = g.append(OpKind::Mult, &[x, two], Some("y")).unwrap();
//!
//! assert_eq!(g.size(), 3);
//! assert_eq!(g.node_index("T1_y").unwrap(), y);
//! assert!(g.append(OpKind::Exp, &[7], None).is_err());
//! ```

mod cg;
mod error;
mod node;

pub use cg::*;
pub use error::{GraphError, GraphResult};
pub use node::{InputKind, Node, NodeIndex, NodeKind, NodeRange};

use crate::ops::OpKind;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Append-only DAG of vectorised operations.
#[derive(Debug, Clone, Default)]
pub struct ComputationGraph {
    nodes: Vec<Node>,
    labels: HashMap<String, NodeIndex>,
    constant_pool: HashMap<u64, NodeIndex>,
    constants: Vec<(NodeIndex, f64)>,
    prefix: String,
}

impl ComputationGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at `index`.
    pub fn node(&self, index: NodeIndex) -> GraphResult<&Node> {
        self.nodes.get(index).ok_or(GraphError::UnknownNode {
            node: index,
            size: self.nodes.len(),
        })
    }

    /// All nodes in evaluation order.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Appends an operation node and returns its index.
    ///
    /// # Errors
    ///
    /// - [`GraphError::ForwardReference`] if an input is not yet defined
    /// - [`GraphError::Arity`] if the input count does not fit `op`
    /// - [`GraphError::DuplicateLabel`] if the prefixed label is taken
    pub fn append(
        &mut self,
        op: OpKind,
        inputs: &[NodeIndex],
        label: Option<&str>,
    ) -> GraphResult<NodeIndex> {
        let index = self.nodes.len();
        if let Some(&input) = inputs.iter().find(|&&i| i >= index) {
            return Err(GraphError::ForwardReference {
                node: index,
                op,
                input,
            });
        }
        let arity = op.arity();
        if !arity.accepts(inputs.len()) {
            return Err(GraphError::Arity {
                op,
                expected: arity,
                actual: inputs.len(),
            });
        }
        self.push(NodeKind::Operation(op), inputs.to_vec(), label)
    }

    /// Appends an input node whose value is bound before evaluation.
    ///
    /// Literals should go through [`constant`](Self::constant) so that they
    /// are pooled and bound automatically.
    pub fn insert_input(&mut self, kind: InputKind, label: Option<&str>) -> GraphResult<NodeIndex> {
        self.push(NodeKind::Input(kind), Vec::new(), label)
    }

    /// Returns the node holding `value`, creating it on first use.
    ///
    /// Literals are keyed by bit pattern, so `0.0` and `-0.0` are distinct.
    pub fn constant(&mut self, value: f64) -> NodeIndex {
        let key = value.to_bits();
        if let Some(&index) = self.constant_pool.get(&key) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Input(InputKind::Constant),
            args: Vec::new(),
            label: None,
        });
        self.constant_pool.insert(key, index);
        self.constants.push((index, value));
        index
    }

    /// Pooled constants as `(node, value)` in creation order.
    pub fn constants(&self) -> impl Iterator<Item = (NodeIndex, f64)> + '_ {
        self.constants.iter().copied()
    }

    /// Sets the prefix applied to labels created from now on.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    /// Removes the label prefix.
    pub fn clear_prefix(&mut self) {
        self.prefix.clear();
    }

    /// Current label prefix.
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Gives an existing node an additional (prefixed) name.
    pub fn register_label(&mut self, label: &str, node: NodeIndex) -> GraphResult<()> {
        if node >= self.nodes.len() {
            return Err(GraphError::UnknownNode {
                node,
                size: self.nodes.len(),
            });
        }
        let full = self.prefixed(label);
        self.claim_label(full, node)
    }

    /// Looks a node up by its full label.
    pub fn node_index(&self, label: &str) -> GraphResult<NodeIndex> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| GraphError::NotFound(label.to_string()))
    }

    /// Range of nodes appended since `first`.
    #[inline]
    pub fn range_since(&self, first: NodeIndex) -> NodeRange {
        NodeRange::new(first, self.nodes.len())
    }

    /// Re-checks that every node only references earlier nodes.
    pub fn validate(&self) -> GraphResult<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(&input) = node.args.iter().find(|&&i| i >= index) {
                return Err(GraphError::ForwardReference {
                    node: index,
                    op: node.op().unwrap_or(OpKind::Add),
                    input,
                });
            }
            if let Some(op) = node.op() {
                if !op.arity().accepts(node.args.len()) {
                    return Err(GraphError::Arity {
                        op,
                        expected: op.arity(),
                        actual: node.args.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Textual single-assignment dump of the whole graph.
    pub fn ssa_form(&self) -> String {
        self.ssa_form_range(NodeRange::new(0, self.nodes.len()))
    }

    /// Textual single-assignment dump of the nodes in `range`.
    ///
    /// One line per node: `v7 = mult(v3, v5) ; T1_y`.
    pub fn ssa_form_range(&self, range: NodeRange) -> String {
        let constant_values: HashMap<NodeIndex, f64> = self.constants.iter().copied().collect();
        let mut out = String::new();
        for index in range.iter().take_while(|&i| i < self.nodes.len()) {
            let node = &self.nodes[index];
            let _ = write!(out, "v{} = ", index);
            match node.kind {
                NodeKind::Input(InputKind::Constant) => match constant_values.get(&index) {
                    Some(v) => {
                        let _ = write!(out, "const {}", v);
                    }
                    None => out.push_str("const ?"),
                },
                NodeKind::Input(kind) => out.push_str(kind.name()),
                NodeKind::Operation(op) => {
                    let args: Vec<String> = node.args.iter().map(|a| format!("v{}", a)).collect();
                    let _ = write!(out, "{}({})", op.name(), args.join(", "));
                }
            }
            if let Some(label) = &node.label {
                let _ = write!(out, " ; {}", label);
            }
            out.push('\n');
        }
        out
    }

    fn prefixed(&self, label: &str) -> String {
        format!("{}{}", self.prefix, label)
    }

    fn claim_label(&mut self, label: String, node: NodeIndex) -> GraphResult<()> {
        if let Some(&existing) = self.labels.get(&label) {
            return Err(GraphError::DuplicateLabel { label, existing });
        }
        self.labels.insert(label, node);
        Ok(())
    }

    fn push(&mut self, kind: NodeKind, args: Vec<NodeIndex>, label: Option<&str>) -> GraphResult<NodeIndex> {
        let index = self.nodes.len();
        let label = match label {
            Some(l) => {
                let full = self.prefixed(l);
                self.claim_label(full.clone(), index)?;
                Some(full)
            }
            None => None,
        };
        self.nodes.push(Node { kind, args, label });
        Ok(index)
    }
}
