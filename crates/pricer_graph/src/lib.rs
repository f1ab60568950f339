//! # pricer_graph: Vectorised Computation Graph Kernel (Layer 1)
//!
//! Path-vectorised values and the computation graph that combines them. A
//! model and any number of trades append nodes to one shared graph; the
//! graph is then executed once over all Monte Carlo paths.
//!
//! ## Modules
//!
//! - [`operand`]: [`RandomVariable`], one scalar per path with a broadcast
//!   representation for deterministic values
//! - [`graph`]: append-only node arena, constant pool, labels and builders
//! - [`ops`]: operator kinds and the [`OperatorRegistry`](ops::OperatorRegistry)
//! - [`regression`]: least-squares conditional expectation
//! - [`eval`]: forward evaluator with retention-controlled reclamation and
//!   the backward (adjoint) evaluator
//! - [`math`]: normal distribution helpers
//!
//! ## Example
//!
//! ```rust
//! use pricer_graph::eval::{ForwardEvaluator, InputBindings, RetentionBitmap};
//! use pricer_graph::graph::{cg_max, cg_sub, ComputationGraph, InputKind};
//! use pricer_graph::ops::OperatorRegistry;
//! use pricer_graph::{RandomVariable, RegressionConfig};
//!
//! let mut g = ComputationGraph::new();
//! let x = g.insert_input(InputKind::RandomVariate, Some("x")).unwrap();
//! let strike = g.constant(1.0);
//! let zero = g.constant(0.0);
//! let intrinsic = cg_sub(&mut g, x, strike).unwrap();
//! let payoff = cg_max(&mut g, intrinsic, zero).unwrap();
//!
//! let mut bindings = InputBindings::new();
//! bindings.bind(x, RandomVariable::from_vec(vec![0.5, 1.5, 2.0, 0.9]));
//! for (node, value) in g.constants() {
//!     bindings.bind_scalar(node, 4, value);
//! }
//!
//! let registry = OperatorRegistry::new(4, RegressionConfig::default());
//! let retention = RetentionBitmap::from_nodes(g.size(), [payoff]).unwrap();
//! let result = ForwardEvaluator::new(&registry)
//!     .evaluate(&g, &bindings, &retention)
//!     .unwrap();
//! assert_eq!(result.value(payoff).unwrap().to_vec(), vec![0.0, 0.5, 1.0, 0.0]);
//! ```

#![warn(missing_docs)]

pub mod eval;
pub mod graph;
pub mod math;
pub mod operand;
pub mod ops;
pub mod regression;

pub use graph::{ComputationGraph, GraphError, NodeIndex, NodeRange};
pub use operand::RandomVariable;
pub use regression::{BasisSystem, RegressionConfig};
