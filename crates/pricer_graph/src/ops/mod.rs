//! # Operator Registry
//!
//! Closed, versioned set of operator kinds and the table that maps each kind
//! to its forward kernel, gradient kernel and node requirements.
//!
//! Kernels are pure and deterministic. Numeric edge cases produce IEEE
//! sentinels (`inf`, `NaN`) rather than errors so that one bad path never
//! aborts a whole batch; the evaluator decides whether a non-finite value is
//! fatal.

mod functions;
mod kind;
mod registry;

pub use kind::{Arity, OpKind, OPSET_VERSION};
pub use registry::{
    requirements, ForwardFn, GradientArgs, GradientFn, InputAccess, NodeRequirements, OperatorRegistry,
};
