//! # Evaluation
//!
//! Forward and backward passes over a [`ComputationGraph`](crate::graph::ComputationGraph).
//!
//! The forward walk is sequential in node order; the work inside one node is
//! parallel across paths. Memory is bounded by the live frontier of the walk:
//! each value is dropped right after its last consumer unless the
//! [`RetentionBitmap`] marks it.
//!
//! Cancellation is cooperative and checked between nodes. A cancelled run
//! reports [`EvalStatus::Cancelled`] and discards every value.

mod backward;
mod cancel;
mod error;
mod forward;
mod observer;
mod retention;
mod store;

pub use backward::{Adjoints, BackwardEvaluator};
pub use cancel::CancellationToken;
pub use error::{EvalError, EvalResult};
pub use forward::{EvalOptions, EvalStats, EvalStatus, Evaluation, ForwardEvaluator, NumericPolicy};
pub use observer::{EvalEvent, EvaluationObserver, NoopObserver, RecordingObserver};
pub use retention::RetentionBitmap;
pub use store::{InputBindings, ValueStore};
