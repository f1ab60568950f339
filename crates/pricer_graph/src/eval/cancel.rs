//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked by long-running work between units of work.
///
/// Clones share the same flag, so a token handed to the evaluator can be
/// cancelled from another thread.
///
/// # Example
///
/// ```rust
/// use pricer_graph::eval::{
///     CancellationToken, EvalStatus, ForwardEvaluator, InputBindings, RetentionBitmap,
/// };
/// use pricer_graph::graph::{cg_add, ComputationGraph};
/// use pricer_graph::ops::OperatorRegistry;
/// use pricer_graph::RegressionConfig;
///
/// let mut g = ComputationGraph::new();
/// let a = g.constant(1.0);
/// let sum = cg_add(&mut g, a, a).unwrap();
/// let mut bindings = InputBindings::new();
/// bindings.bind_scalar(a, 2, 1.0);
/// let retention = RetentionBitmap::from_nodes(g.size(), [sum]).unwrap();
///
/// let token = CancellationToken::new();
/// token.clone().cancel();
///
/// let registry = OperatorRegistry::new(2, RegressionConfig::default());
/// let result = ForwardEvaluator::new(&registry)
///     .with_cancellation(token)
///     .evaluate(&g, &bindings, &retention)
///     .unwrap();
/// assert_eq!(result.status, EvalStatus::Cancelled { evaluated: 0 });
/// assert!(result.store.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
