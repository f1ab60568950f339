//! Hooks into the forward walk.

use crate::graph::NodeIndex;

/// Callbacks invoked by the forward evaluator.
pub trait EvaluationObserver {
    /// A node's value has been computed (or loaded from its binding).
    fn on_evaluated(&mut self, _node: NodeIndex) {}

    /// A node's value has been released.
    fn on_reclaimed(&mut self, _node: NodeIndex) {}
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EvaluationObserver for NoopObserver {}

/// Event recorded by [`RecordingObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalEvent {
    /// Node value computed
    Evaluated(NodeIndex),
    /// Node value released
    Reclaimed(NodeIndex),
}

/// Observer that records every event in order.
///
/// # Example
///
/// ```rust
/// use pricer_graph::eval::{ForwardEvaluator, InputBindings, RecordingObserver, RetentionBitmap};
/// use pricer_graph::graph::{cg_exp, cg_mult, ComputationGraph};
/// use pricer_graph::ops::OperatorRegistry;
/// use pricer_graph::RegressionConfig;
///
/// let mut g = ComputationGraph::new();
/// let a = g.constant(2.0);
/// let e = cg_exp(&mut g, a).unwrap();
/// let out = cg_mult(&mut g, e, e).unwrap();
/// let mut bindings = InputBindings::new();
/// bindings.bind_scalar(a, 2, 2.0);
/// let retention = RetentionBitmap::from_nodes(g.size(), [out]).unwrap();
///
/// let registry = OperatorRegistry::new(2, RegressionConfig::default());
/// let mut recorder = RecordingObserver::new();
/// ForwardEvaluator::new(&registry)
///     .evaluate_observed(&g, &bindings, &retention, &mut recorder)
///     .unwrap();
/// assert_eq!(recorder.evaluated(), vec![a, e, out]);
/// // intermediates go as soon as their last consumer has run
/// assert!(recorder.was_reclaimed(a));
/// assert!(recorder.was_reclaimed(e));
/// assert!(!recorder.was_reclaimed(out));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    /// Events in the order they happened
    pub events: Vec<EvalEvent>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluated nodes in order.
    pub fn evaluated(&self) -> Vec<NodeIndex> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EvalEvent::Evaluated(n) => Some(*n),
                EvalEvent::Reclaimed(_) => None,
            })
            .collect()
    }

    /// Reclaimed nodes in order.
    pub fn reclaimed(&self) -> Vec<NodeIndex> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EvalEvent::Reclaimed(n) => Some(*n),
                EvalEvent::Evaluated(_) => None,
            })
            .collect()
    }

    /// Returns `true` if `node` was released.
    pub fn was_reclaimed(&self, node: NodeIndex) -> bool {
        self.events.contains(&EvalEvent::Reclaimed(node))
    }
}

impl EvaluationObserver for RecordingObserver {
    fn on_evaluated(&mut self, node: NodeIndex) {
        self.events.push(EvalEvent::Evaluated(node));
    }

    fn on_reclaimed(&mut self, node: NodeIndex) {
        self.events.push(EvalEvent::Reclaimed(node));
    }
}
