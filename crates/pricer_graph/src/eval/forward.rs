//! Forward evaluator with last-use reclamation.

use crate::graph::{ComputationGraph, Node, NodeIndex, NodeKind};
use crate::operand::RandomVariable;
use crate::ops::{InputAccess, OpKind, OperatorRegistry};

use super::cancel::CancellationToken;
use super::error::{EvalError, EvalResult};
use super::observer::{EvaluationObserver, NoopObserver};
use super::retention::RetentionBitmap;
use super::store::{InputBindings, ValueStore};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Treatment of non-finite operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NumericPolicy {
    /// Keep `NaN`/`inf` in the value and carry on
    #[default]
    Sentinel,
    /// Fail with [`EvalError::NumericDomainViolation`]
    Fatal,
}

/// Evaluator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalOptions {
    /// Non-finite result handling
    pub numeric_policy: NumericPolicy,
    /// Also retain every value a later backward pass reads
    pub keep_values_for_derivatives: bool,
}

/// How a forward run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    /// Every node was evaluated
    Completed,
    /// Stopped at a node boundary; `evaluated` nodes had run
    Cancelled {
        /// Number of nodes processed before the stop
        evaluated: usize,
    },
}

/// Counters collected during a forward run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalStats {
    /// Nodes processed
    pub nodes_evaluated: usize,
    /// Values released before the end of the run
    pub values_reclaimed: usize,
    /// Largest number of values alive at once
    pub peak_live_values: usize,
}

/// Result of a forward run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Completion status
    pub status: EvalStatus,
    /// Retained values; empty when cancelled
    pub store: ValueStore,
    /// Run counters
    pub stats: EvalStats,
}

impl Evaluation {
    /// Returns `true` if the run completed.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == EvalStatus::Completed
    }

    /// Returns `true` if the run was cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, EvalStatus::Cancelled { .. })
    }

    /// Retained value of `node`.
    #[inline]
    pub fn value(&self, node: NodeIndex) -> Option<&RandomVariable> {
        self.store.get(node)
    }
}

/// First and last consumer of every node.
struct Liveness {
    first: Vec<Option<NodeIndex>>,
    last: Vec<Option<NodeIndex>>,
}

impl Liveness {
    fn analyse(nodes: &[Node]) -> Self {
        let mut first = vec![None; nodes.len()];
        let mut last = vec![None; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for &a in node.args() {
                if first[a].is_none() {
                    first[a] = Some(i);
                }
                last[a] = Some(i);
            }
        }
        Self { first, last }
    }
}

/// Working value slots plus bookkeeping.
struct Slots<'o> {
    values: Vec<Option<RandomVariable>>,
    live: usize,
    stats: EvalStats,
    observer: &'o mut dyn EvaluationObserver,
}

impl<'o> Slots<'o> {
    fn new(size: usize, observer: &'o mut dyn EvaluationObserver) -> Self {
        Self {
            values: vec![None; size],
            live: 0,
            stats: EvalStats::default(),
            observer,
        }
    }

    fn get(&self, node: NodeIndex, consumer: NodeIndex) -> EvalResult<&RandomVariable> {
        self.values[node]
            .as_ref()
            .ok_or(EvalError::MissingValue { node, consumer })
    }

    fn gather(&self, consumer: NodeIndex, args: &[NodeIndex]) -> EvalResult<Vec<&RandomVariable>> {
        args.iter().map(|&a| self.get(a, consumer)).collect()
    }

    fn store(&mut self, node: NodeIndex, value: RandomVariable) {
        self.values[node] = Some(value);
        self.live += 1;
        self.stats.peak_live_values = self.stats.peak_live_values.max(self.live);
        self.mark_evaluated(node);
    }

    fn mark_evaluated(&mut self, node: NodeIndex) {
        self.stats.nodes_evaluated += 1;
        self.observer.on_evaluated(node);
    }

    /// Removes the value of `node`, recording the release.
    fn take(&mut self, node: NodeIndex) -> Option<RandomVariable> {
        let value = self.values[node].take()?;
        self.live -= 1;
        self.stats.values_reclaimed += 1;
        self.observer.on_reclaimed(node);
        Some(value)
    }

    fn release(&mut self, node: NodeIndex) {
        let _ = self.take(node);
    }
}

/// Executes a graph once, front to back.
///
/// A value is released right after its last consumer has run unless the
/// retention bitmap (or, with `keep_values_for_derivatives`, the gradient
/// requirements) says otherwise. Nodes nobody consumes and nobody retains are
/// released as soon as they are computed.
///
/// # Example
///
/// ```rust
/// use pricer_graph::eval::{ForwardEvaluator, InputBindings, RetentionBitmap};
/// use pricer_graph::graph::ComputationGraph;
/// use pricer_graph::ops::{OpKind, OperatorRegistry};
/// use pricer_graph::RegressionConfig;
///
/// let mut g = ComputationGraph::new();
/// let a = g.constant(2.0);
/// let b = g.constant(3.0);
/// let sum = g.append(OpKind::Add, &[a, b], None).unwrap();
///
/// let mut bindings = InputBindings::new();
/// for (node, value) in g.constants() {
///     bindings.bind_scalar(node, 8, value);
/// }
/// let retention = RetentionBitmap::from_nodes(g.size(), [sum]).unwrap();
///
/// let registry = OperatorRegistry::new(8, RegressionConfig::default());
/// let result = ForwardEvaluator::new(&registry)
///     .evaluate(&g, &bindings, &retention)
///     .unwrap();
/// assert_eq!(result.value(sum).unwrap().at(7), 5.0);
/// assert!(result.value(a).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ForwardEvaluator<'r> {
    registry: &'r OperatorRegistry,
    options: EvalOptions,
    cancellation: Option<CancellationToken>,
}

impl<'r> ForwardEvaluator<'r> {
    /// Evaluator with default options and no cancellation.
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Self {
            registry,
            options: EvalOptions::default(),
            cancellation: None,
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks `token` before every node.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Options in use.
    #[inline]
    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Runs the graph.
    pub fn evaluate(
        &self,
        graph: &ComputationGraph,
        bindings: &InputBindings,
        retention: &RetentionBitmap,
    ) -> EvalResult<Evaluation> {
        self.evaluate_observed(graph, bindings, retention, &mut NoopObserver)
    }

    /// Runs the graph, reporting every evaluation and release to `observer`.
    ///
    /// # Errors
    ///
    /// - [`EvalError::RetentionSize`] if the bitmap does not match the graph
    /// - [`EvalError::UnboundInput`] if a needed input has no binding
    /// - [`EvalError::SizeMismatch`] if a binding has the wrong path count
    /// - [`EvalError::NumericDomainViolation`] under [`NumericPolicy::Fatal`]
    pub fn evaluate_observed(
        &self,
        graph: &ComputationGraph,
        bindings: &InputBindings,
        retention: &RetentionBitmap,
        observer: &mut dyn EvaluationObserver,
    ) -> EvalResult<Evaluation> {
        let size = graph.size();
        if retention.len() != size {
            return Err(EvalError::RetentionSize {
                expected: size,
                actual: retention.len(),
            });
        }

        let nodes = graph.nodes();
        let uses = Liveness::analyse(nodes);
        let keep = self.keep_flags(nodes, retention);
        let paths = self.registry.path_count();
        let mut slots = Slots::new(size, observer);

        for (i, node) in nodes.iter().enumerate() {
            if self.is_cancelled() {
                return Ok(Evaluation {
                    status: EvalStatus::Cancelled { evaluated: i },
                    store: ValueStore::default(),
                    stats: slots.stats,
                });
            }

            let needed = keep[i] || uses.last[i].is_some();
            match node.kind() {
                NodeKind::Input(_) => {
                    if !needed {
                        slots.mark_evaluated(i);
                        continue;
                    }
                    let value = bindings.get(i).ok_or_else(|| EvalError::UnboundInput {
                        node: i,
                        label: node.label().map(str::to_string),
                        consumer: uses.first[i],
                    })?;
                    if value.size() != paths {
                        return Err(EvalError::SizeMismatch {
                            node: i,
                            expected: paths,
                            actual: value.size(),
                        });
                    }
                    slots.store(i, value.clone());
                }
                NodeKind::Operation(op) => {
                    let value = match (self.registry.requirements(op).access, fold_kernel(op)) {
                        (InputAccess::Streaming, Some(kernel)) => {
                            fold_streaming(i, node.args(), kernel, &uses, &keep, &mut slots)?
                        }
                        _ => {
                            let args = slots.gather(i, node.args())?;
                            self.registry.apply(op, &args)
                        }
                    };
                    if self.options.numeric_policy == NumericPolicy::Fatal && !value.is_finite() {
                        return Err(EvalError::NumericDomainViolation {
                            node: i,
                            label: node.label().map(str::to_string),
                        });
                    }
                    slots.store(i, value);
                    for &a in node.args() {
                        if uses.last[a] == Some(i) && !keep[a] {
                            slots.release(a);
                        }
                    }
                }
            }

            if !needed {
                slots.release(i);
            }
        }

        Ok(Evaluation {
            status: EvalStatus::Completed,
            store: ValueStore::from_slots(slots.values),
            stats: slots.stats,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn keep_flags(&self, nodes: &[Node], retention: &RetentionBitmap) -> Vec<bool> {
        let mut keep: Vec<bool> = (0..nodes.len()).map(|i| retention.is_retained(i)).collect();
        if self.options.keep_values_for_derivatives {
            for (i, node) in nodes.iter().enumerate() {
                if let Some(op) = node.op() {
                    let req = self.registry.requirements(op);
                    for (pos, &a) in node.args().iter().enumerate() {
                        if req.gradient_args.contains(pos) {
                            keep[a] = true;
                        }
                    }
                    if req.result_for_gradient {
                        keep[i] = true;
                    }
                }
            }
        }
        keep
    }
}

/// Binary kernel of the streaming operators.
fn fold_kernel(op: OpKind) -> Option<fn(f64, f64) -> f64> {
    match op {
        OpKind::Add => Some(|x, y| x + y),
        OpKind::Mult => Some(|x, y| x * y),
        _ => None,
    }
}

/// Folds the inputs of a streaming node one at a time.
///
/// The buffer of the first input is recycled when this node is its last
/// consumer; every other input is released right after it is folded in.
fn fold_streaming(
    node: NodeIndex,
    args: &[NodeIndex],
    kernel: fn(f64, f64) -> f64,
    uses: &Liveness,
    keep: &[bool],
    slots: &mut Slots<'_>,
) -> EvalResult<RandomVariable> {
    let expiring = |a: NodeIndex, rest: &[NodeIndex]| uses.last[a] == Some(node) && !keep[a] && !rest.contains(&a);

    let first = args[0];
    let mut acc = if expiring(first, &args[1..]) {
        slots
            .take(first)
            .ok_or(EvalError::MissingValue { node: first, consumer: node })?
    } else {
        slots.get(first, node)?.clone()
    };

    for (pos, &a) in args.iter().enumerate().skip(1) {
        acc.zip_assign(slots.get(a, node)?, kernel);
        if expiring(a, &args[pos + 1..]) {
            slots.release(a);
        }
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::RecordingObserver;
    use crate::graph::InputKind;
    use crate::regression::RegressionConfig;

    fn bind_constants(g: &ComputationGraph, paths: usize) -> InputBindings {
        let mut b = InputBindings::new();
        for (node, value) in g.constants() {
            b.bind_scalar(node, paths, value);
        }
        b
    }

    #[test]
    fn test_streaming_add_recycles_first_buffer() {
        let registry = OperatorRegistry::new(3, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let x = g.insert_input(InputKind::RandomVariate, None).unwrap();
        let e = g.append(OpKind::Exp, &[x], None).unwrap();
        let one = g.constant(1.0);
        let s = g.append(OpKind::Add, &[e, one, x], None).unwrap();

        let mut b = bind_constants(&g, 3);
        b.bind(x, RandomVariable::from_vec(vec![0.0, 1.0, 2.0]));
        let retention = RetentionBitmap::from_nodes(g.size(), [s]).unwrap();
        let mut recorder = RecordingObserver::new();
        let result = ForwardEvaluator::new(&registry)
            .evaluate_observed(&g, &b, &retention, &mut recorder)
            .unwrap();

        let v = result.value(s).unwrap();
        for i in 0..3 {
            let x = i as f64;
            assert!((v.at(i) - (x.exp() + 1.0 + x)).abs() < 1e-12);
        }
        assert_eq!(result.store.len(), 1);
        assert!(recorder.was_reclaimed(e));
        assert!(recorder.was_reclaimed(x));
        assert_eq!(result.stats.nodes_evaluated, 4);
    }

    #[test]
    fn test_repeated_argument_is_not_released_early() {
        let registry = OperatorRegistry::new(2, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let x = g.insert_input(InputKind::Variable, None).unwrap();
        let sq = g.append(OpKind::Mult, &[x, x, x], None).unwrap();

        let mut b = InputBindings::new();
        b.bind(x, RandomVariable::from_vec(vec![2.0, 3.0]));
        let retention = RetentionBitmap::from_nodes(g.size(), [sq]).unwrap();
        let result = ForwardEvaluator::new(&registry).evaluate(&g, &b, &retention).unwrap();
        assert_eq!(result.value(sq).unwrap().to_vec(), vec![8.0, 27.0]);
    }

    #[test]
    fn test_dead_nodes_released_immediately() {
        let registry = OperatorRegistry::new(2, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let a = g.constant(4.0);
        let dead = g.append(OpKind::Sqrt, &[a], None).unwrap();
        let out = g.append(OpKind::Log, &[a], None).unwrap();

        let b = bind_constants(&g, 2);
        let retention = RetentionBitmap::from_nodes(g.size(), [out]).unwrap();
        let mut recorder = RecordingObserver::new();
        let result = ForwardEvaluator::new(&registry)
            .evaluate_observed(&g, &b, &retention, &mut recorder)
            .unwrap();

        assert!(recorder.was_reclaimed(dead));
        assert!(result.value(dead).is_none());
        assert_eq!(result.stats.peak_live_values, 2);
    }

    #[test]
    fn test_keep_values_for_derivatives() {
        let registry = OperatorRegistry::new(2, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let x = g.insert_input(InputKind::Parameter, None).unwrap();
        let e = g.append(OpKind::Exp, &[x], None).unwrap();
        let l = g.append(OpKind::Log, &[e], None).unwrap();

        let mut b = InputBindings::new();
        b.bind_scalar(x, 2, 0.5);
        let retention = RetentionBitmap::from_nodes(g.size(), [l]).unwrap();
        let options = EvalOptions {
            keep_values_for_derivatives: true,
            ..EvalOptions::default()
        };
        let result = ForwardEvaluator::new(&registry)
            .with_options(options)
            .evaluate(&g, &b, &retention)
            .unwrap();
        // exp keeps its result, log keeps its argument
        assert!(result.value(e).is_some());
        assert!(result.value(x).is_none());
    }

    #[test]
    fn test_binding_size_mismatch() {
        let registry = OperatorRegistry::new(4, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let x = g.insert_input(InputKind::Variable, None).unwrap();
        let y = g.append(OpKind::Abs, &[x], None).unwrap();
        let mut b = InputBindings::new();
        b.bind(x, RandomVariable::from_vec(vec![1.0, 2.0]));
        let retention = RetentionBitmap::from_nodes(g.size(), [y]).unwrap();
        let err = ForwardEvaluator::new(&registry).evaluate(&g, &b, &retention).unwrap_err();
        assert_eq!(
            err,
            EvalError::SizeMismatch {
                node: x,
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn test_retention_size_checked() {
        let registry = OperatorRegistry::new(1, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        g.constant(1.0);
        let err = ForwardEvaluator::new(&registry)
            .evaluate(&g, &InputBindings::new(), &RetentionBitmap::new(3))
            .unwrap_err();
        assert!(matches!(err, EvalError::RetentionSize { expected: 1, actual: 3 }));
    }
}
