//! Reverse sweep computing adjoints of input nodes.
//!
//! The sweep walks the arena from the highest seeded node down to zero. Each
//! operation node with a non-zero adjoint pushes `adjoint * partial` to its
//! inputs using the registry's gradient kernels. Values the kernels read must
//! still be in the value store, which is what
//! [`EvalOptions::keep_values_for_derivatives`](super::EvalOptions) arranges.

use crate::graph::{ComputationGraph, NodeIndex, NodeKind};
use crate::operand::RandomVariable;
use crate::ops::OperatorRegistry;

use super::error::{EvalError, EvalResult};
use super::store::ValueStore;

/// Adjoints of the input nodes after a backward sweep.
#[derive(Debug, Clone, Default)]
pub struct Adjoints {
    values: Vec<Option<RandomVariable>>,
}

impl Adjoints {
    /// Pathwise derivative of the seeded outputs with respect to `node`.
    #[inline]
    pub fn get(&self, node: NodeIndex) -> Option<&RandomVariable> {
        self.values.get(node).and_then(Option::as_ref)
    }

    /// Monte Carlo estimate of the derivative: adjoint averaged over paths.
    pub fn expectation(&self, node: NodeIndex) -> Option<f64> {
        self.get(node).map(RandomVariable::expectation)
    }

    /// Iterates `(node, adjoint)` for every input node reached by the sweep.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &RandomVariable)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}

/// Reverse-mode counterpart of [`ForwardEvaluator`](super::ForwardEvaluator).
///
/// # Example
///
/// ```rust
/// use pricer_graph::eval::{
///     BackwardEvaluator, EvalOptions, ForwardEvaluator, InputBindings, RetentionBitmap,
/// };
/// use pricer_graph::graph::{cg_mult, ComputationGraph, InputKind};
/// use pricer_graph::ops::OperatorRegistry;
/// use pricer_graph::RegressionConfig;
///
/// let mut g = ComputationGraph::new();
/// let x = g.insert_input(InputKind::Parameter, Some("x")).unwrap();
/// let y = g.insert_input(InputKind::Parameter, Some("y")).unwrap();
/// let f = cg_mult(&mut g, x, y).unwrap();
///
/// let mut bindings = InputBindings::new();
/// bindings.bind_scalar(x, 4, 3.0);
/// bindings.bind_scalar(y, 4, 5.0);
/// let retention = RetentionBitmap::from_nodes(g.size(), [f]).unwrap();
///
/// let registry = OperatorRegistry::new(4, RegressionConfig::default());
/// let options = EvalOptions {
///     keep_values_for_derivatives: true,
///     ..EvalOptions::default()
/// };
/// let forward = ForwardEvaluator::new(&registry)
///     .with_options(options)
///     .evaluate(&g, &bindings, &retention)
///     .unwrap();
///
/// let adjoints = BackwardEvaluator::new(&registry)
///     .evaluate(&g, &forward.store, &[f])
///     .unwrap();
/// assert_eq!(adjoints.expectation(x), Some(5.0));
/// assert_eq!(adjoints.expectation(y), Some(3.0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BackwardEvaluator<'r> {
    registry: &'r OperatorRegistry,
}

impl<'r> BackwardEvaluator<'r> {
    /// Creates a backward evaluator.
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Propagates a unit adjoint from every node in `seeds`.
    ///
    /// Adjoints of operation nodes are dropped once propagated; only input
    /// nodes (parameters, variates, constants) keep theirs.
    ///
    /// # Errors
    ///
    /// - [`EvalError::Graph`] if a seed lies outside the graph
    /// - [`EvalError::MissingValue`] if a value read by a gradient kernel was
    ///   not retained by the forward run
    pub fn evaluate(
        &self,
        graph: &ComputationGraph,
        values: &ValueStore,
        seeds: &[NodeIndex],
    ) -> EvalResult<Adjoints> {
        let paths = self.registry.path_count();
        let mut adjoints: Vec<Option<RandomVariable>> = vec![None; graph.size()];
        for &seed in seeds {
            graph.node(seed)?;
            accumulate(&mut adjoints[seed], &RandomVariable::new(paths, 1.0));
        }

        let top = seeds.iter().copied().max().map_or(0, |m| m + 1);
        let zero = RandomVariable::new(paths, 0.0);

        for i in (0..top).rev() {
            let node = &graph.nodes()[i];
            let op = match node.kind() {
                NodeKind::Operation(op) => op,
                NodeKind::Input(_) => continue,
            };
            let adjoint = match adjoints[i].take() {
                Some(a) => a,
                None => continue,
            };

            let req = self.registry.requirements(op);
            let args = node
                .args()
                .iter()
                .enumerate()
                .map(|(pos, &a)| {
                    if req.gradient_args.contains(pos) {
                        values.get(a).ok_or(EvalError::MissingValue { node: a, consumer: i })
                    } else {
                        Ok(&zero)
                    }
                })
                .collect::<EvalResult<Vec<&RandomVariable>>>()?;
            let value = if req.result_for_gradient {
                values.get(i).ok_or(EvalError::MissingValue { node: i, consumer: i })?
            } else {
                &zero
            };

            let partials = (self.registry.gradient(op))(&args, value);
            for (&a, partial) in node.args().iter().zip(partials.iter()) {
                accumulate(&mut adjoints[a], &(&adjoint * partial));
            }
        }

        Ok(Adjoints { values: adjoints })
    }
}

fn accumulate(slot: &mut Option<RandomVariable>, contribution: &RandomVariable) {
    match slot {
        Some(acc) => acc.zip_assign(contribution, |x, y| x + y),
        None => *slot = Some(contribution.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalOptions, ForwardEvaluator, InputBindings, RetentionBitmap};
    use crate::graph::InputKind;
    use crate::ops::OpKind;
    use crate::regression::RegressionConfig;

    #[test]
    fn test_product_rule() {
        // f = x * y + exp(x)
        let registry = OperatorRegistry::new(2, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let x = g.insert_input(InputKind::Parameter, Some("x")).unwrap();
        let y = g.insert_input(InputKind::Variable, Some("y")).unwrap();
        let xy = g.append(OpKind::Mult, &[x, y], None).unwrap();
        let ex = g.append(OpKind::Exp, &[x], None).unwrap();
        let f = g.append(OpKind::Add, &[xy, ex], None).unwrap();

        let mut b = InputBindings::new();
        b.bind_scalar(x, 2, 0.5);
        b.bind(y, RandomVariable::from_vec(vec![1.0, 3.0]));
        let retention = RetentionBitmap::from_nodes(g.size(), [f]).unwrap();
        let forward = ForwardEvaluator::new(&registry)
            .with_options(EvalOptions {
                keep_values_for_derivatives: true,
                ..EvalOptions::default()
            })
            .evaluate(&g, &b, &retention)
            .unwrap();

        let adj = BackwardEvaluator::new(&registry)
            .evaluate(&g, &forward.store, &[f])
            .unwrap();
        let dx = adj.get(x).unwrap();
        assert!((dx.at(0) - (1.0 + 0.5f64.exp())).abs() < 1e-12);
        assert!((dx.at(1) - (3.0 + 0.5f64.exp())).abs() < 1e-12);
        assert!((adj.get(y).unwrap().at(1) - 0.5).abs() < 1e-12);
        assert!(adj.get(xy).is_none());
    }

    #[test]
    fn test_missing_value_reported() {
        let registry = OperatorRegistry::new(1, RegressionConfig::default());
        let mut g = ComputationGraph::new();
        let x = g.insert_input(InputKind::Parameter, None).unwrap();
        let l = g.append(OpKind::Log, &[x], None).unwrap();
        let err = BackwardEvaluator::new(&registry)
            .evaluate(&g, &ValueStore::with_size(g.size()), &[l])
            .unwrap_err();
        assert_eq!(err, EvalError::MissingValue { node: x, consumer: l });
    }
}
