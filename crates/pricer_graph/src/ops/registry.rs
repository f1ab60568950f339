//! Operator registry: forward function, gradient function and node
//! requirements per [`OpKind`].

use std::collections::BTreeMap;
use std::sync::Arc;

use super::functions;
use super::OpKind;
use crate::operand::RandomVariable;
use crate::regression::RegressionConfig;

/// Forward kernel: input values in node order to node value.
pub type ForwardFn = Arc<dyn Fn(&[&RandomVariable]) -> RandomVariable + Send + Sync>;

/// Gradient kernel: input values and node value to one partial per input.
pub type GradientFn = Arc<dyn Fn(&[&RandomVariable], &RandomVariable) -> Vec<RandomVariable> + Send + Sync>;

/// How an operator consumes its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAccess {
    /// Inputs may be folded one at a time; each can be released as soon as
    /// it has been folded in.
    Streaming,
    /// Every input must be live when the kernel runs.
    Simultaneous,
}

/// Inputs the gradient kernel reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientArgs {
    /// Gradient does not depend on input values
    None,
    /// Every input value
    All,
    /// Only the listed input positions
    Only(&'static [usize]),
}

impl GradientArgs {
    /// Returns `true` if input position `i` is read.
    #[inline]
    pub fn contains(self, i: usize) -> bool {
        match self {
            GradientArgs::None => false,
            GradientArgs::All => true,
            GradientArgs::Only(positions) => positions.contains(&i),
        }
    }
}

/// Scheduling and retention needs of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRequirements {
    /// Input access pattern of the forward kernel
    pub access: InputAccess,
    /// Inputs read by the gradient kernel
    pub gradient_args: GradientArgs,
    /// Whether the gradient kernel reads the node's own value
    pub result_for_gradient: bool,
}

impl NodeRequirements {
    const fn new(access: InputAccess, gradient_args: GradientArgs, result_for_gradient: bool) -> Self {
        Self {
            access,
            gradient_args,
            result_for_gradient,
        }
    }
}

/// Requirements of `op`.
pub fn requirements(op: OpKind) -> NodeRequirements {
    use GradientArgs as G;
    use InputAccess::{Simultaneous, Streaming};
    match op {
        OpKind::Add => NodeRequirements::new(Streaming, G::None, false),
        OpKind::Mult => NodeRequirements::new(Streaming, G::All, false),
        OpKind::Subtract | OpKind::Negative => NodeRequirements::new(Simultaneous, G::None, false),
        OpKind::Div => NodeRequirements::new(Simultaneous, G::Only(&[1]), true),
        OpKind::ConditionalExpectation => NodeRequirements::new(Simultaneous, G::None, false),
        OpKind::IndicatorEq | OpKind::IndicatorGt | OpKind::IndicatorGeq => {
            NodeRequirements::new(Simultaneous, G::None, false)
        }
        OpKind::Min | OpKind::Max | OpKind::Abs | OpKind::Log | OpKind::NormalCdf => {
            NodeRequirements::new(Simultaneous, G::All, false)
        }
        OpKind::Exp | OpKind::Sqrt => NodeRequirements::new(Simultaneous, G::None, true),
        OpKind::Pow | OpKind::NormalPdf => NodeRequirements::new(Simultaneous, G::All, true),
        OpKind::Select => NodeRequirements::new(Simultaneous, G::Only(&[0]), false),
    }
}

struct OperatorEntry {
    forward: ForwardFn,
    gradient: GradientFn,
    requirements: NodeRequirements,
}

/// Table of operator implementations for one engine run.
///
/// Built once by the orchestrator and passed by reference to the evaluators.
/// Kernels capture the regression settings, so two registries with different
/// settings can coexist.
///
/// # Example
///
/// ```rust
/// use pricer_graph::ops::{OpKind, OperatorRegistry};
/// use pricer_graph::{RandomVariable, RegressionConfig};
///
/// let registry = OperatorRegistry::new(2, RegressionConfig::default());
/// let a = RandomVariable::new(2, 2.0);
/// let b = RandomVariable::from_vec(vec![1.0, 3.0]);
/// let sum = registry.apply(OpKind::Add, &[&a, &b]);
/// assert_eq!(sum.to_vec(), vec![3.0, 5.0]);
/// ```
pub struct OperatorRegistry {
    path_count: usize,
    regression: RegressionConfig,
    entries: BTreeMap<OpKind, OperatorEntry>,
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("path_count", &self.path_count)
            .field("regression", &self.regression)
            .field("operators", &self.entries.len())
            .finish()
    }
}

impl OperatorRegistry {
    /// Builds the registry for operands of `path_count` paths.
    pub fn new(path_count: usize, regression: RegressionConfig) -> Self {
        let entries = OpKind::ALL
            .iter()
            .map(|&op| {
                let forward: ForwardFn = Arc::new(move |args: &[&RandomVariable]| functions::forward(op, args, &regression));
                let gradient: GradientFn = Arc::new(move |args: &[&RandomVariable], value: &RandomVariable| {
                    functions::gradient(op, args, value)
                });
                (
                    op,
                    OperatorEntry {
                        forward,
                        gradient,
                        requirements: requirements(op),
                    },
                )
            })
            .collect();
        Self {
            path_count,
            regression,
            entries,
        }
    }

    /// Path count the registry was built for.
    #[inline]
    pub fn path_count(&self) -> usize {
        self.path_count
    }

    /// Regression settings captured by the conditional-expectation kernel.
    #[inline]
    pub fn regression(&self) -> &RegressionConfig {
        &self.regression
    }

    /// Version of the operator set.
    #[inline]
    pub fn opset_version(&self) -> u32 {
        super::OPSET_VERSION
    }

    fn entry(&self, op: OpKind) -> &OperatorEntry {
        // every kind is inserted in `new`
        &self.entries[&op]
    }

    /// Forward kernel of `op`.
    pub fn forward(&self, op: OpKind) -> &ForwardFn {
        &self.entry(op).forward
    }

    /// Gradient kernel of `op`.
    pub fn gradient(&self, op: OpKind) -> &GradientFn {
        &self.entry(op).gradient
    }

    /// Requirements of `op`.
    pub fn requirements(&self, op: OpKind) -> NodeRequirements {
        self.entry(op).requirements
    }

    /// Runs the forward kernel of `op`.
    #[inline]
    pub fn apply(&self, op: OpKind, args: &[&RandomVariable]) -> RandomVariable {
        (self.entry(op).forward)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::BasisSystem;

    #[test]
    fn test_every_kind_registered() {
        let registry = OperatorRegistry::new(4, RegressionConfig::default());
        assert_eq!(registry.entries.len(), OpKind::ALL.len());
        assert_eq!(registry.opset_version(), 1);
        assert_eq!(registry.path_count(), 4);
    }

    #[test]
    fn test_streaming_operators() {
        let registry = OperatorRegistry::new(4, RegressionConfig::default());
        for op in OpKind::ALL {
            let streaming = registry.requirements(op).access == InputAccess::Streaming;
            assert_eq!(streaming, matches!(op, OpKind::Add | OpKind::Mult), "{}", op);
        }
    }

    #[test]
    fn test_regression_settings_captured() {
        let registry = OperatorRegistry::new(4, RegressionConfig::new(1, BasisSystem::Laguerre));
        assert_eq!(registry.regression().order, 1);

        let y = RandomVariable::from_vec(vec![1.0, 3.0, 5.0, 7.0]);
        let all = RandomVariable::new(4, 1.0);
        let x = RandomVariable::from_vec(vec![0.0, 1.0, 2.0, 3.0]);
        let fitted = registry.apply(OpKind::ConditionalExpectation, &[&y, &all, &x]);
        for i in 0..4 {
            assert!((fitted.at(i) - y.at(i)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gradient_args() {
        assert!(GradientArgs::All.contains(3));
        assert!(!GradientArgs::None.contains(0));
        assert!(GradientArgs::Only(&[1]).contains(1));
        assert!(!GradientArgs::Only(&[1]).contains(0));
        assert!(requirements(OpKind::Div).result_for_gradient);
    }
}
