//! Convenience builders for unlabelled operation nodes.
//!
//! Thin wrappers over [`ComputationGraph::append`] that keep model and trade
//! code readable:
//!
//! ```rust
//! use pricer_graph::graph::{cg_add, cg_exp, cg_mult, ComputationGraph, InputKind};
//!
//! let mut g = ComputationGraph::new();
//! let x = g.insert_input(InputKind::Variable, None).unwrap();
//! let half = g.constant(0.5);
//! let hx = cg_mult(&mut g, half, x).unwrap();
//! let y = cg_exp(&mut g, hx).unwrap();
//! let z = cg_add(&mut g, y, x).unwrap();
//! assert_eq!(z, 4);
//! ```

use super::{ComputationGraph, GraphResult, NodeIndex};
use crate::ops::OpKind;

macro_rules! unary_builder {
    ($(#[$doc:meta])* $name:ident, $op:expr) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(g: &mut ComputationGraph, a: NodeIndex) -> GraphResult<NodeIndex> {
            g.append($op, &[a], None)
        }
    };
}

macro_rules! binary_builder {
    ($(#[$doc:meta])* $name:ident, $op:expr) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(g: &mut ComputationGraph, a: NodeIndex, b: NodeIndex) -> GraphResult<NodeIndex> {
            g.append($op, &[a, b], None)
        }
    };
}

binary_builder!(
    /// `a + b`
    cg_add,
    OpKind::Add
);
binary_builder!(
    /// `a - b`
    cg_sub,
    OpKind::Subtract
);
binary_builder!(
    /// `a * b`
    cg_mult,
    OpKind::Mult
);
binary_builder!(
    /// `a / b`
    cg_div,
    OpKind::Div
);
binary_builder!(
    /// `a ^ b`
    cg_pow,
    OpKind::Pow
);
binary_builder!(
    /// `max(a, b)`
    cg_max,
    OpKind::Max
);
binary_builder!(
    /// `min(a, b)`
    cg_min,
    OpKind::Min
);
binary_builder!(
    /// `a == b ? 1 : 0`
    cg_indicator_eq,
    OpKind::IndicatorEq
);
binary_builder!(
    /// `a > b ? 1 : 0`
    cg_indicator_gt,
    OpKind::IndicatorGt
);
binary_builder!(
    /// `a >= b ? 1 : 0`
    cg_indicator_geq,
    OpKind::IndicatorGeq
);

unary_builder!(
    /// `-a`
    cg_neg,
    OpKind::Negative
);
unary_builder!(
    /// `|a|`
    cg_abs,
    OpKind::Abs
);
unary_builder!(
    /// `exp(a)`
    cg_exp,
    OpKind::Exp
);
unary_builder!(
    /// `sqrt(a)`
    cg_sqrt,
    OpKind::Sqrt
);
unary_builder!(
    /// `ln(a)`
    cg_log,
    OpKind::Log
);
unary_builder!(
    /// Standard normal CDF of `a`
    cg_normal_cdf,
    OpKind::NormalCdf
);
unary_builder!(
    /// Standard normal PDF of `a`
    cg_normal_pdf,
    OpKind::NormalPdf
);

/// `condition != 0 ? if_true : if_false`
#[inline]
pub fn cg_select(
    g: &mut ComputationGraph,
    condition: NodeIndex,
    if_true: NodeIndex,
    if_false: NodeIndex,
) -> GraphResult<NodeIndex> {
    g.append(OpKind::Select, &[condition, if_true, if_false], None)
}

/// Sum of `terms`; a single term is returned unchanged and an empty slice
/// yields the constant `0`.
pub fn cg_sum(g: &mut ComputationGraph, terms: &[NodeIndex]) -> GraphResult<NodeIndex> {
    match terms {
        [] => Ok(g.constant(0.0)),
        [single] => Ok(*single),
        _ => g.append(OpKind::Add, terms, None),
    }
}

/// Conditional expectation of `regressand` given `regressors`, fitted on the
/// paths where `filter` is non-zero. Pass `None` to fit on every path.
pub fn cg_conditional_expectation(
    g: &mut ComputationGraph,
    regressand: NodeIndex,
    regressors: &[NodeIndex],
    filter: Option<NodeIndex>,
) -> GraphResult<NodeIndex> {
    let filter = filter.unwrap_or_else(|| g.constant(1.0));
    let mut args = Vec::with_capacity(regressors.len() + 2);
    args.push(regressand);
    args.push(filter);
    args.extend_from_slice(regressors);
    g.append(OpKind::ConditionalExpectation, &args, None)
}
