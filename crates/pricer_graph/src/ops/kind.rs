//! Closed set of operator kinds understood by the graph.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Version of the operator set. Bumped whenever a kind is added or the
/// semantics of an existing kind change.
pub const OPSET_VERSION: u32 = 1;

/// Number of inputs an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many inputs.
    Exact(usize),
    /// At least this many inputs.
    AtLeast(usize),
}

impl Arity {
    /// Returns `true` if `n` inputs satisfy this arity.
    #[inline]
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{}", k),
            Arity::AtLeast(k) => write!(f, "at least {}", k),
        }
    }
}

/// Operator kind of a graph node.
///
/// Elementwise across paths except [`OpKind::ConditionalExpectation`], which
/// couples paths through a least-squares regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OpKind {
    /// Sum of one or more inputs
    Add,
    /// `a - b`
    Subtract,
    /// `-a`
    Negative,
    /// Product of one or more inputs
    Mult,
    /// `a / b`
    Div,
    /// `E[regressand | regressors]` fitted on paths where `filter != 0`.
    ///
    /// Inputs: `[regressand, filter, regressor_1, ..., regressor_k]`.
    ConditionalExpectation,
    /// `1` where `a == b`, else `0`
    IndicatorEq,
    /// `1` where `a > b`, else `0`
    IndicatorGt,
    /// `1` where `a >= b`, else `0`
    IndicatorGeq,
    /// Elementwise minimum
    Min,
    /// Elementwise maximum
    Max,
    /// Absolute value
    Abs,
    /// Exponential
    Exp,
    /// Square root
    Sqrt,
    /// Natural logarithm
    Log,
    /// `a ^ b`
    Pow,
    /// Standard normal CDF
    NormalCdf,
    /// Standard normal PDF
    NormalPdf,
    /// `c != 0 ? a : b` with inputs `[c, a, b]`
    Select,
}

impl OpKind {
    /// Every operator kind, in declaration order.
    pub const ALL: [OpKind; 19] = [
        OpKind::Add,
        OpKind::Subtract,
        OpKind::Negative,
        OpKind::Mult,
        OpKind::Div,
        OpKind::ConditionalExpectation,
        OpKind::IndicatorEq,
        OpKind::IndicatorGt,
        OpKind::IndicatorGeq,
        OpKind::Min,
        OpKind::Max,
        OpKind::Abs,
        OpKind::Exp,
        OpKind::Sqrt,
        OpKind::Log,
        OpKind::Pow,
        OpKind::NormalCdf,
        OpKind::NormalPdf,
        OpKind::Select,
    ];

    /// Input count accepted by the operator.
    pub fn arity(self) -> Arity {
        match self {
            OpKind::Add | OpKind::Mult => Arity::AtLeast(1),
            OpKind::ConditionalExpectation => Arity::AtLeast(2),
            OpKind::Negative
            | OpKind::Abs
            | OpKind::Exp
            | OpKind::Sqrt
            | OpKind::Log
            | OpKind::NormalCdf
            | OpKind::NormalPdf => Arity::Exact(1),
            OpKind::Select => Arity::Exact(3),
            OpKind::Subtract
            | OpKind::Div
            | OpKind::IndicatorEq
            | OpKind::IndicatorGt
            | OpKind::IndicatorGeq
            | OpKind::Min
            | OpKind::Max
            | OpKind::Pow => Arity::Exact(2),
        }
    }

    /// Short mnemonic used in SSA dumps.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Subtract => "sub",
            OpKind::Negative => "neg",
            OpKind::Mult => "mult",
            OpKind::Div => "div",
            OpKind::ConditionalExpectation => "condexp",
            OpKind::IndicatorEq => "indicator_eq",
            OpKind::IndicatorGt => "indicator_gt",
            OpKind::IndicatorGeq => "indicator_geq",
            OpKind::Min => "min",
            OpKind::Max => "max",
            OpKind::Abs => "abs",
            OpKind::Exp => "exp",
            OpKind::Sqrt => "sqrt",
            OpKind::Log => "log",
            OpKind::Pow => "pow",
            OpKind::NormalCdf => "normal_cdf",
            OpKind::NormalPdf => "normal_pdf",
            OpKind::Select => "select",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
