//! Forward and gradient kernels for every operator kind.
//!
//! Forward kernels take the input values in node order and return the node
//! value. Gradient kernels take the input values and the node value and
//! return one local partial derivative per input; the backward evaluator
//! multiplies them by the node's adjoint.
//!
//! All kernels are elementwise over paths (except the regression) and map
//! bad inputs to IEEE sentinels instead of failing.

use crate::math::{norm_cdf, norm_pdf};
use crate::operand::RandomVariable;
use crate::regression::{conditional_expectation, RegressionConfig};

use super::OpKind;

/// `min` that propagates NaN.
#[inline]
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// `max` that propagates NaN.
#[inline]
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

#[inline]
fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn fold(args: &[&RandomVariable], f: fn(f64, f64) -> f64) -> RandomVariable {
    let mut acc = args[0].clone();
    for a in &args[1..] {
        acc.zip_assign(a, f);
    }
    acc
}

/// Evaluates `op` on `args`.
pub(crate) fn forward(op: OpKind, args: &[&RandomVariable], regression: &RegressionConfig) -> RandomVariable {
    match op {
        OpKind::Add => fold(args, |x, y| x + y),
        OpKind::Subtract => args[0] - args[1],
        OpKind::Negative => -args[0],
        OpKind::Mult => fold(args, |x, y| x * y),
        OpKind::Div => args[0] / args[1],
        OpKind::ConditionalExpectation => conditional_expectation(args[0], args[1], &args[2..], regression),
        OpKind::IndicatorEq => args[0].zip_map(args[1], |a, b| indicator(a == b)),
        OpKind::IndicatorGt => args[0].zip_map(args[1], |a, b| indicator(a > b)),
        OpKind::IndicatorGeq => args[0].zip_map(args[1], |a, b| indicator(a >= b)),
        OpKind::Min => args[0].zip_map(args[1], nan_min),
        OpKind::Max => args[0].zip_map(args[1], nan_max),
        OpKind::Abs => args[0].map(f64::abs),
        OpKind::Exp => args[0].map(f64::exp),
        OpKind::Sqrt => args[0].map(f64::sqrt),
        OpKind::Log => args[0].map(f64::ln),
        OpKind::Pow => args[0].zip_map(args[1], f64::powf),
        OpKind::NormalCdf => args[0].map(norm_cdf),
        OpKind::NormalPdf => args[0].map(norm_pdf),
        OpKind::Select => RandomVariable::zip3_map(args[0], args[1], args[2], |c, a, b| if c != 0.0 { a } else { b }),
    }
}

/// Local partial derivatives of `op` with respect to each input.
///
/// Inputs the operator does not declare in its gradient requirements may be
/// zero placeholders.
pub(crate) fn gradient(op: OpKind, args: &[&RandomVariable], value: &RandomVariable) -> Vec<RandomVariable> {
    let n = value.size();
    let one = || RandomVariable::new(n, 1.0);
    let zero = || RandomVariable::new(n, 0.0);

    match op {
        OpKind::Add => args.iter().map(|_| one()).collect(),
        OpKind::Subtract => vec![one(), RandomVariable::new(n, -1.0)],
        OpKind::Negative => vec![RandomVariable::new(n, -1.0)],
        OpKind::Mult => (0..args.len())
            .map(|i| {
                let others: Vec<&RandomVariable> = args
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, a)| *a)
                    .collect();
                if others.is_empty() {
                    one()
                } else {
                    fold(&others, |x, y| x * y)
                }
            })
            .collect(),
        OpKind::Div => vec![args[1].map(|b| 1.0 / b), value.zip_map(args[1], |v, b| -v / b)],
        OpKind::ConditionalExpectation => {
            let mut grads = vec![one()];
            grads.extend((1..args.len()).map(|_| zero()));
            grads
        }
        OpKind::IndicatorEq | OpKind::IndicatorGt | OpKind::IndicatorGeq => vec![zero(), zero()],
        OpKind::Min => {
            let da = args[0].zip_map(args[1], |a, b| indicator(a < b));
            let db = da.map(|d| 1.0 - d);
            vec![da, db]
        }
        OpKind::Max => {
            let da = args[0].zip_map(args[1], |a, b| indicator(a > b));
            let db = da.map(|d| 1.0 - d);
            vec![da, db]
        }
        OpKind::Abs => vec![args[0].map(|a| {
            if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else {
                0.0
            }
        })],
        OpKind::Exp => vec![value.clone()],
        OpKind::Sqrt => vec![value.map(|v| 0.5 / v)],
        OpKind::Log => vec![args[0].map(|a| 1.0 / a)],
        OpKind::Pow => vec![
            args[0].zip_map(args[1], |a, b| b * a.powf(b - 1.0)),
            value.zip_map(args[0], |v, a| v * a.ln()),
        ],
        OpKind::NormalCdf => vec![args[0].map(norm_pdf)],
        OpKind::NormalPdf => vec![args[0].zip_map(value, |a, v| -a * v)],
        OpKind::Select => {
            let take_a = args[0].map(|c| indicator(c != 0.0));
            let take_b = take_a.map(|t| 1.0 - t);
            vec![zero(), take_a, take_b]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rv(v: &[f64]) -> RandomVariable {
        RandomVariable::from_vec(v.to_vec())
    }

    fn fwd(op: OpKind, args: &[&RandomVariable]) -> RandomVariable {
        forward(op, args, &RegressionConfig::default())
    }

    #[test]
    fn test_nary_add_and_mult() {
        let a = rv(&[1.0, 2.0]);
        let b = RandomVariable::new(2, 3.0);
        let c = rv(&[0.5, -1.0]);
        assert_eq!(fwd(OpKind::Add, &[&a, &b, &c]).to_vec(), vec![4.5, 4.0]);
        assert_eq!(fwd(OpKind::Mult, &[&a, &b, &c]).to_vec(), vec![1.5, -6.0]);
        assert_eq!(fwd(OpKind::Add, &[&a]).to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_domain_edges_give_sentinels() {
        let zero = RandomVariable::new(2, 0.0);
        let x = rv(&[1.0, -1.0]);
        let q = fwd(OpKind::Div, &[&x, &zero]);
        assert_eq!(q.at(0), f64::INFINITY);
        assert_eq!(q.at(1), f64::NEG_INFINITY);

        let l = fwd(OpKind::Log, &[&rv(&[0.0, -1.0])]);
        assert_eq!(l.at(0), f64::NEG_INFINITY);
        assert!(l.at(1).is_nan());

        assert!(fwd(OpKind::Sqrt, &[&rv(&[-4.0])]).at(0).is_nan());
        assert!(fwd(OpKind::Max, &[&rv(&[f64::NAN]), &rv(&[1.0])]).at(0).is_nan());
        assert!(fwd(OpKind::Min, &[&rv(&[1.0]), &rv(&[f64::NAN])]).at(0).is_nan());
    }

    #[test]
    fn test_indicators_and_select() {
        let a = rv(&[1.0, 2.0, 3.0]);
        let b = RandomVariable::new(3, 2.0);
        assert_eq!(fwd(OpKind::IndicatorEq, &[&a, &b]).to_vec(), vec![0.0, 1.0, 0.0]);
        assert_eq!(fwd(OpKind::IndicatorGt, &[&a, &b]).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(fwd(OpKind::IndicatorGeq, &[&a, &b]).to_vec(), vec![0.0, 1.0, 1.0]);

        let c = rv(&[1.0, 0.0, 5.0]);
        assert_eq!(fwd(OpKind::Select, &[&c, &a, &b]).to_vec(), vec![1.0, 2.0, 3.0]);
        let c = rv(&[0.0, 0.0, 0.0]);
        assert_eq!(fwd(OpKind::Select, &[&c, &a, &b]).to_vec(), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let h = 1e-6;
        let unary = [
            OpKind::Exp,
            OpKind::Sqrt,
            OpKind::Log,
            OpKind::NormalCdf,
            OpKind::NormalPdf,
            OpKind::Abs,
            OpKind::Negative,
        ];
        for op in unary {
            let x = rv(&[0.7, 1.3]);
            let v = fwd(op, &[&x]);
            let g = gradient(op, &[&x], &v);
            let up = fwd(op, &[&(&x + h)]);
            let dn = fwd(op, &[&(&x - h)]);
            for i in 0..2 {
                let fd = (up.at(i) - dn.at(i)) / (2.0 * h);
                assert_abs_diff_eq!(g[0].at(i), fd, epsilon = 1e-5);
            }
        }

        let binary = [OpKind::Subtract, OpKind::Div, OpKind::Pow, OpKind::Min, OpKind::Max, OpKind::Mult];
        for op in binary {
            let a = rv(&[0.8, 1.7]);
            let b = rv(&[1.2, 0.9]);
            let v = fwd(op, &[&a, &b]);
            let g = gradient(op, &[&a, &b], &v);
            let da = (fwd(op, &[&(&a + h), &b]).at(0) - fwd(op, &[&(&a - h), &b]).at(0)) / (2.0 * h);
            let db = (fwd(op, &[&a, &(&b + h)]).at(1) - fwd(op, &[&a, &(&b - h)]).at(1)) / (2.0 * h);
            assert_abs_diff_eq!(g[0].at(0), da, epsilon = 1e-6);
            assert_abs_diff_eq!(g[1].at(1), db, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_nary_mult_gradient() {
        let a = rv(&[2.0]);
        let b = rv(&[3.0]);
        let c = rv(&[5.0]);
        let v = fwd(OpKind::Mult, &[&a, &b, &c]);
        let g = gradient(OpKind::Mult, &[&a, &b, &c], &v);
        assert_eq!(g[0].at(0), 15.0);
        assert_eq!(g[1].at(0), 10.0);
        assert_eq!(g[2].at(0), 6.0);
    }
}
