//! Least-squares regression behind the conditional-expectation operator.
//!
//! The regressand is projected onto a multivariate polynomial basis of total
//! degree `order` in the stochastic regressors. Coefficients are fitted on
//! the paths selected by a filter and the fitted function is then evaluated
//! on every path.
//!
//! Failures never abort evaluation: an empty filter, non-finite inputs or a
//! failed decomposition produce an all-NaN result.

use crate::operand::RandomVariable;
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Singular values below `SVD_EPS * max(singular value)` are treated as zero.
const SVD_EPS: f64 = 1e-12;

/// Iteration cap for the SVD.
const SVD_MAX_ITER: usize = 1_000;

/// Family of one-dimensional polynomials used to build the basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BasisSystem {
    /// `1, x, x^2, ...`
    #[default]
    Monomial,
    /// Laguerre polynomials
    Laguerre,
    /// Hermite polynomials (physicists' convention)
    Hermite,
    /// Legendre polynomials
    Legendre,
    /// Chebyshev polynomials of the first kind
    Chebyshev,
    /// Chebyshev polynomials of the second kind
    Chebyshev2nd,
}

impl BasisSystem {
    /// Values `p_0(x), ..., p_order(x)`.
    pub fn evaluate(self, x: f64, order: usize) -> Vec<f64> {
        let mut p = Vec::with_capacity(order + 1);
        p.push(1.0);
        if order == 0 {
            return p;
        }
        p.push(match self {
            BasisSystem::Monomial | BasisSystem::Legendre | BasisSystem::Chebyshev => x,
            BasisSystem::Laguerre => 1.0 - x,
            BasisSystem::Hermite | BasisSystem::Chebyshev2nd => 2.0 * x,
        });
        for k in 1..order {
            let kf = k as f64;
            let next = match self {
                BasisSystem::Monomial => p[k] * x,
                BasisSystem::Laguerre => ((2.0 * kf + 1.0 - x) * p[k] - kf * p[k - 1]) / (kf + 1.0),
                BasisSystem::Hermite => 2.0 * x * p[k] - 2.0 * kf * p[k - 1],
                BasisSystem::Legendre => ((2.0 * kf + 1.0) * x * p[k] - kf * p[k - 1]) / (kf + 1.0),
                BasisSystem::Chebyshev | BasisSystem::Chebyshev2nd => 2.0 * x * p[k] - p[k - 1],
            };
            p.push(next);
        }
        p
    }
}

/// Settings of the conditional-expectation operator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegressionConfig {
    /// Maximum total degree of the basis
    pub order: usize,
    /// Polynomial family
    pub basis: BasisSystem,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            order: 4,
            basis: BasisSystem::Monomial,
        }
    }
}

impl RegressionConfig {
    /// Creates a configuration.
    pub fn new(order: usize, basis: BasisSystem) -> Self {
        Self { order, basis }
    }
}

/// Exponent tuples of total degree at most `order` in `dim` variables,
/// constant term first.
pub fn multi_indices(dim: usize, order: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, dim: usize, remaining: usize, out: &mut Vec<Vec<usize>>) {
        if prefix.len() == dim {
            out.push(prefix.clone());
            return;
        }
        for e in 0..=remaining {
            prefix.push(e);
            extend(prefix, dim, remaining - e, out);
            prefix.pop();
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(dim), dim, order, &mut out);
    out.sort_by_key(|idx| idx.iter().sum::<usize>());
    out
}

/// Conditional expectation of `regressand` given `regressors`, fitted where
/// `filter != 0` and evaluated on all paths.
pub fn conditional_expectation(
    regressand: &RandomVariable,
    filter: &RandomVariable,
    regressors: &[&RandomVariable],
    config: &RegressionConfig,
) -> RandomVariable {
    let n = regressand.size();
    let active: Vec<usize> = (0..n).filter(|&i| filter.at(i) != 0.0).collect();
    if active.is_empty() {
        return RandomVariable::new(n, f64::NAN);
    }
    if regressand.is_deterministic() {
        return regressand.clone();
    }

    let stochastic: Vec<&RandomVariable> = regressors
        .iter()
        .copied()
        .filter(|r| !r.is_deterministic())
        .collect();

    if stochastic.is_empty() || config.order == 0 {
        let mean = active.iter().map(|&i| regressand.at(i)).sum::<f64>() / active.len() as f64;
        return RandomVariable::new(n, mean);
    }

    let indices = multi_indices(stochastic.len(), config.order);
    let design_row = |path: usize| -> Vec<f64> {
        let per_var: Vec<Vec<f64>> = stochastic
            .iter()
            .map(|r| config.basis.evaluate(r.at(path), config.order))
            .collect();
        indices
            .iter()
            .map(|exps| {
                exps.iter()
                    .zip(per_var.iter())
                    .map(|(&e, p)| p[e])
                    .product::<f64>()
            })
            .collect()
    };

    let rows: Vec<Vec<f64>> = active.iter().map(|&i| design_row(i)).collect();
    let y: Vec<f64> = active.iter().map(|&i| regressand.at(i)).collect();
    if y.iter().any(|v| !v.is_finite()) || rows.iter().flatten().any(|v| !v.is_finite()) {
        return RandomVariable::new(n, f64::NAN);
    }

    let a = DMatrix::from_fn(rows.len(), indices.len(), |r, c| rows[r][c]);
    let b = DVector::from_vec(y);
    let coefficients = match fit(a, &b) {
        Some(beta) => beta,
        None => return RandomVariable::new(n, f64::NAN),
    };

    let values = (0..n)
        .map(|i| {
            design_row(i)
                .iter()
                .zip(coefficients.iter())
                .map(|(x, beta)| x * beta)
                .sum::<f64>()
        })
        .collect();
    RandomVariable::from_vec(values)
}

fn fit(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.try_svd(true, true, f64::EPSILON, SVD_MAX_ITER)?;
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    if !(max_sv > 0.0) {
        return None;
    }
    svd.solve(b, SVD_EPS * max_sv).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_multi_indices_total_degree() {
        let idx = multi_indices(2, 2);
        assert_eq!(idx.len(), 6);
        assert_eq!(idx[0], vec![0, 0]);
        assert!(idx.iter().all(|e| e.iter().sum::<usize>() <= 2));
        assert_eq!(multi_indices(3, 4).len(), 35);
    }

    #[test]
    fn test_basis_recurrences() {
        let x = 0.3;
        let legendre = BasisSystem::Legendre.evaluate(x, 2);
        assert_abs_diff_eq!(legendre[2], 0.5 * (3.0 * x * x - 1.0), epsilon = 1e-15);
        let hermite = BasisSystem::Hermite.evaluate(x, 2);
        assert_abs_diff_eq!(hermite[2], 4.0 * x * x - 2.0, epsilon = 1e-15);
        let laguerre = BasisSystem::Laguerre.evaluate(x, 2);
        assert_abs_diff_eq!(laguerre[2], 0.5 * (x * x - 4.0 * x + 2.0), epsilon = 1e-15);
        let cheb = BasisSystem::Chebyshev.evaluate(x, 3);
        assert_abs_diff_eq!(cheb[3], 4.0 * x * x * x - 3.0 * x, epsilon = 1e-15);
        let cheb2 = BasisSystem::Chebyshev2nd.evaluate(x, 2);
        assert_abs_diff_eq!(cheb2[2], 4.0 * x * x - 1.0, epsilon = 1e-15);
        assert_eq!(BasisSystem::Monomial.evaluate(2.0, 3), vec![1.0, 2.0, 4.0, 8.0]);
    }

    #[test]
    fn test_recovers_quadratic() {
        let xs: Vec<f64> = (0..50).map(|i| -1.0 + i as f64 * 0.04).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 1.0 + 2.0 * x - 0.5 * x * x).collect();
        let x = RandomVariable::from_vec(xs);
        let y = RandomVariable::from_vec(ys.clone());
        let filter = RandomVariable::new(50, 1.0);

        for basis in [BasisSystem::Monomial, BasisSystem::Legendre, BasisSystem::Hermite] {
            let fitted = conditional_expectation(&y, &filter, &[&x], &RegressionConfig::new(2, basis));
            for (i, expected) in ys.iter().enumerate() {
                assert_abs_diff_eq!(fitted.at(i), *expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_filter_restricts_fit_but_evaluates_everywhere() {
        let x = RandomVariable::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        // linear on the first four paths, outlier on the last
        let y = RandomVariable::from_vec(vec![1.0, 3.0, 5.0, 7.0, 100.0]);
        let filter = RandomVariable::from_vec(vec![1.0, 1.0, 1.0, 1.0, 0.0]);
        let fitted = conditional_expectation(&y, &filter, &[&x], &RegressionConfig::new(1, BasisSystem::Monomial));
        assert_abs_diff_eq!(fitted.at(4), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_deterministic_regressors_fall_back_to_mean() {
        let y = RandomVariable::from_vec(vec![1.0, 2.0, 3.0, 6.0]);
        let c = RandomVariable::new(4, 5.0);
        let filter = RandomVariable::new(4, 1.0);
        let fitted = conditional_expectation(&y, &filter, &[&c], &RegressionConfig::default());
        assert!(fitted.is_deterministic());
        assert_abs_diff_eq!(fitted.at(0), 3.0, epsilon = 1e-15);
    }

    #[test]
    fn test_failure_sentinels() {
        let y = RandomVariable::from_vec(vec![1.0, f64::NAN, 3.0]);
        let x = RandomVariable::from_vec(vec![0.1, 0.2, 0.3]);
        let all = RandomVariable::new(3, 1.0);
        let fitted = conditional_expectation(&y, &all, &[&x], &RegressionConfig::default());
        assert!((0..3).all(|i| fitted.at(i).is_nan()));

        let none = RandomVariable::new(3, 0.0);
        let y = RandomVariable::from_vec(vec![1.0, 2.0, 3.0]);
        let fitted = conditional_expectation(&y, &none, &[&x], &RegressionConfig::default());
        assert!(fitted.at(0).is_nan());
    }
}
