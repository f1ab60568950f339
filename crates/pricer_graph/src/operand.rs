//! Path-vectorised random variables.
//!
//! A [`RandomVariable`] holds one scalar per Monte Carlo path and is the only
//! kind of value that flows through the computation graph. Constants and model
//! parameters are the same on every path; they are stored as a single
//! broadcast scalar and only expand to a full vector when a path slot is
//! written individually.
//!
//! Elementwise kernels run on the `rayon` pool once the path count reaches
//! [`PARALLEL_THRESHOLD`]. Paths are independent, so no ordering concern
//! arises from splitting the path dimension.
//!
//! # Example
//!
//! ```rust
//! use pricer_graph::RandomVariable;
//!
//! let a = RandomVariable::from_vec(vec![1.0, 2.0, 3.0]);
//! let b = RandomVariable::new(3, 2.0);
//!
//! let c = &a * &b;
//! assert_eq!(c.to_vec(), vec![2.0, 4.0, 6.0]);
//! assert!((c.expectation() - 4.0).abs() < 1e-15);
//! ```

use rayon::prelude::*;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Path count from which elementwise kernels are split across the thread pool.
pub const PARALLEL_THRESHOLD: usize = 16_384;

#[derive(Clone, Debug, PartialEq)]
enum Values {
    Deterministic(f64),
    Stochastic(Vec<f64>),
}

/// A vector of scalars, one per simulation path.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomVariable {
    n: usize,
    values: Values,
}

#[inline]
fn map_slice<F>(src: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    if src.len() >= PARALLEL_THRESHOLD {
        src.par_iter().map(|&x| f(x)).collect()
    } else {
        src.iter().map(|&x| f(x)).collect()
    }
}

#[inline]
fn zip_slices<F>(a: &[f64], b: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    if a.len() >= PARALLEL_THRESHOLD {
        a.par_iter().zip(b.par_iter()).map(|(&x, &y)| f(x, y)).collect()
    } else {
        a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect()
    }
}

#[inline]
fn assign_slices<F>(a: &mut [f64], b: &[f64], f: F)
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    if a.len() >= PARALLEL_THRESHOLD {
        a.par_iter_mut()
            .zip(b.par_iter())
            .for_each(|(x, &y)| *x = f(*x, y));
    } else {
        a.iter_mut().zip(b.iter()).for_each(|(x, &y)| *x = f(*x, y));
    }
}

impl RandomVariable {
    /// Creates a deterministic variable holding `value` on each of `n` paths.
    #[inline]
    pub fn new(n: usize, value: f64) -> Self {
        Self {
            n,
            values: Values::Deterministic(value),
        }
    }

    /// Creates a stochastic variable from per-path values.
    #[inline]
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self {
            n: values.len(),
            values: Values::Stochastic(values),
        }
    }

    /// Number of paths.
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Returns `true` if the value is identical on every path.
    #[inline]
    pub fn is_deterministic(&self) -> bool {
        matches!(self.values, Values::Deterministic(_))
    }

    /// Returns the broadcast scalar of a deterministic variable.
    #[inline]
    pub fn deterministic_value(&self) -> Option<f64> {
        match self.values {
            Values::Deterministic(v) => Some(v),
            Values::Stochastic(_) => None,
        }
    }

    /// Value on path `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.size()`.
    #[inline]
    pub fn at(&self, i: usize) -> f64 {
        assert!(i < self.n, "path index {} out of range {}", i, self.n);
        match &self.values {
            Values::Deterministic(v) => *v,
            Values::Stochastic(v) => v[i],
        }
    }

    /// Writes the value on path `i`, expanding a deterministic variable.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.size()`.
    pub fn set(&mut self, i: usize, value: f64) {
        assert!(i < self.n, "path index {} out of range {}", i, self.n);
        self.expand();
        if let Values::Stochastic(v) = &mut self.values {
            v[i] = value;
        }
    }

    /// Converts a deterministic variable into an explicit per-path vector.
    pub fn expand(&mut self) {
        if let Values::Deterministic(v) = self.values {
            self.values = Values::Stochastic(vec![v; self.n]);
        }
    }

    /// Per-path values as an owned vector.
    pub fn to_vec(&self) -> Vec<f64> {
        match &self.values {
            Values::Deterministic(v) => vec![*v; self.n],
            Values::Stochastic(v) => v.clone(),
        }
    }

    /// Per-path slice, available for stochastic variables only.
    #[inline]
    pub fn as_slice(&self) -> Option<&[f64]> {
        match &self.values {
            Values::Deterministic(_) => None,
            Values::Stochastic(v) => Some(v),
        }
    }

    /// Arithmetic mean over all paths.
    pub fn expectation(&self) -> f64 {
        match &self.values {
            Values::Deterministic(v) => *v,
            Values::Stochastic(v) if v.is_empty() => f64::NAN,
            Values::Stochastic(v) => v.iter().sum::<f64>() / v.len() as f64,
        }
    }

    /// Returns `true` if every path value is finite.
    pub fn is_finite(&self) -> bool {
        match &self.values {
            Values::Deterministic(v) => v.is_finite(),
            Values::Stochastic(v) => v.iter().all(|x| x.is_finite()),
        }
    }

    /// Applies `f` to every path value.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let values = match &self.values {
            Values::Deterministic(v) => Values::Deterministic(f(*v)),
            Values::Stochastic(v) => Values::Stochastic(map_slice(v, f)),
        };
        Self { n: self.n, values }
    }

    /// Combines two variables path by path.
    ///
    /// # Panics
    ///
    /// Panics if the path counts differ.
    pub fn zip_map<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        assert_eq!(self.n, other.n, "random variable size mismatch");
        let values = match (&self.values, &other.values) {
            (Values::Deterministic(x), Values::Deterministic(y)) => Values::Deterministic(f(*x, *y)),
            (Values::Deterministic(x), Values::Stochastic(y)) => {
                let x = *x;
                Values::Stochastic(map_slice(y, |y| f(x, y)))
            }
            (Values::Stochastic(x), Values::Deterministic(y)) => {
                let y = *y;
                Values::Stochastic(map_slice(x, |x| f(x, y)))
            }
            (Values::Stochastic(x), Values::Stochastic(y)) => Values::Stochastic(zip_slices(x, y, f)),
        };
        Self { n: self.n, values }
    }

    /// Combines three variables path by path.
    ///
    /// # Panics
    ///
    /// Panics if the path counts differ.
    pub fn zip3_map<F>(a: &Self, b: &Self, c: &Self, f: F) -> Self
    where
        F: Fn(f64, f64, f64) -> f64 + Sync + Send,
    {
        assert!(
            a.n == b.n && b.n == c.n,
            "random variable size mismatch"
        );
        if let (Some(x), Some(y), Some(z)) = (
            a.deterministic_value(),
            b.deterministic_value(),
            c.deterministic_value(),
        ) {
            return Self::new(a.n, f(x, y, z));
        }
        let values: Vec<f64> = if a.n >= PARALLEL_THRESHOLD {
            (0..a.n)
                .into_par_iter()
                .map(|i| f(a.at(i), b.at(i), c.at(i)))
                .collect()
        } else {
            (0..a.n).map(|i| f(a.at(i), b.at(i), c.at(i))).collect()
        };
        Self::from_vec(values)
    }

    /// Updates `self` in place with `f(self, other)` path by path.
    ///
    /// Reuses the existing buffer when `self` is already stochastic.
    ///
    /// # Panics
    ///
    /// Panics if the path counts differ.
    pub fn zip_assign<F>(&mut self, other: &Self, f: F)
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        assert_eq!(self.n, other.n, "random variable size mismatch");
        if self.is_deterministic() && !other.is_deterministic() {
            self.expand();
        }
        match (&mut self.values, &other.values) {
            (Values::Deterministic(x), Values::Deterministic(y)) => *x = f(*x, *y),
            (Values::Stochastic(x), Values::Deterministic(y)) => {
                let y = *y;
                if x.len() >= PARALLEL_THRESHOLD {
                    x.par_iter_mut().for_each(|v| *v = f(*v, y));
                } else {
                    x.iter_mut().for_each(|v| *v = f(*v, y));
                }
            }
            (Values::Stochastic(x), Values::Stochastic(y)) => assign_slices(x, y, f),
            // expanded above
            (Values::Deterministic(_), Values::Stochastic(_)) => {}
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&RandomVariable> for &RandomVariable {
            type Output = RandomVariable;

            #[inline]
            fn $method(self, rhs: &RandomVariable) -> RandomVariable {
                self.zip_map(rhs, |x, y| x $op y)
            }
        }

        impl $trait<f64> for &RandomVariable {
            type Output = RandomVariable;

            #[inline]
            fn $method(self, rhs: f64) -> RandomVariable {
                self.map(move |x| x $op rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, +);
impl_binary_op!(Sub, sub, -);
impl_binary_op!(Mul, mul, *);
impl_binary_op!(Div, div, /);

impl Neg for &RandomVariable {
    type Output = RandomVariable;

    #[inline]
    fn neg(self) -> RandomVariable {
        self.map(|x| -x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_deterministic_broadcast() {
        let rv = RandomVariable::new(4, 2.5);
        assert!(rv.is_deterministic());
        assert_eq!(rv.size(), 4);
        assert_eq!(rv.at(3), 2.5);
        assert_eq!(rv.to_vec(), vec![2.5; 4]);
        assert!(rv.as_slice().is_none());
    }

    #[test]
    fn test_set_expands_deterministic() {
        let mut rv = RandomVariable::new(3, 1.0);
        rv.set(1, 7.0);
        assert!(!rv.is_deterministic());
        assert_eq!(rv.to_vec(), vec![1.0, 7.0, 1.0]);
    }

    #[test]
    fn test_mixed_arithmetic() {
        let a = RandomVariable::from_vec(vec![1.0, 2.0, 3.0]);
        let b = RandomVariable::new(3, 2.0);

        assert_eq!((&a + &b).to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!((&b - &a).to_vec(), vec![1.0, 0.0, -1.0]);
        assert_eq!((&a / &b).to_vec(), vec![0.5, 1.0, 1.5]);
        assert_eq!((-&a).to_vec(), vec![-1.0, -2.0, -3.0]);
        assert!((&b * &b).is_deterministic());
    }

    #[test]
    fn test_expectation() {
        let rv = RandomVariable::from_vec(vec![1.0, 2.0, 3.0, 6.0]);
        assert_relative_eq!(rv.expectation(), 3.0);
        assert_relative_eq!(RandomVariable::new(10, -1.5).expectation(), -1.5);
    }

    #[test]
    fn test_zip_assign_reuses_stochastic_buffer() {
        let mut acc = RandomVariable::new(3, 1.0);
        acc.zip_assign(&RandomVariable::from_vec(vec![1.0, 2.0, 3.0]), |x, y| x + y);
        assert_eq!(acc.to_vec(), vec![2.0, 3.0, 4.0]);

        acc.zip_assign(&RandomVariable::new(3, 2.0), |x, y| x * y);
        assert_eq!(acc.to_vec(), vec![4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_parallel_kernel_matches_sequential() {
        let n = PARALLEL_THRESHOLD + 17;
        let a = RandomVariable::from_vec((0..n).map(|i| i as f64).collect());
        let b = a.map(|x| 2.0 * x + 1.0);
        for i in [0, 1, n / 2, n - 1] {
            assert_eq!(b.at(i), 2.0 * i as f64 + 1.0);
        }
    }

    #[test]
    fn test_is_finite() {
        assert!(RandomVariable::from_vec(vec![1.0, 2.0]).is_finite());
        assert!(!RandomVariable::from_vec(vec![1.0, f64::NAN]).is_finite());
        assert!(!RandomVariable::new(2, f64::INFINITY).is_finite());
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn test_size_mismatch_panics() {
        let a = RandomVariable::new(2, 1.0);
        let b = RandomVariable::new(3, 1.0);
        let _ = &a + &b;
    }
}
