//! Instantaneous correlation between model factors.
//!
//! Given independent normals `Z`, correlated shocks are `W = L Z` with `L`
//! the lower Cholesky factor of the correlation matrix `C = L L^T`. The model
//! writes the non-zero entries of `L` into the graph as constants.

use nalgebra::DMatrix;

use crate::error::{ModelError, ModelResult};

const TOLERANCE: f64 = 1e-10;

/// Validated correlation matrix.
///
/// # Examples
///
/// ```
/// use pricer_models::models::CorrelationMatrix;
///
/// let corr = CorrelationMatrix::from_rows(&[vec![1.0, 0.5], vec![0.5, 1.0]]).unwrap();
/// let l = corr.cholesky().unwrap();
/// assert!((l[(1, 1)] - 0.75f64.sqrt()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    matrix: DMatrix<f64>,
}

impl CorrelationMatrix {
    /// Checks and wraps a row-major `dim * dim` matrix.
    ///
    /// # Validation
    ///
    /// - exactly `dim * dim` elements
    /// - unit diagonal
    /// - symmetric, off-diagonal entries in `[-1, 1]`
    pub fn new(data: &[f64], dim: usize) -> ModelResult<Self> {
        if data.len() != dim * dim {
            return Err(ModelError::Correlation(format!(
                "expected {} elements, got {}",
                dim * dim,
                data.len()
            )));
        }
        let matrix = DMatrix::from_row_slice(dim, dim, data);

        for i in 0..dim {
            let diag = matrix[(i, i)];
            if (diag - 1.0).abs() > TOLERANCE {
                return Err(ModelError::Correlation(format!(
                    "diagonal element {} is {}, expected 1",
                    i, diag
                )));
            }
            for j in (i + 1)..dim {
                let rho = matrix[(i, j)];
                if (rho - matrix[(j, i)]).abs() > TOLERANCE {
                    return Err(ModelError::Correlation(format!(
                        "not symmetric at ({}, {})",
                        i, j
                    )));
                }
                if !(-1.0..=1.0).contains(&rho) {
                    return Err(ModelError::Correlation(format!(
                        "element ({}, {}) = {} outside [-1, 1]",
                        i, j, rho
                    )));
                }
            }
        }
        Ok(Self { matrix })
    }

    /// Builds from rows, as read from configuration.
    pub fn from_rows(rows: &[Vec<f64>]) -> ModelResult<Self> {
        let dim = rows.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(ModelError::Correlation(format!(
                "row {} has {} elements, expected {}",
                bad,
                rows[bad].len(),
                dim
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::new(&flat, dim)
    }

    /// Uncorrelated factors.
    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim, dim),
        }
    }

    /// Number of factors.
    #[inline]
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Correlation between factors `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// Lower Cholesky factor.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotPositiveDefinite`] if no factor exists.
    pub fn cholesky(&self) -> ModelResult<DMatrix<f64>> {
        self.matrix
            .clone()
            .cholesky()
            .map(|c| c.l())
            .ok_or(ModelError::NotPositiveDefinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_malformed() {
        assert!(CorrelationMatrix::new(&[1.0, 0.5, 0.5], 2).is_err());
        assert!(CorrelationMatrix::new(&[0.9, 0.0, 0.0, 1.0], 2).is_err());
        assert!(CorrelationMatrix::new(&[1.0, 0.5, 0.4, 1.0], 2).is_err());
        assert!(CorrelationMatrix::new(&[1.0, 1.5, 1.5, 1.0], 2).is_err());
        assert!(CorrelationMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0]]).is_err());
    }

    #[test]
    fn test_cholesky_reproduces_matrix() {
        let corr = CorrelationMatrix::from_rows(&[
            vec![1.0, 0.3, -0.2],
            vec![0.3, 1.0, 0.4],
            vec![-0.2, 0.4, 1.0],
        ])
        .unwrap();
        let l = corr.cholesky().unwrap();
        let c = &l * l.transpose();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(c[(i, j)], corr.get(i, j), epsilon = 1e-12);
            }
            for j in (i + 1)..3 {
                assert_eq!(l[(i, j)], 0.0);
            }
        }
    }

    #[test]
    fn test_not_positive_definite() {
        let corr = CorrelationMatrix::from_rows(&[
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
        .unwrap();
        assert_eq!(corr.cholesky().unwrap_err(), ModelError::NotPositiveDefinite);
    }

    #[test]
    fn test_identity() {
        let l = CorrelationMatrix::identity(3).cholesky().unwrap();
        assert_eq!(l, DMatrix::identity(3, 3));
    }
}
