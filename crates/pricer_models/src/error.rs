//! Error types for path generation and model construction.
//!
//! - `RngError`: invalid path-generator requests
//! - `ModelError`: invalid model data or queries outside the simulation grid

use chrono::NaiveDate;
use pricer_graph::GraphError;
use thiserror::Error;

/// Path-generator errors.
///
/// # Examples
/// ```
/// use pricer_models::RngError;
///
/// let err = RngError::TooManyDimensions { requested: 30_000, max: 21_201 };
/// assert_eq!(
///     format!("{}", err),
///     "Sobol dimension 30000 exceeds the supported maximum 21201"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RngError {
    /// More sequence dimensions than the Sobol generator supports.
    #[error("Sobol dimension {requested} exceeds the supported maximum {max}")]
    TooManyDimensions {
        /// Dimensions asked for (`n_factors * n_steps`).
        requested: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Path tensor of zero paths requested.
    #[error("Path count must be positive")]
    NoPaths,

    /// Step times that do not describe the generator's steps.
    #[error("Expected {n_steps} strictly increasing positive step times, got {times}")]
    InvalidStepTimes {
        /// Steps the generator draws.
        n_steps: usize,
        /// Step times supplied.
        times: usize,
    },
}

/// Errors raised while building or querying a simulation model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A model parameter fails its domain check.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name (e.g. `"ir.kappa"`).
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Simulation grid could not be built.
    #[error("Invalid simulation grid: {0}")]
    InvalidGrid(String),

    /// A query date is neither the reference date nor a grid date.
    #[error("Date {0} is not on the simulation grid")]
    DateNotOnGrid(NaiveDate),

    /// Spot requested for an asset the model does not simulate.
    #[error("Unknown spot {0}")]
    UnknownSpot(String),

    /// Node query issued before `build_layer`.
    #[error("Model layer has not been appended to a graph yet")]
    NotBuilt,

    /// Correlation matrix is malformed.
    #[error("Correlation matrix invalid: {0}")]
    Correlation(String),

    /// Correlation matrix has no Cholesky factor.
    #[error("Correlation matrix is not positive definite")]
    NotPositiveDefinite,

    /// Discretisation scheme not supported by the caller.
    #[error("Discretisation {0:?} is not supported, Euler is required")]
    UnsupportedDiscretization(crate::models::Discretization),

    /// Graph rejected a node.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_display() {
        let err = ModelError::InvalidParameter {
            name: "ir.kappa".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid parameter ir.kappa: must be positive");

        let date = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert_eq!(
            format!("{}", ModelError::DateNotOnGrid(date)),
            "Date 2026-03-31 is not on the simulation grid"
        );
    }

    #[test]
    fn test_graph_error_converts() {
        let err: ModelError = GraphError::NotFound("x".to_string()).into();
        assert!(matches!(err, ModelError::Graph(_)));
    }
}
