//! Error types for configuration, trades and engine runs.
//!
//! - `ConfigError`: configuration loading and validation
//! - `TradeError`: a contributor failed to append its subgraph
//! - `PortfolioError`: malformed portfolio
//! - `EngineError`: a run failed; carries the failing [`Stage`]

use pricer_graph::eval::EvalError;
use pricer_graph::GraphError;
use pricer_models::{ModelError, RngError};
use thiserror::Error;

use crate::engine::Stage;
use crate::portfolio::TradeType;

/// Configuration errors.
///
/// # Examples
/// ```
/// use pricer_xva::ConfigError;
///
/// let err = ConfigError::Validation(vec!["samples must be positive".to_string()]);
/// assert_eq!(format!("{}", err), "Validation errors: samples must be positive");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("IO error: {0}")]
    Io(String),
    /// Configuration file is not valid TOML for [`EngineConfig`](crate::EngineConfig).
    #[error("Parse error: {0}")]
    Parse(String),
    /// One or more values failed validation.
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Failure of a single trade contributor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    /// Model query failed (date off the grid, unknown spot, ...).
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Graph rejected a node.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Trade terms are unusable.
    #[error("Invalid trade: {0}")]
    Invalid(String),
    /// No contributor registered for the trade type.
    #[error("No contributor registered for trade type {0}")]
    UnsupportedTradeType(TradeType),
    /// Contributor returned the wrong number of output nodes.
    #[error("Expected {expected} output nodes, got {actual}")]
    OutputCount {
        /// Reference date plus one per simulation date.
        expected: usize,
        /// Nodes returned.
        actual: usize,
    },
}

/// Portfolio construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortfolioError {
    /// Two trades share an id.
    #[error("Duplicate trade id {0}")]
    DuplicateTrade(String),
    /// Empty trade id.
    #[error("Trade id must not be empty")]
    EmptyId,
}

/// Underlying cause of an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Model construction or model layer failure.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Graph construction failure outside any trade.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A trade contributor failed.
    #[error("trade {trade_id}: {source}")]
    Trade {
        /// Failing trade.
        trade_id: String,
        /// Contributor error.
        #[source]
        source: TradeError,
    },
    /// Path generation failure.
    #[error(transparent)]
    Paths(#[from] RngError),
    /// Forward evaluation failure.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A run failed in `stage`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} stage failed: {source}")]
pub struct EngineError {
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying error.
    #[source]
    pub source: StageError,
}

impl EngineError {
    /// Wraps `source` as a failure of `stage`.
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::new(
            Stage::TradeBuild,
            StageError::Trade {
                trade_id: "T1".to_string(),
                source: TradeError::Invalid("negative notional".to_string()),
            },
        );
        assert_eq!(
            err.to_string(),
            "trade_build stage failed: trade T1: Invalid trade: negative notional"
        );
    }

    #[test]
    fn test_conversions() {
        let err = EngineError::new(Stage::PathGeneration, RngError::NoPaths);
        assert!(matches!(err.source, StageError::Paths(RngError::NoPaths)));
        let trade: TradeError = ModelError::NotBuilt.into();
        assert!(matches!(trade, TradeError::Model(_)));
    }
}
