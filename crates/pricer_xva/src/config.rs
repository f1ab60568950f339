//! Engine configuration.
//!
//! Loaded from TOML with optional environment variable overrides:
//!
//! | Variable             | Field                          |
//! |----------------------|--------------------------------|
//! | `XVA_SAMPLES`        | `simulation.samples`           |
//! | `XVA_SEED`           | `simulation.seed`              |
//! | `XVA_SEQUENCE`       | `simulation.sequence`          |
//! | `XVA_FATAL_NUMERICS` | `evaluation.numeric_policy`    |

use std::path::Path;

use chrono::NaiveDate;
use pricer_graph::eval::{EvalOptions, NumericPolicy};
use pricer_graph::RegressionConfig;
use pricer_models::models::CrossAssetModelData;
use pricer_models::rng::{Ordering, SequenceType};
use pricer_models::{ModelError, SimulationGrid};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::portfolio::{Portfolio, TradeDefinition};

/// Upper bound on the number of simulated paths.
pub const MAX_SAMPLES: usize = 10_000_000;

fn default_samples() -> usize {
    4096
}

fn default_seed() -> u64 {
    42
}

/// Path simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of Monte Carlo paths.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Generator seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Random sequence.
    #[serde(default)]
    pub sequence: SequenceType,
    /// Assignment of sequence dimensions to steps and factors.
    #[serde(default)]
    pub ordering: Ordering,
    /// Exposure dates as tenors from the reference date, e.g. `["6M", "1Y"]`.
    /// Trade dates the model must reach are added to these.
    pub grid: Vec<String>,
    /// Model sub-steps per year between exposure dates; 0 steps once per date.
    #[serde(default)]
    pub time_steps_per_year: usize,
}

/// Forward evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Non-finite result handling.
    #[serde(default)]
    pub numeric_policy: NumericPolicy,
    /// Conditional expectation basis.
    #[serde(default)]
    pub regression: RegressionConfig,
    /// Retain the values a backward pass needs.
    #[serde(default)]
    pub keep_values_for_derivatives: bool,
}

impl EvaluationConfig {
    /// Evaluator options.
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            numeric_policy: self.numeric_policy,
            keep_values_for_derivatives: self.keep_values_for_derivatives,
        }
    }
}

/// Complete run configuration.
///
/// # Examples
///
/// ```
/// use pricer_xva::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(r#"
///     reference_date = "2026-01-02"
///
///     [simulation]
///     samples = 1024
///     grid = ["6M", "1Y"]
///
///     [model.ir]
///     currency = "EUR"
///     kappa = 0.05
///     sigma = 0.01
///     rate = 0.02
/// "#).unwrap();
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.simulation.seed, 42);
/// assert!(config.trades.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Valuation date; exposure dates are tenors from here.
    pub reference_date: NaiveDate,
    /// Path simulation.
    pub simulation: SimulationConfig,
    /// Forward evaluation.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Cross-asset model parameters.
    pub model: CrossAssetModelData,
    /// Portfolio.
    #[serde(default)]
    pub trades: Vec<TradeDefinition>,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `XVA_*` environment variable overrides.
    pub fn with_env_override(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unparsable values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(samples) = lookup("XVA_SAMPLES").and_then(|v| v.trim().parse().ok()) {
            self.simulation.samples = samples;
        }
        if let Some(seed) = lookup("XVA_SEED").and_then(|v| v.trim().parse().ok()) {
            self.simulation.seed = seed;
        }
        if let Some(sequence) = lookup("XVA_SEQUENCE").and_then(|v| SequenceType::parse(&v)) {
            self.simulation.sequence = sequence;
        }
        if let Some(fatal) = lookup("XVA_FATAL_NUMERICS") {
            match fatal.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => self.evaluation.numeric_policy = NumericPolicy::Fatal,
                "0" | "false" | "no" => self.evaluation.numeric_policy = NumericPolicy::Sentinel,
                _ => {}
            }
        }
        self
    }

    /// Checks every setting and reports all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let samples = self.simulation.samples;
        if samples == 0 {
            errors.push("samples must be greater than 0".to_string());
        }
        if samples > MAX_SAMPLES {
            errors.push(format!(
                "samples {} exceeds maximum allowed ({})",
                samples, MAX_SAMPLES
            ));
        }

        if self.simulation.grid.is_empty() {
            errors.push("grid must contain at least one tenor".to_string());
        } else if let Err(e) = SimulationGrid::from_tenors(
            self.reference_date,
            &self.simulation.grid,
            self.simulation.time_steps_per_year,
        ) {
            errors.push(e.to_string());
        }

        if self.evaluation.regression.order == 0 {
            errors.push("regression order must be greater than 0".to_string());
        }

        if let Err(e) = self.model.validate() {
            errors.push(e.to_string());
        }

        if let Err(e) = Portfolio::new(self.trades.iter().cloned()) {
            errors.push(e.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Loads from file, applies environment overrides and validates.
    pub fn load_with_env_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_env_override();
        config.validate()?;
        Ok(config)
    }

    /// Simulation grid: the configured tenors plus every later date a trade
    /// needs simulated, such as an option expiry.
    pub fn grid(&self) -> Result<SimulationGrid, ConfigError> {
        let invalid = |e: ModelError| ConfigError::Validation(vec![e.to_string()]);
        let tenor_grid = SimulationGrid::from_tenors(
            self.reference_date,
            &self.simulation.grid,
            self.simulation.time_steps_per_year,
        )
        .map_err(invalid)?;

        let mut dates = tenor_grid.dates().to_vec();
        dates.extend(
            self.trades
                .iter()
                .flat_map(TradeDefinition::required_dates)
                .filter(|&date| date > self.reference_date),
        );
        dates.sort_unstable();
        dates.dedup();
        if dates.len() == tenor_grid.dates().len() {
            return Ok(tenor_grid);
        }
        SimulationGrid::new(self.reference_date, dates, self.simulation.time_steps_per_year)
            .map_err(invalid)
    }

    /// Trades as a portfolio.
    pub fn portfolio(&self) -> Result<Portfolio, ConfigError> {
        Portfolio::new(self.trades.iter().cloned())
            .map_err(|e| ConfigError::Validation(vec![e.to_string()]))
    }
}
