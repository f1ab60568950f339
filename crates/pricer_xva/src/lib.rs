//! # Pricer XVA (L3: Engine)
//!
//! Portfolio exposure simulation on a shared computation graph.
//!
//! This crate provides:
//! - Trade definitions and the portfolio container
//! - The [`TradeGraphContributor`](trade::TradeGraphContributor) trait with
//!   swap and European option contributors
//! - A [`ContributorFactory`](trade::ContributorFactory) keyed on trade type
//! - The [`XvaEngine`] orchestrating model, trades, paths and evaluation
//! - TOML configuration with environment overrides
//! - Exposure statistics (expected value, EPE, ENE, PFE)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            pricer_xva (L3)              │
//! ├─────────────────────────────────────────┤
//! │  config     - EngineConfig (TOML)       │
//! │  portfolio  - TradeDefinition, Portfolio│
//! │  trade/     - contributors, factory     │
//! │  engine/    - XvaEngine, stages         │
//! │  exposure   - EPE, ENE, PFE             │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │  pricer_models (L2)  - paths, CgModel   │
//! │  pricer_graph  (L1)  - graph, evaluator │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use pricer_xva::{EngineConfig, XvaEngine};
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     reference_date = "2026-01-02"
//!
//!     [simulation]
//!     samples = 256
//!     grid = ["6M", "1Y"]
//!
//!     [model.ir]
//!     currency = "EUR"
//!     kappa = 0.05
//!     sigma = 0.01
//!     rate = 0.02
//!
//!     [[trades]]
//!     id = "SWP1"
//!     type = "vanilla_swap"
//!     notional = 1e6
//!     fixed_rate = 0.02
//!     start = "2026-01-02"
//!     maturity = "2029-01-02"
//! "#).unwrap();
//!
//! let run = XvaEngine::new(config).run().unwrap().completed().unwrap();
//! let swap = run.trade("SWP1").unwrap();
//! assert_eq!(swap.npvs.len(), 3);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod exposure;
pub mod portfolio;
pub mod trade;

pub use config::EngineConfig;
pub use engine::{EngineOutcome, ExposureRun, Stage, StageTimings, TradeExposure, XvaEngine};
pub use error::{ConfigError, EngineError, PortfolioError, StageError, TradeError};
pub use exposure::ExposureProfile;
