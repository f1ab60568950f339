//! Orchestrator: one exposure run over a shared computation graph.
//!
//! Stages run strictly in order, each timed and logged:
//!
//! 1. [`Stage::Config`]: validation, grid and portfolio
//! 2. [`Stage::ModelBuild`]: model from the [`ModelBuilder`](pricer_models::models::ModelBuilder)
//! 3. [`Stage::GraphBuild`]: model layer appended to the graph
//! 4. [`Stage::TradeBuild`]: one subgraph per trade, in id order
//! 5. [`Stage::PathGeneration`]: path tensor bound to the random variates
//! 6. [`Stage::Binding`]: constants and model parameters bound
//! 7. [`Stage::Evaluation`]: one forward run retaining the trade outputs
//!
//! The cancellation token is checked before every stage and between nodes
//! during evaluation.

mod orchestrator;
mod stage;

pub use orchestrator::{EngineOutcome, ExposureRun, TradeExposure, XvaEngine};
pub use stage::{Stage, StageTimings};
