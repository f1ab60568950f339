//! # Pricer Models (L2: Simulation Models)
//!
//! Random path generation and stochastic models that contribute their state
//! to the shared computation graph.
//!
//! This crate provides:
//! - [`rng`]: pseudo-random and Sobol path tensors, Brownian bridge
//! - [`grid`]: simulation dates and Euler time-step refinement
//! - [`models`]: the [`CgModel`](models::CgModel) adapter trait and a
//!   cross-asset Gaussian model
//!
//! ## Design Principles
//!
//! - **Deterministic generation**: identical seeds give bit-identical paths
//! - **Parameters as graph inputs**: every model parameter is an input node,
//!   bound once per run and available to the backward pass
//! - **Explicit date grid**: trades may only query the reference date and
//!   grid dates

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod grid;
pub mod models;
pub mod rng;

pub use error::{ModelError, ModelResult, RngError};
pub use grid::SimulationGrid;
