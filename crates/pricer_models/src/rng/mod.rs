//! # Random Path Generation
//!
//! Deterministic generation of the standard normal variates that drive the
//! simulation model.
//!
//! ## Module Structure
//!
//! - [`PricerRng`]: seeded pseudo-random generator (Ziggurat normals)
//! - [`SobolSequence`]: scrambled Sobol points behind the
//!   [`LowDiscrepancySequence`] trait
//! - [`BrownianBridge`]: bisection construction of path increments
//! - [`generate_paths`]: the path tensor for one run
//!
//! ## Usage Example
//!
//! ```rust
//! use pricer_models::rng::{generate_paths, Ordering, PathGeneratorSpec, SequenceType};
//!
//! let spec = PathGeneratorSpec {
//!     sequence: SequenceType::SobolBrownianBridge,
//!     n_factors: 2,
//!     n_steps: 12,
//!     seed: 42,
//!     ordering: Ordering::Steps,
//!     step_times: Vec::new(),
//! };
//! let a = generate_paths(&spec, 256).unwrap();
//! let b = generate_paths(&spec, 256).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.slice(11, 1).len(), 256);
//! ```

mod brownian_bridge;
mod generator;
mod prng;
mod sobol;

pub use brownian_bridge::BrownianBridge;
pub use generator::{
    generate_paths, Ordering, PathGenerator, PathGeneratorSpec, PathTensor, SequenceType,
};
pub use prng::PricerRng;
pub use sobol::{LowDiscrepancySequence, SobolSequence, SOBOL_MAX_DIMENSIONS};
