//! Path tensor generation.
//!
//! A [`PathGenerator`] produces one draw of `n_steps * n_factors` standard
//! normals per path. [`generate_paths`] stacks `n_paths` draws into a
//! [`PathTensor`] stored path-major.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use pricer_graph::math::inverse_cumulative_normal;
use pricer_graph::RandomVariable;

use super::brownian_bridge::BrownianBridge;
use super::prng::PricerRng;
use super::sobol::{LowDiscrepancySequence, SobolSequence};
use crate::error::RngError;

// ============================================================================
// Generator settings
// ============================================================================

/// Source of the variates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SequenceType {
    /// Seeded pseudo-random normals.
    PseudoRandom,
    /// Pseudo-random with every odd path the negation of the preceding even path.
    PseudoRandomAntithetic,
    /// Scrambled Sobol points mapped through the inverse normal CDF.
    Sobol,
    /// Sobol points fed through a Brownian bridge per factor.
    #[default]
    SobolBrownianBridge,
}

impl SequenceType {
    /// Parses the configuration spelling (`"sobol_brownian_bridge"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pseudo_random" | "pseudorandom" => Some(Self::PseudoRandom),
            "pseudo_random_antithetic" | "pseudorandomantithetic" => {
                Some(Self::PseudoRandomAntithetic)
            }
            "sobol" => Some(Self::Sobol),
            "sobol_brownian_bridge" | "sobolbrownianbridge" => Some(Self::SobolBrownianBridge),
            _ => None,
        }
    }
}

/// Assignment of sequence dimensions to `(step, factor)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Ordering {
    /// All steps of factor 0, then all steps of factor 1, ...
    Factors,
    /// All factors of step 0, then all factors of step 1, ...
    #[default]
    Steps,
    /// Anti-diagonals of the (step, factor) grid, lowest `step + factor` first.
    Diagonal,
}

/// Inputs to [`generate_paths`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathGeneratorSpec {
    /// Variate source.
    pub sequence: SequenceType,
    /// Number of Brownian factors.
    pub n_factors: usize,
    /// Number of time steps.
    pub n_steps: usize,
    /// Seed for the generator and the Sobol scrambling.
    pub seed: u64,
    /// Dimension ordering.
    pub ordering: Ordering,
    /// End time of every step, used to space the Brownian bridge. Empty
    /// means unit spacing.
    #[cfg_attr(feature = "serde", serde(default))]
    pub step_times: Vec<f64>,
}

impl PathGeneratorSpec {
    /// Sequence dimension `n_factors * n_steps`.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.n_factors * self.n_steps
    }
}

/// `(step, factor)` for every sequence dimension, in dimension order.
fn dimension_map(ordering: Ordering, n_steps: usize, n_factors: usize) -> Vec<(usize, usize)> {
    match ordering {
        Ordering::Factors => (0..n_factors)
            .flat_map(|f| (0..n_steps).map(move |s| (s, f)))
            .collect(),
        Ordering::Steps => (0..n_steps)
            .flat_map(|s| (0..n_factors).map(move |f| (s, f)))
            .collect(),
        Ordering::Diagonal => {
            let mut map = Vec::with_capacity(n_steps * n_factors);
            for diag in 0..(n_steps + n_factors).saturating_sub(1) {
                for f in 0..n_factors.min(diag + 1) {
                    let s = diag - f;
                    if s < n_steps {
                        map.push((s, f));
                    }
                }
            }
            map
        }
    }
}

// ============================================================================
// Tensor
// ============================================================================

/// Standard normals indexed by `(path, step, factor)`, path-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTensor {
    n_paths: usize,
    n_steps: usize,
    n_factors: usize,
    data: Vec<f64>,
}

impl PathTensor {
    /// Number of paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Number of time steps.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of factors.
    #[inline]
    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    /// Variate for `path` at `step` on `factor`.
    #[inline]
    pub fn get(&self, path: usize, step: usize, factor: usize) -> f64 {
        self.data[(path * self.n_steps + step) * self.n_factors + factor]
    }

    /// All variates of one path, laid out `[step][factor]`.
    #[inline]
    pub fn path(&self, path: usize) -> &[f64] {
        let width = self.n_steps * self.n_factors;
        &self.data[path * width..(path + 1) * width]
    }

    /// Variates of `(step, factor)` across all paths.
    pub fn slice(&self, step: usize, factor: usize) -> Vec<f64> {
        (0..self.n_paths).map(|p| self.get(p, step, factor)).collect()
    }

    /// [`slice`](Self::slice) as a stochastic operand, ready for binding.
    pub fn random_variable(&self, step: usize, factor: usize) -> RandomVariable {
        RandomVariable::from_vec(self.slice(step, factor))
    }

    /// Raw path-major buffer.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Debug, Clone)]
enum DrawSource {
    Pseudo(PricerRng),
    Sobol(SobolSequence),
}

/// Stateful cursor producing one path draw at a time.
///
/// Not shared between threads; a run consumes one generator.
#[derive(Debug, Clone)]
pub struct PathGenerator {
    spec: PathGeneratorSpec,
    source: DrawSource,
    dimensions: Vec<(usize, usize)>,
    bridge: Option<BrownianBridge>,
    sequence_buffer: Vec<f64>,
    bridge_in: Vec<f64>,
    bridge_out: Vec<f64>,
    draw: Vec<f64>,
    draws: u64,
}

impl PathGenerator {
    /// Creates a generator for `spec`.
    ///
    /// # Errors
    ///
    /// - [`RngError::TooManyDimensions`] for Sobol sequences beyond the
    ///   supported dimension
    /// - [`RngError::InvalidStepTimes`] if `step_times` is given but is not
    ///   `n_steps` strictly increasing positive times
    pub fn new(spec: &PathGeneratorSpec) -> Result<Self, RngError> {
        let dim = spec.dimension();
        if !spec.step_times.is_empty() {
            let increasing = spec
                .step_times
                .iter()
                .try_fold(0.0, |prev, &t| (t > prev && t.is_finite()).then_some(t))
                .is_some();
            if spec.step_times.len() != spec.n_steps || !increasing {
                return Err(RngError::InvalidStepTimes {
                    n_steps: spec.n_steps,
                    times: spec.step_times.len(),
                });
            }
        }
        let source = match spec.sequence {
            SequenceType::PseudoRandom | SequenceType::PseudoRandomAntithetic => {
                DrawSource::Pseudo(PricerRng::from_seed(spec.seed))
            }
            SequenceType::Sobol | SequenceType::SobolBrownianBridge => {
                DrawSource::Sobol(SobolSequence::new(dim, spec.seed)?)
            }
        };
        let bridge = (spec.sequence == SequenceType::SobolBrownianBridge).then(|| {
            if spec.step_times.is_empty() {
                BrownianBridge::new(spec.n_steps)
            } else {
                BrownianBridge::with_times(&spec.step_times)
            }
        });

        Ok(Self {
            spec: spec.clone(),
            source,
            dimensions: dimension_map(spec.ordering, spec.n_steps, spec.n_factors),
            bridge,
            sequence_buffer: vec![0.0; dim],
            bridge_in: vec![0.0; spec.n_steps],
            bridge_out: vec![0.0; spec.n_steps],
            draw: vec![0.0; dim],
            draws: 0,
        })
    }

    /// Settings the generator was built from.
    #[inline]
    pub fn spec(&self) -> &PathGeneratorSpec {
        &self.spec
    }

    /// Next path draw, laid out `[step][factor]`.
    pub fn next_draw(&mut self) -> &[f64] {
        let antithetic_twin = self.spec.sequence == SequenceType::PseudoRandomAntithetic
            && self.draws % 2 == 1;
        self.draws += 1;

        if antithetic_twin {
            self.draw.iter_mut().for_each(|x| *x = -*x);
            return &self.draw;
        }

        match &mut self.source {
            DrawSource::Pseudo(rng) => rng.fill_normal(&mut self.sequence_buffer),
            DrawSource::Sobol(seq) => {
                for (out, &u) in self.sequence_buffer.iter_mut().zip(seq.next_point()) {
                    *out = inverse_cumulative_normal(u);
                }
            }
        }

        let n_factors = self.spec.n_factors;
        match &self.bridge {
            None => {
                for (&z, &(s, f)) in self.sequence_buffer.iter().zip(&self.dimensions) {
                    self.draw[s * n_factors + f] = z;
                }
            }
            Some(bridge) => {
                // the "step" of a dimension is its rank in the bridge
                for f in 0..n_factors {
                    for (&z, &(rank, factor)) in self.sequence_buffer.iter().zip(&self.dimensions) {
                        if factor == f {
                            self.bridge_in[rank] = z;
                        }
                    }
                    bridge.transform(&self.bridge_in, &mut self.bridge_out);
                    for (s, &z) in self.bridge_out.iter().enumerate() {
                        self.draw[s * n_factors + f] = z;
                    }
                }
            }
        }
        &self.draw
    }
}

/// Generates `n_paths` draws for `spec`.
///
/// Identical arguments give a bit-identical tensor.
///
/// # Errors
///
/// - [`RngError::NoPaths`] if `n_paths == 0`
/// - [`RngError::TooManyDimensions`] from the Sobol generator
///
/// # Examples
///
/// ```rust
/// use pricer_models::rng::{generate_paths, Ordering, PathGeneratorSpec, SequenceType};
///
/// let spec = PathGeneratorSpec {
///     sequence: SequenceType::PseudoRandomAntithetic,
///     n_factors: 2,
///     n_steps: 3,
///     seed: 42,
///     ordering: Ordering::Steps,
///     step_times: Vec::new(),
/// };
/// let paths = generate_paths(&spec, 4).unwrap();
/// assert_eq!(paths.get(1, 2, 1), -paths.get(0, 2, 1));
/// ```
pub fn generate_paths(spec: &PathGeneratorSpec, n_paths: usize) -> Result<PathTensor, RngError> {
    if n_paths == 0 {
        return Err(RngError::NoPaths);
    }
    debug!(
        sequence = ?spec.sequence,
        ordering = ?spec.ordering,
        n_paths,
        n_steps = spec.n_steps,
        n_factors = spec.n_factors,
        seed = spec.seed,
        "Generating path tensor"
    );

    let mut generator = PathGenerator::new(spec)?;
    let mut data = Vec::with_capacity(n_paths * spec.dimension());
    for _ in 0..n_paths {
        data.extend_from_slice(generator.next_draw());
    }

    Ok(PathTensor {
        n_paths,
        n_steps: spec.n_steps,
        n_factors: spec.n_factors,
        data,
    })
}
