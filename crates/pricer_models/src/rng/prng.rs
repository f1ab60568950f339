//! Seeded pseudo-random generator used for `PseudoRandom` path sequences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Seeded, reproducible pseudo-random generator.
///
/// Normals are drawn with the Ziggurat algorithm of
/// `rand_distr::StandardNormal`.
///
/// # Examples
///
/// ```rust
/// use pricer_models::rng::PricerRng;
///
/// let mut a = PricerRng::from_seed(12345);
/// let mut b = PricerRng::from_seed(12345);
/// assert_eq!(a.gen_normal(), b.gen_normal());
/// ```
#[derive(Debug, Clone)]
pub struct PricerRng {
    inner: StdRng,
    seed: u64,
}

impl PricerRng {
    /// Creates a generator initialised with `seed`.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform variate in `[0, 1)`.
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Standard normal variate.
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }

    /// Fills `buffer` with standard normal variates. Empty buffers are a no-op.
    #[inline]
    pub fn fill_normal(&mut self, buffer: &mut [f64]) {
        for x in buffer.iter_mut() {
            *x = StandardNormal.sample(&mut self.inner);
        }
    }
}
