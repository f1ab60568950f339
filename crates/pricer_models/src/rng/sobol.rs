//! Scrambled Sobol low-discrepancy sequence.
//!
//! Gray-code construction (Antonov-Saleev): point `k` is the XOR of the
//! direction numbers selected by the bits of `k ^ (k >> 1)`. Dimension zero
//! uses the canonical van der Corput direction numbers; higher dimensions use
//! seeded odd direction integers and each dimension carries a digital-shift
//! scrambler derived from the seed.

use crate::error::RngError;

/// Largest supported dimension count.
pub const SOBOL_MAX_DIMENSIONS: usize = 21_201;

const INV_2_53: f64 = 1.0 / 9_007_199_254_740_992.0;

/// Interface shared by low-discrepancy generators.
pub trait LowDiscrepancySequence {
    /// Number of coordinates per point.
    fn dimension(&self) -> usize;

    /// Advances the sequence and returns the next point, every coordinate in
    /// the open interval `(0, 1)`.
    fn next_point(&mut self) -> &[f64];

    /// Rewinds to the initial state.
    fn reset(&mut self);

    /// Skips `n` points.
    fn skip(&mut self, n: usize);
}

/// Scrambled Sobol sequence of fixed dimension.
///
/// # Examples
///
/// ```rust
/// use pricer_models::rng::{LowDiscrepancySequence, SobolSequence};
///
/// let mut seq = SobolSequence::new(3, 42).unwrap();
/// let p = seq.next_point().to_vec();
/// assert_eq!(p.len(), 3);
/// assert!(p.iter().all(|&u| u > 0.0 && u < 1.0));
/// ```
#[derive(Debug, Clone)]
pub struct SobolSequence {
    index: u64,
    x: Vec<u64>,
    directions: Vec<[u64; 64]>,
    scramblers: Vec<u64>,
    point: Vec<f64>,
}

impl SobolSequence {
    /// Creates a sequence of `dimensions` coordinates scrambled with `seed`.
    ///
    /// # Errors
    ///
    /// [`RngError::TooManyDimensions`] above [`SOBOL_MAX_DIMENSIONS`].
    pub fn new(dimensions: usize, seed: u64) -> Result<Self, RngError> {
        if dimensions > SOBOL_MAX_DIMENSIONS {
            return Err(RngError::TooManyDimensions {
                requested: dimensions,
                max: SOBOL_MAX_DIMENSIONS,
            });
        }

        let directions = (0..dimensions as u64)
            .map(|d| direction_numbers(d, seed))
            .collect();
        let scramblers = (0..dimensions as u64)
            .map(|d| splitmix64(seed ^ ((d + 1) << 32)))
            .collect();

        Ok(Self {
            index: 0,
            x: vec![0; dimensions],
            directions,
            scramblers,
            point: vec![0.0; dimensions],
        })
    }

    /// Index of the last point produced (zero before the first call).
    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    fn write_point(&mut self) {
        for ((out, &x), &s) in self.point.iter_mut().zip(&self.x).zip(&self.scramblers) {
            // top 53 bits, offset by half a unit to stay inside (0, 1)
            *out = (((x ^ s) >> 11) as f64 + 0.5) * INV_2_53;
        }
    }
}

impl LowDiscrepancySequence for SobolSequence {
    #[inline]
    fn dimension(&self) -> usize {
        self.x.len()
    }

    fn next_point(&mut self) -> &[f64] {
        // wraps after 2^64 - 1 points
        self.index = self.index.wrapping_add(1);
        let c = (self.index.trailing_zeros() as usize).min(63);
        for (x, v) in self.x.iter_mut().zip(&self.directions) {
            *x ^= v[c];
        }
        self.write_point();
        &self.point
    }

    fn reset(&mut self) {
        self.index = 0;
        self.x.iter_mut().for_each(|x| *x = 0);
    }

    fn skip(&mut self, n: usize) {
        self.index = self.index.wrapping_add(n as u64);
        let gray = self.index ^ (self.index >> 1);
        for (x, v) in self.x.iter_mut().zip(&self.directions) {
            *x = (0..64)
                .filter(|b| gray & (1u64 << b) != 0)
                .fold(0, |acc, b| acc ^ v[b]);
        }
    }
}

fn direction_numbers(dim: u64, seed: u64) -> [u64; 64] {
    let mut v = [0u64; 64];
    if dim == 0 {
        for (j, item) in v.iter_mut().enumerate() {
            *item = 1u64 << (63 - j);
        }
        return v;
    }
    for (j, item) in v.iter_mut().enumerate() {
        let hash = splitmix64(seed ^ ((dim + 1) << 40) ^ j as u64);
        let mask = if j == 63 { u64::MAX } else { (1u64 << (j + 1)) - 1 };
        *item = ((hash | 1) & mask) << (63 - j);
    }
    v
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
