//! Standard normal distribution functions used by the operator set and the
//! quasi-random path generator.
//!
//! - [`norm_cdf`]: cumulative distribution function
//! - [`norm_pdf`]: probability density function
//! - [`inverse_cumulative_normal`]: quantile function
//!
//! Non-finite inputs propagate (NaN in, NaN out) so that a bad path never
//! aborts a vectorised kernel.

/// 1 / sqrt(2 * pi)
const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Complementary error function, Abramowitz and Stegun 7.1.26.
///
/// Maximum absolute error 1.5e-7.
#[inline]
fn erfc_approx(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + P * abs_x);
    let poly = A1 + t * (A2 + t * (A3 + t * (A4 + t * A5)));
    let erfc_abs = t * poly * (-abs_x * abs_x).exp();

    if x < 0.0 {
        2.0 - erfc_abs
    } else {
        erfc_abs
    }
}

/// Standard normal cumulative distribution function.
///
/// # Example
///
/// ```rust
/// use pricer_graph::math::norm_cdf;
///
/// assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
/// assert!(norm_cdf(f64::NAN).is_nan());
/// ```
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc_approx(-x / std::f64::consts::SQRT_2)
}

/// Standard normal probability density function.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
///
/// Returns `-inf` for `p == 0`, `+inf` for `p == 1` and NaN outside `[0, 1]`.
/// Relative error is below 1.2e-9 on the open interval.
pub fn inverse_cumulative_normal(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_norm_cdf_known_values() {
        assert_abs_diff_eq!(norm_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(norm_cdf(1.0), 0.841_344_746_068_543, epsilon = 2e-7);
        assert_abs_diff_eq!(norm_cdf(-1.96), 0.024_997_895_148_220, epsilon = 2e-7);
        assert_eq!(norm_cdf(f64::INFINITY), 1.0);
        assert_eq!(norm_cdf(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_norm_pdf_peak() {
        assert_abs_diff_eq!(norm_pdf(0.0), FRAC_1_SQRT_2PI, epsilon = 1e-15);
        assert_abs_diff_eq!(norm_pdf(1.0), norm_pdf(-1.0), epsilon = 1e-15);
    }

    #[test]
    fn test_inverse_round_trip() {
        for &p in &[0.001, 0.02, 0.1, 0.5, 0.75, 0.98, 0.999] {
            let x = inverse_cumulative_normal(p);
            assert_abs_diff_eq!(norm_cdf(x), p, epsilon = 3e-7);
        }
    }

    #[test]
    fn test_inverse_edges() {
        assert_eq!(inverse_cumulative_normal(0.0), f64::NEG_INFINITY);
        assert_eq!(inverse_cumulative_normal(1.0), f64::INFINITY);
        assert!(inverse_cumulative_normal(1.5).is_nan());
        assert!(inverse_cumulative_normal(f64::NAN).is_nan());
        assert_abs_diff_eq!(inverse_cumulative_normal(0.5), 0.0, epsilon = 1e-12);
    }
}
