//! Exposure statistics over simulated values.
//!
//! Given one [`RandomVariable`] per valuation date (reference date first),
//! computes per date:
//!
//! - Expected value `E[V(t)]`
//! - Expected Positive Exposure `EPE(t) = E[max(V(t), 0)]`
//! - Expected Negative Exposure `ENE(t) = E[max(-V(t), 0)]`
//! - Potential Future Exposure at a confidence level
//!
//! plus the time-weighted average of the EPE profile.

use chrono::NaiveDate;
use pricer_graph::RandomVariable;
use pricer_models::grid::year_fraction;
use rayon::prelude::*;

/// Mean of `f` over the paths of `value`.
fn path_mean<F>(value: &RandomVariable, f: F) -> f64
where
    F: Fn(f64) -> f64,
{
    match value.deterministic_value() {
        Some(v) => f(v),
        None if value.size() == 0 => 0.0,
        None => (0..value.size()).map(|i| f(value.at(i))).sum::<f64>() / value.size() as f64,
    }
}

/// Per-date exposure profile of a trade or netting set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExposureProfile {
    /// Valuation dates, reference date first.
    pub dates: Vec<NaiveDate>,
    /// ACT/365F year fractions from the reference date.
    pub times: Vec<f64>,
    /// `E[V(t)]`
    pub expected_value: Vec<f64>,
    /// `E[max(V(t), 0)]`
    pub epe: Vec<f64>,
    /// `E[max(-V(t), 0)]`
    pub ene: Vec<f64>,
}

impl ExposureProfile {
    /// Computes the profile from one value per date.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use pricer_graph::RandomVariable;
    /// use pricer_xva::exposure::ExposureProfile;
    ///
    /// let dates = [
    ///     NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
    ///     NaiveDate::from_ymd_opt(2027, 1, 2).unwrap(),
    /// ];
    /// let values = [
    ///     RandomVariable::new(3, 1.0),
    ///     RandomVariable::from_vec(vec![10.0, -5.0, 3.0]),
    /// ];
    ///
    /// let profile = ExposureProfile::from_values(&dates, &values);
    /// assert_eq!(profile.expected_value, vec![1.0, 8.0 / 3.0]);
    /// assert_eq!(profile.epe[1], 13.0 / 3.0);
    /// assert_eq!(profile.ene[1], 5.0 / 3.0);
    /// ```
    ///
    /// No dates give an empty profile.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ.
    pub fn from_values(dates: &[NaiveDate], values: &[RandomVariable]) -> Self {
        assert_eq!(dates.len(), values.len(), "one value per date");
        let Some(&reference) = dates.first() else {
            return Self::default();
        };

        let stats: Vec<(f64, f64, f64)> = values
            .par_iter()
            .map(|v| {
                (
                    path_mean(v, |x| x),
                    path_mean(v, |x| x.max(0.0)),
                    path_mean(v, |x| (-x).max(0.0)),
                )
            })
            .collect();

        Self {
            dates: dates.to_vec(),
            times: dates.iter().map(|&d| year_fraction(reference, d)).collect(),
            expected_value: stats.iter().map(|s| s.0).collect(),
            epe: stats.iter().map(|s| s.1).collect(),
            ene: stats.iter().map(|s| s.2).collect(),
        }
    }

    /// Number of dates.
    #[inline]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns `true` if the profile has no dates.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Time-weighted average of EPE, trapezoidal over the dates.
    pub fn time_weighted_epe(&self) -> f64 {
        time_weighted_average(&self.epe, &self.times)
    }

    /// Largest EPE over the profile.
    pub fn peak_epe(&self) -> f64 {
        self.epe.iter().copied().fold(0.0_f64, f64::max)
    }
}

/// `(1/T) * integral of profile dt` with trapezoidal weights.
pub fn time_weighted_average(profile: &[f64], times: &[f64]) -> f64 {
    if times.len() < 2 || profile.len() != times.len() {
        return profile.first().copied().unwrap_or(0.0);
    }

    let integral: f64 = times
        .windows(2)
        .zip(profile.windows(2))
        .map(|(t, v)| 0.5 * (v[0] + v[1]) * (t[1] - t[0]))
        .sum();

    let total_time = times[times.len() - 1] - times[0];
    if total_time > 0.0 {
        integral / total_time
    } else {
        profile[0]
    }
}

/// Potential Future Exposure per date: the `confidence` quantile of
/// `max(V(t), 0)` over paths.
pub fn potential_future_exposure(values: &[RandomVariable], confidence: f64) -> Vec<f64> {
    let confidence = confidence.clamp(0.0, 1.0);
    values
        .par_iter()
        .map(|v| {
            if v.size() == 0 {
                return 0.0;
            }
            let mut exposures: Vec<f64> = v.to_vec().into_iter().map(|x| x.max(0.0)).collect();
            exposures.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let idx = ((exposures.len() as f64 - 1.0) * confidence).round() as usize;
            exposures[idx.min(exposures.len() - 1)]
        })
        .collect()
}

/// Path-wise sum of several trades' values per date.
///
/// # Panics
///
/// Panics if the trades disagree on the number of dates or paths.
pub fn net_values(trades: &[&[RandomVariable]]) -> Vec<RandomVariable> {
    let Some(first) = trades.first() else {
        return Vec::new();
    };
    (0..first.len())
        .map(|d| {
            let n = first[d].size();
            let mut total = vec![0.0; n];
            for trade in trades {
                let value = &trade[d];
                assert_eq!(value.size(), n, "path count mismatch");
                for (i, slot) in total.iter_mut().enumerate() {
                    *slot += value.at(i);
                }
            }
            RandomVariable::from_vec(total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(73 * i as i64))
            .collect()
    }

    #[test]
    fn test_profile_statistics() {
        let values = vec![
            RandomVariable::from_vec(vec![10.0, 5.0, -5.0]),
            RandomVariable::from_vec(vec![20.0, -10.0, 15.0]),
            RandomVariable::from_vec(vec![15.0, 25.0, 10.0]),
        ];
        let profile = ExposureProfile::from_values(&dates(3), &values);

        assert_relative_eq!(profile.epe[0], 5.0, epsilon = 1e-10);
        assert_relative_eq!(profile.epe[1], 35.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(profile.epe[2], 50.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(profile.ene[1], 10.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(profile.expected_value[1], 25.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(profile.times[2], 146.0 / 365.0, epsilon = 1e-14);
        assert_relative_eq!(profile.peak_epe(), 50.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_empty_profile() {
        let profile = ExposureProfile::from_values(&[], &[]);
        assert!(profile.is_empty());
        assert_eq!(profile.len(), 0);
        assert_eq!(profile.peak_epe(), 0.0);
        assert_eq!(profile.time_weighted_epe(), 0.0);
    }

    #[test]
    fn test_time_weighted_average() {
        let epe = [0.0, 10.0, 20.0, 15.0, 5.0];
        let times = [0.0, 0.25, 0.5, 0.75, 1.0];
        assert_relative_eq!(time_weighted_average(&epe, &times), 11.875, epsilon = 1e-10);
        assert_eq!(time_weighted_average(&[3.0], &[0.0]), 3.0);
    }

    #[test]
    fn test_pfe() {
        let values = [RandomVariable::from_vec(vec![10.0, 5.0, 15.0, 20.0, 25.0])];
        // sorted [5, 10, 15, 20, 25], index round(4 * 0.8) = 3
        assert_relative_eq!(potential_future_exposure(&values, 0.8)[0], 20.0);
        assert_eq!(potential_future_exposure(&[RandomVariable::new(4, -1.0)], 0.95), vec![0.0]);
    }

    #[test]
    fn test_netting() {
        let a = [RandomVariable::new(2, 10.0), RandomVariable::from_vec(vec![1.0, -2.0])];
        let b = [RandomVariable::new(2, -5.0), RandomVariable::from_vec(vec![3.0, 1.0])];
        let net = net_values(&[&a, &b]);
        assert_eq!(net[0].to_vec(), vec![5.0, 5.0]);
        assert_eq!(net[1].to_vec(), vec![4.0, -1.0]);
        assert!(net_values(&[]).is_empty());
    }
}
