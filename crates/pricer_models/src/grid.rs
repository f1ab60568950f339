//! Simulation date grid.
//!
//! Exposure dates are the dates trades are valued on. The model itself may
//! step more finely: with `time_steps_per_year > 0` every interval between
//! consecutive exposure dates is split into equal Euler sub-steps, the
//! count rounded to the nearest integer and at least one.
//!
//! Year fractions are ACT/365F from the reference date.

use chrono::{Days, Months, NaiveDate};

use crate::error::{ModelError, ModelResult};

/// ACT/365F year fraction, negative when `end < start`.
#[inline]
pub fn year_fraction(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / 365.0
}

/// Adds a tenor such as `"10D"`, `"2W"`, `"6M"` or `"5Y"` to `date`.
///
/// # Errors
///
/// [`ModelError::InvalidGrid`] for malformed tenors or date overflow.
pub fn add_tenor(date: NaiveDate, tenor: &str) -> ModelResult<NaiveDate> {
    let tenor = tenor.trim();
    let invalid = || ModelError::InvalidGrid(format!("cannot apply tenor '{}' to {}", tenor, date));
    let split = tenor.len().checked_sub(1).ok_or_else(invalid)?;
    if !tenor.is_char_boundary(split) {
        return Err(invalid());
    }
    let (count, unit) = tenor.split_at(split);
    let n: u32 = count.parse().map_err(|_| invalid())?;
    let shifted = match unit.to_ascii_uppercase().as_str() {
        "D" => date.checked_add_days(Days::new(u64::from(n))),
        "W" => date.checked_add_days(Days::new(7 * u64::from(n))),
        "M" => date.checked_add_months(Months::new(n)),
        "Y" => n.checked_mul(12).and_then(|m| date.checked_add_months(Months::new(m))),
        _ => None,
    };
    shifted.ok_or_else(invalid)
}

/// Exposure dates plus the model's time-stepping.
///
/// # Examples
///
/// ```rust
/// use chrono::NaiveDate;
/// use pricer_models::SimulationGrid;
///
/// let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
/// let grid = SimulationGrid::from_tenors(today, &["6M", "1Y"], 4).unwrap();
/// assert_eq!(grid.dates().len(), 2);
/// // two quarterly sub-steps per half year
/// assert_eq!(grid.n_steps(), 4);
/// assert_eq!(grid.state_index(grid.dates()[0]).unwrap(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationGrid {
    reference_date: NaiveDate,
    dates: Vec<NaiveDate>,
    times: Vec<f64>,
    step_times: Vec<f64>,
    date_states: Vec<usize>,
}

impl SimulationGrid {
    /// Builds a grid from strictly increasing `dates` after `reference_date`.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidGrid`] for an empty or unordered date list.
    pub fn new(
        reference_date: NaiveDate,
        dates: Vec<NaiveDate>,
        time_steps_per_year: usize,
    ) -> ModelResult<Self> {
        if dates.is_empty() {
            return Err(ModelError::InvalidGrid("no simulation dates".to_string()));
        }
        let mut prev = reference_date;
        for &d in &dates {
            if d <= prev {
                return Err(ModelError::InvalidGrid(format!(
                    "date {} does not follow {}",
                    d, prev
                )));
            }
            prev = d;
        }

        let times: Vec<f64> = dates.iter().map(|&d| year_fraction(reference_date, d)).collect();
        let mut step_times = Vec::with_capacity(dates.len());
        let mut date_states = Vec::with_capacity(dates.len());
        let mut t_prev = 0.0;
        for &t in &times {
            let sub_steps = if time_steps_per_year == 0 {
                1
            } else {
                (((t - t_prev) * time_steps_per_year as f64).round() as usize).max(1)
            };
            let dt = (t - t_prev) / sub_steps as f64;
            for k in 1..sub_steps {
                step_times.push(t_prev + k as f64 * dt);
            }
            step_times.push(t);
            date_states.push(step_times.len());
            t_prev = t;
        }

        Ok(Self {
            reference_date,
            dates,
            times,
            step_times,
            date_states,
        })
    }

    /// Builds a grid from tenors relative to `reference_date`.
    pub fn from_tenors<S: AsRef<str>>(
        reference_date: NaiveDate,
        tenors: &[S],
        time_steps_per_year: usize,
    ) -> ModelResult<Self> {
        let dates = tenors
            .iter()
            .map(|t| add_tenor(reference_date, t.as_ref()))
            .collect::<ModelResult<Vec<_>>>()?;
        Self::new(reference_date, dates, time_steps_per_year)
    }

    /// Valuation date of the run (time zero).
    #[inline]
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Exposure dates, excluding the reference date.
    #[inline]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Year fractions of [`dates`](Self::dates).
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// End time of every model step, including sub-steps.
    #[inline]
    pub fn step_times(&self) -> &[f64] {
        &self.step_times
    }

    /// Number of model steps; the path generator's step dimension.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.step_times.len()
    }

    /// Start and end time of model step `step`.
    pub fn step_interval(&self, step: usize) -> (f64, f64) {
        let start = if step == 0 { 0.0 } else { self.step_times[step - 1] };
        (start, self.step_times[step])
    }

    /// Year fraction from the reference date.
    #[inline]
    pub fn time(&self, date: NaiveDate) -> f64 {
        year_fraction(self.reference_date, date)
    }

    /// Position of `date` in [`dates`](Self::dates).
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Model state index of `date`: 0 for the reference date, otherwise the
    /// number of steps taken to reach it.
    ///
    /// # Errors
    ///
    /// [`ModelError::DateNotOnGrid`] for any other date.
    pub fn state_index(&self, date: NaiveDate) -> ModelResult<usize> {
        if date == self.reference_date {
            return Ok(0);
        }
        self.date_index(date)
            .map(|i| self.date_states[i])
            .ok_or(ModelError::DateNotOnGrid(date))
    }
}
