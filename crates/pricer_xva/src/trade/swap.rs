//! Single-curve vanilla swap valued pathwise from model discount bonds.
//!
//! At valuation date `v` the receive-floating leg is worth
//!
//! ```text
//! P(v, S) - P(v, T_n) + c * P(v, T_i)
//! ```
//!
//! where `S` is the first floating accrual start after `v` and `c` the
//! coupon of a period in progress `[T_{i-1}, T_i]`. That coupon is fixed
//! from the bonds observed at the latest valuation date on or before its
//! reset; periods reset before the reference date use the reference date.
//! The fixed leg is `K * sum(tau_j * P(v, T_j))` over the remaining payments.

use chrono::NaiveDate;
use pricer_graph::graph::{cg_div, cg_mult, cg_sub, cg_sum};
use pricer_graph::{ComputationGraph, NodeIndex};
use pricer_models::grid::{add_tenor, year_fraction};
use pricer_models::models::CgModel;

use super::{valuation_dates, TradeGraphContributor};
use crate::error::TradeError;
use crate::portfolio::SwapTerms;

/// Accrual dates from `start` to `maturity` with a short final stub.
fn schedule(start: NaiveDate, maturity: NaiveDate, tenor: &str) -> Result<Vec<NaiveDate>, TradeError> {
    let mut dates = vec![start];
    let mut k = 1;
    loop {
        let next = add_tenor(start, &scale_tenor(tenor, k)?)?;
        let last = dates[dates.len() - 1];
        if next <= last {
            return Err(TradeError::Invalid(format!("tenor '{}' does not advance", tenor)));
        }
        if next >= maturity {
            dates.push(maturity);
            return Ok(dates);
        }
        dates.push(next);
        k += 1;
    }
}

/// `k` times a tenor such as `"6M"`, rolled from the start date to avoid
/// month-end drift.
fn scale_tenor(tenor: &str, k: u32) -> Result<String, TradeError> {
    let tenor = tenor.trim();
    let invalid = || TradeError::Invalid(format!("malformed tenor '{}'", tenor));
    let unit = tenor.chars().last().ok_or_else(invalid)?;
    let count: u32 = tenor[..tenor.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    Ok(format!("{}{}", count.checked_mul(k).ok_or_else(invalid)?, unit))
}

/// Fixed-for-floating swap contributor.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pricer_xva::portfolio::SwapTerms;
/// use pricer_xva::trade::VanillaSwap;
///
/// let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
/// let swap = VanillaSwap::new(
///     "SWP",
///     SwapTerms {
///         notional: 1e6,
///         fixed_rate: 0.02,
///         pay_fixed: true,
///         start: date(2026, 1, 2),
///         maturity: date(2027, 10, 2),
///         fixed_tenor: "1Y".to_string(),
///         float_tenor: "6M".to_string(),
///     },
/// )
/// .unwrap();
///
/// // short final stubs on both legs
/// assert_eq!(swap.fixed_dates(), &[date(2026, 1, 2), date(2027, 1, 2), date(2027, 10, 2)]);
/// assert_eq!(swap.float_dates().len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct VanillaSwap {
    id: String,
    terms: SwapTerms,
    fixed_dates: Vec<NaiveDate>,
    float_dates: Vec<NaiveDate>,
}

impl VanillaSwap {
    /// Validates the terms and builds both schedules.
    pub fn new(id: impl Into<String>, terms: SwapTerms) -> Result<Self, TradeError> {
        if !terms.notional.is_finite() || !terms.fixed_rate.is_finite() {
            return Err(TradeError::Invalid("non-finite notional or rate".to_string()));
        }
        if terms.maturity <= terms.start {
            return Err(TradeError::Invalid(format!(
                "maturity {} is not after start {}",
                terms.maturity, terms.start
            )));
        }
        let fixed_dates = schedule(terms.start, terms.maturity, &terms.fixed_tenor)?;
        let float_dates = schedule(terms.start, terms.maturity, &terms.float_tenor)?;
        Ok(Self {
            id: id.into(),
            terms,
            fixed_dates,
            float_dates,
        })
    }

    /// Fixed leg payment dates including the start date.
    pub fn fixed_dates(&self) -> &[NaiveDate] {
        &self.fixed_dates
    }

    /// Floating leg accrual dates including the start date.
    pub fn float_dates(&self) -> &[NaiveDate] {
        &self.float_dates
    }

    /// Receive-fixed value per unit notional at `date`.
    fn fixed_leg(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
        date: NaiveDate,
    ) -> Result<NodeIndex, TradeError> {
        let mut terms = Vec::new();
        for w in self.fixed_dates.windows(2) {
            if w[1] <= date {
                continue;
            }
            let bond = model.discount_bond(graph, date, w[1])?;
            let accrual = graph.constant(self.terms.fixed_rate * year_fraction(w[0], w[1]));
            terms.push(cg_mult(graph, accrual, bond)?);
        }
        Ok(cg_sum(graph, &terms)?)
    }

    /// Receive-floating value per unit notional at `date`.
    fn float_leg(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
        date: NaiveDate,
        observations: &[NaiveDate],
    ) -> Result<NodeIndex, TradeError> {
        let mut terms = Vec::new();

        if let Some(w) = self.float_dates.windows(2).find(|w| w[0] < date && date < w[1]) {
            let fixing = observations
                .iter()
                .rev()
                .find(|&&d| d <= w[0])
                .copied()
                .unwrap_or(observations[0]);
            let p_start = model.discount_bond(graph, fixing, w[0])?;
            let p_end = model.discount_bond(graph, fixing, w[1])?;
            let one = graph.constant(1.0);
            let growth = cg_div(graph, p_start, p_end)?;
            let coupon = cg_sub(graph, growth, one)?;
            let pay = model.discount_bond(graph, date, w[1])?;
            terms.push(cg_mult(graph, coupon, pay)?);
        }

        if let Some(&next_start) = self.float_dates[..self.float_dates.len() - 1]
            .iter()
            .find(|&&d| d >= date)
        {
            let p_start = model.discount_bond(graph, date, next_start)?;
            let p_end = model.discount_bond(graph, date, self.terms.maturity)?;
            terms.push(cg_sub(graph, p_start, p_end)?);
        }

        Ok(cg_sum(graph, &terms)?)
    }
}

impl TradeGraphContributor for VanillaSwap {
    fn trade_id(&self) -> &str {
        &self.id
    }

    fn append_nodes(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
    ) -> Result<Vec<NodeIndex>, TradeError> {
        let dates = valuation_dates(model);
        let sign = if self.terms.pay_fixed { 1.0 } else { -1.0 };
        let scale = graph.constant(sign * self.terms.notional);

        let mut outputs = Vec::with_capacity(dates.len());
        for &date in &dates {
            if date >= self.terms.maturity {
                outputs.push(graph.constant(0.0));
                continue;
            }
            let float = self.float_leg(graph, model, date, &dates)?;
            let fixed = self.fixed_leg(graph, model, date)?;
            let npv = cg_sub(graph, float, fixed)?;
            outputs.push(cg_mult(graph, scale, npv)?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_schedule_with_stub() {
        let s = schedule(d(2026, 1, 31), d(2027, 3, 15), "6M").unwrap();
        assert_eq!(s, vec![d(2026, 1, 31), d(2026, 7, 31), d(2027, 1, 31), d(2027, 3, 15)]);
    }

    #[test]
    fn test_schedule_rolls_from_start() {
        let s = schedule(d(2026, 1, 31), d(2026, 5, 31), "1M").unwrap();
        assert_eq!(s[2], d(2026, 3, 31));
        assert_eq!(s.last(), Some(&d(2026, 5, 31)));
    }

    #[test]
    fn test_invalid_terms() {
        let terms = SwapTerms {
            notional: 1.0,
            fixed_rate: 0.02,
            pay_fixed: true,
            start: d(2026, 1, 2),
            maturity: d(2026, 1, 2),
            fixed_tenor: "1Y".to_string(),
            float_tenor: "6M".to_string(),
        };
        assert!(VanillaSwap::new("S", terms.clone()).is_err());

        let bad_tenor = SwapTerms {
            maturity: d(2030, 1, 2),
            float_tenor: "0M".to_string(),
            ..terms
        };
        assert!(matches!(VanillaSwap::new("S", bad_tenor), Err(TradeError::Invalid(_))));
    }
}
