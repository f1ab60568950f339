//! European option valued by conditional expectation.
//!
//! The deflated payoff `q * max(w * (S_E - K), 0) / N(E)` is regressed on
//! the model state at each valuation date before expiry and rescaled by the
//! numeraire there. On the expiry date the payoff itself is the value;
//! afterwards the trade is dead.

use chrono::NaiveDate;
use pricer_graph::graph::{cg_div, cg_max, cg_mult, cg_sub};
use pricer_graph::{ComputationGraph, NodeIndex};
use pricer_models::models::CgModel;

use super::{valuation_dates, TradeGraphContributor};
use crate::error::TradeError;
use crate::portfolio::{OptionTerms, OptionType};

/// European call or put on one simulated equity.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pricer_xva::portfolio::{OptionTerms, OptionType};
/// use pricer_xva::trade::{EuropeanOption, TradeGraphContributor};
///
/// let terms = OptionTerms {
///     underlying: "SX5E".to_string(),
///     strike: 100.0,
///     expiry: NaiveDate::from_ymd_opt(2027, 1, 4).unwrap(),
///     option_type: OptionType::Put,
///     quantity: -10.0,
/// };
/// let option = EuropeanOption::new("PUT1", terms.clone()).unwrap();
/// assert_eq!(option.trade_id(), "PUT1");
///
/// let negative_strike = OptionTerms { strike: -1.0, ..terms };
/// assert!(EuropeanOption::new("PUT2", negative_strike).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct EuropeanOption {
    id: String,
    terms: OptionTerms,
}

impl EuropeanOption {
    /// Validates the terms.
    pub fn new(id: impl Into<String>, terms: OptionTerms) -> Result<Self, TradeError> {
        if !terms.strike.is_finite() || terms.strike < 0.0 {
            return Err(TradeError::Invalid(format!("invalid strike {}", terms.strike)));
        }
        if !terms.quantity.is_finite() {
            return Err(TradeError::Invalid("non-finite quantity".to_string()));
        }
        Ok(Self {
            id: id.into(),
            terms,
        })
    }

    /// Option terms.
    pub fn terms(&self) -> &OptionTerms {
        &self.terms
    }

    fn payoff(&self, graph: &mut ComputationGraph, spot: NodeIndex) -> Result<NodeIndex, TradeError> {
        let strike = graph.constant(self.terms.strike);
        let intrinsic = match self.terms.option_type {
            OptionType::Call => cg_sub(graph, spot, strike)?,
            OptionType::Put => cg_sub(graph, strike, spot)?,
        };
        let zero = graph.constant(0.0);
        let positive = cg_max(graph, intrinsic, zero)?;
        let quantity = graph.constant(self.terms.quantity);
        Ok(cg_mult(graph, quantity, positive)?)
    }
}

impl TradeGraphContributor for EuropeanOption {
    fn trade_id(&self) -> &str {
        &self.id
    }

    fn append_nodes(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
    ) -> Result<Vec<NodeIndex>, TradeError> {
        let expiry = self.terms.expiry;
        if expiry < model.grid().reference_date() {
            return Err(TradeError::Invalid(format!(
                "expiry {} precedes the reference date",
                expiry
            )));
        }

        let spot = model.spot(&self.terms.underlying, expiry)?;
        let payoff = self.payoff(graph, spot)?;
        let numeraire = model.numeraire(expiry)?;
        let deflated = cg_div(graph, payoff, numeraire)?;

        let dates: Vec<NaiveDate> = valuation_dates(model);
        let mut outputs = Vec::with_capacity(dates.len());
        for date in dates {
            let node = if date < expiry {
                let expected = model.npv(graph, deflated, date)?;
                let numeraire = model.numeraire(date)?;
                cg_mult(graph, expected, numeraire)?
            } else if date == expiry {
                payoff
            } else {
                graph.constant(0.0)
            };
            outputs.push(node);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(strike: f64) -> OptionTerms {
        OptionTerms {
            underlying: "SPX".to_string(),
            strike,
            expiry: NaiveDate::from_ymd_opt(2027, 1, 4).unwrap(),
            option_type: OptionType::Call,
            quantity: 1.0,
        }
    }

    #[test]
    fn test_rejects_bad_strike() {
        assert!(EuropeanOption::new("O", terms(-1.0)).is_err());
        assert!(EuropeanOption::new("O", terms(f64::NAN)).is_err());
        assert_eq!(EuropeanOption::new("O", terms(100.0)).unwrap().trade_id(), "O");
    }
}
