//! Parameters of the cross-asset model, as read from configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::correlation::CorrelationMatrix;
use super::Discretization;
use crate::error::{ModelError, ModelResult};

/// Linear Gauss-Markov interest-rate component with constant mean
/// reversion and volatility over a flat curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IrModelData {
    /// Currency code, informational.
    pub currency: String,
    /// Mean reversion speed, strictly positive.
    pub kappa: f64,
    /// Volatility of the LGM state.
    pub sigma: f64,
    /// Flat continuously compounded rate of the initial curve.
    pub rate: f64,
}

/// Lognormal equity driven by its own factor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquityModelData {
    /// Name used by trades to request the spot.
    pub name: String,
    /// Spot at the reference date.
    pub spot: f64,
    /// Lognormal volatility.
    pub vol: f64,
}

/// Full model description. Factor 0 is the rate, factor `1 + i` equity `i`.
///
/// # Examples
///
/// ```
/// use pricer_models::models::{CrossAssetModelData, IrModelData};
///
/// let data = CrossAssetModelData::rates_only(IrModelData {
///     currency: "EUR".to_string(),
///     kappa: 0.03,
///     sigma: 0.01,
///     rate: 0.02,
/// });
/// assert_eq!(data.n_factors(), 1);
/// assert!(data.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossAssetModelData {
    /// Interest-rate component.
    pub ir: IrModelData,
    /// Equity components.
    #[cfg_attr(feature = "serde", serde(default))]
    pub equities: Vec<EquityModelData>,
    /// Factor correlation rows; identity when absent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub correlation: Option<Vec<Vec<f64>>>,
    /// Time discretisation scheme.
    #[cfg_attr(feature = "serde", serde(default))]
    pub discretization: Discretization,
}

impl CrossAssetModelData {
    /// Single-factor rates model.
    pub fn rates_only(ir: IrModelData) -> Self {
        Self {
            ir,
            equities: Vec::new(),
            correlation: None,
            discretization: Discretization::default(),
        }
    }

    /// Number of Brownian factors.
    #[inline]
    pub fn n_factors(&self) -> usize {
        1 + self.equities.len()
    }

    /// Correlation matrix of the factors.
    pub fn correlation_matrix(&self) -> ModelResult<CorrelationMatrix> {
        match &self.correlation {
            Some(rows) => {
                let corr = CorrelationMatrix::from_rows(rows)?;
                if corr.dim() != self.n_factors() {
                    return Err(ModelError::Correlation(format!(
                        "{} factors but a {}x{} matrix",
                        self.n_factors(),
                        corr.dim(),
                        corr.dim()
                    )));
                }
                Ok(corr)
            }
            None => Ok(CorrelationMatrix::identity(self.n_factors())),
        }
    }

    /// Checks parameter domains and the correlation matrix.
    pub fn validate(&self) -> ModelResult<()> {
        let invalid = |name: String, reason: &str| ModelError::InvalidParameter {
            name,
            reason: reason.to_string(),
        };

        if !(self.ir.kappa.is_finite() && self.ir.kappa > 0.0) {
            return Err(invalid("ir.kappa".to_string(), "must be positive"));
        }
        if !(self.ir.sigma.is_finite() && self.ir.sigma >= 0.0) {
            return Err(invalid("ir.sigma".to_string(), "must be non-negative"));
        }
        if !self.ir.rate.is_finite() {
            return Err(invalid("ir.rate".to_string(), "must be finite"));
        }
        for (i, eq) in self.equities.iter().enumerate() {
            if self.equities[..i].iter().any(|other| other.name == eq.name) {
                return Err(invalid(format!("eq.{}", eq.name), "duplicate equity name"));
            }
            if !(eq.spot.is_finite() && eq.spot > 0.0) {
                return Err(invalid(format!("eq.{}.spot", eq.name), "must be positive"));
            }
            if !(eq.vol.is_finite() && eq.vol >= 0.0) {
                return Err(invalid(format!("eq.{}.vol", eq.name), "must be non-negative"));
            }
        }
        self.correlation_matrix()?.cholesky().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> CrossAssetModelData {
        CrossAssetModelData {
            ir: IrModelData {
                currency: "USD".to_string(),
                kappa: 0.05,
                sigma: 0.01,
                rate: 0.03,
            },
            equities: vec![EquityModelData {
                name: "SPX".to_string(),
                spot: 100.0,
                vol: 0.2,
            }],
            correlation: Some(vec![vec![1.0, 0.25], vec![0.25, 1.0]]),
            discretization: Discretization::Euler,
        }
    }

    #[test]
    fn test_valid() {
        assert!(data().validate().is_ok());
        assert_eq!(data().n_factors(), 2);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut d = data();
        d.ir.kappa = 0.0;
        assert!(matches!(
            d.validate(),
            Err(ModelError::InvalidParameter { ref name, .. }) if name == "ir.kappa"
        ));

        let mut d = data();
        d.equities[0].spot = -1.0;
        assert!(d.validate().is_err());

        let mut d = data();
        d.equities.push(d.equities[0].clone());
        d.correlation = None;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_correlation_dimension_checked() {
        let mut d = data();
        d.correlation = Some(vec![vec![1.0]]);
        assert!(matches!(d.validate(), Err(ModelError::Correlation(_))));
    }
}
