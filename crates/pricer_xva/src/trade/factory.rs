//! Registry of contributor builders keyed by trade type.

use std::collections::HashMap;
use std::fmt;

use super::{EuropeanOption, TradeGraphContributor, VanillaSwap};
use crate::error::TradeError;
use crate::portfolio::{Product, TradeDefinition, TradeType};

/// Builds the contributor of one trade definition.
pub type ContributorBuilder =
    Box<dyn Fn(&TradeDefinition) -> Result<Box<dyn TradeGraphContributor>, TradeError> + Send + Sync>;

/// Maps trade types to contributor builders.
///
/// # Examples
///
/// ```
/// use pricer_xva::portfolio::TradeDefinition;
/// use pricer_xva::trade::ContributorFactory;
///
/// let trade: TradeDefinition = toml::from_str(r#"
///     id = "OPT1"
///     type = "european_option"
///     underlying = "SPX"
///     strike = 100.0
///     expiry = "2027-01-04"
/// "#).unwrap();
///
/// let factory = ContributorFactory::with_default_builders();
/// let contributor = factory.build(&trade).unwrap();
/// assert_eq!(contributor.trade_id(), "OPT1");
///
/// assert!(ContributorFactory::new().build(&trade).is_err());
/// ```
#[derive(Default)]
pub struct ContributorFactory {
    builders: HashMap<TradeType, ContributorBuilder>,
}

impl fmt::Debug for ContributorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.builders.keys().collect();
        types.sort();
        f.debug_struct("ContributorFactory")
            .field("trade_types", &types)
            .finish()
    }
}

impl ContributorFactory {
    /// Empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with builders for every [`TradeType`].
    pub fn with_default_builders() -> Self {
        let mut factory = Self::new();
        factory.register(TradeType::VanillaSwap, Box::new(build_swap));
        factory.register(TradeType::EuropeanOption, Box::new(build_option));
        factory
    }

    /// Registers or replaces the builder for `trade_type`.
    pub fn register(&mut self, trade_type: TradeType, builder: ContributorBuilder) {
        self.builders.insert(trade_type, builder);
    }

    /// Returns `true` if a builder is registered for `trade_type`.
    pub fn supports(&self, trade_type: TradeType) -> bool {
        self.builders.contains_key(&trade_type)
    }

    /// Builds the contributor for `trade`.
    pub fn build(&self, trade: &TradeDefinition) -> Result<Box<dyn TradeGraphContributor>, TradeError> {
        let trade_type = trade.trade_type();
        let builder = self
            .builders
            .get(&trade_type)
            .ok_or(TradeError::UnsupportedTradeType(trade_type))?;
        builder(trade)
    }
}

fn build_swap(trade: &TradeDefinition) -> Result<Box<dyn TradeGraphContributor>, TradeError> {
    match &trade.product {
        Product::VanillaSwap(terms) => Ok(Box::new(VanillaSwap::new(trade.id.clone(), terms.clone())?)),
        _ => Err(TradeError::UnsupportedTradeType(trade.trade_type())),
    }
}

fn build_option(trade: &TradeDefinition) -> Result<Box<dyn TradeGraphContributor>, TradeError> {
    match &trade.product {
        Product::EuropeanOption(terms) => {
            Ok(Box::new(EuropeanOption::new(trade.id.clone(), terms.clone())?))
        }
        _ => Err(TradeError::UnsupportedTradeType(trade.trade_type())),
    }
}
