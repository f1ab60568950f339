//! Portfolio of trade definitions.
//!
//! Trades are plain data deserialised from configuration. The
//! [`ContributorFactory`](crate::trade::ContributorFactory) turns each one into
//! a graph contributor keyed on its [`TradeType`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioError;

/// Trade kinds understood by the default contributor factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    /// Fixed-for-floating interest rate swap.
    VanillaSwap,
    /// European option on a simulated equity.
    EuropeanOption,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::VanillaSwap => write!(f, "vanilla_swap"),
            TradeType::EuropeanOption => write!(f, "european_option"),
        }
    }
}

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    /// Pays `max(S - K, 0)`.
    #[default]
    Call,
    /// Pays `max(K - S, 0)`.
    Put,
}

fn default_pay_fixed() -> bool {
    true
}

fn default_fixed_tenor() -> String {
    "1Y".to_string()
}

fn default_float_tenor() -> String {
    "6M".to_string()
}

fn default_quantity() -> f64 {
    1.0
}

/// Single-curve fixed-for-floating swap terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapTerms {
    /// Notional amount.
    pub notional: f64,
    /// Fixed coupon rate.
    pub fixed_rate: f64,
    /// Pay fixed, receive floating.
    #[serde(default = "default_pay_fixed")]
    pub pay_fixed: bool,
    /// Accrual start.
    pub start: NaiveDate,
    /// Final payment date.
    pub maturity: NaiveDate,
    /// Fixed leg period, e.g. `"1Y"`.
    #[serde(default = "default_fixed_tenor")]
    pub fixed_tenor: String,
    /// Floating leg period, e.g. `"6M"`.
    #[serde(default = "default_float_tenor")]
    pub float_tenor: String,
}

/// European option terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTerms {
    /// Equity name as simulated by the model.
    pub underlying: String,
    /// Strike price.
    pub strike: f64,
    /// Exercise date; joins the simulation dates when it is not already one.
    pub expiry: NaiveDate,
    /// Call or put.
    #[serde(default)]
    pub option_type: OptionType,
    /// Number of units, negative for a short position.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

/// Product-specific terms, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Product {
    /// See [`SwapTerms`].
    VanillaSwap(SwapTerms),
    /// See [`OptionTerms`].
    EuropeanOption(OptionTerms),
}

/// One trade of the portfolio.
///
/// # Examples
///
/// ```
/// use pricer_xva::portfolio::{TradeDefinition, TradeType};
///
/// let trade: TradeDefinition = toml::from_str(r#"
///     id = "OPT1"
///     type = "european_option"
///     underlying = "SPX"
///     strike = 100.0
///     expiry = "2027-01-04"
/// "#).unwrap();
/// assert_eq!(trade.trade_type(), TradeType::EuropeanOption);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDefinition {
    /// Unique trade id; also the label prefix of the trade's nodes.
    pub id: String,
    /// Product terms.
    #[serde(flatten)]
    pub product: Product,
}

impl TradeDefinition {
    /// Kind of trade, used to select a contributor.
    pub fn trade_type(&self) -> TradeType {
        match self.product {
            Product::VanillaSwap(_) => TradeType::VanillaSwap,
            Product::EuropeanOption(_) => TradeType::EuropeanOption,
        }
    }

    /// Dates the model has to simulate for this trade to be valued.
    pub fn required_dates(&self) -> Vec<NaiveDate> {
        match &self.product {
            Product::VanillaSwap(_) => Vec::new(),
            Product::EuropeanOption(terms) => vec![terms.expiry],
        }
    }
}

/// Trades keyed and iterated by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    trades: BTreeMap<String, TradeDefinition>,
}

impl Portfolio {
    /// Builds a portfolio, rejecting empty or duplicate ids.
    pub fn new(trades: impl IntoIterator<Item = TradeDefinition>) -> Result<Self, PortfolioError> {
        let mut portfolio = Self::default();
        for trade in trades {
            portfolio.add(trade)?;
        }
        Ok(portfolio)
    }

    /// Adds one trade.
    pub fn add(&mut self, trade: TradeDefinition) -> Result<(), PortfolioError> {
        if trade.id.is_empty() {
            return Err(PortfolioError::EmptyId);
        }
        if self.trades.contains_key(&trade.id) {
            return Err(PortfolioError::DuplicateTrade(trade.id));
        }
        self.trades.insert(trade.id.clone(), trade);
        Ok(())
    }

    /// Number of trades.
    #[inline]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Returns `true` if there are no trades.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Trade by id.
    pub fn get(&self, id: &str) -> Option<&TradeDefinition> {
        self.trades.get(id)
    }

    /// Trades in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TradeDefinition> {
        self.trades.values()
    }
}
