//! Trade graph contributors.
//!
//! A contributor owns the pricing logic of one trade. Given the shared graph
//! and the model adapter it appends the trade's nodes and reports one output
//! node per valuation date: the reference date first, then every simulation
//! date in order.
//!
//! Contributors are built per run by the [`ContributorFactory`], keyed on
//! [`TradeType`](crate::portfolio::TradeType).

mod factory;
mod option;
mod swap;

use std::fmt;

use chrono::NaiveDate;
use pricer_graph::{ComputationGraph, NodeIndex, NodeRange};
use pricer_models::models::CgModel;

use crate::error::TradeError;

pub use factory::{ContributorBuilder, ContributorFactory};
pub use option::EuropeanOption;
pub use swap::VanillaSwap;

/// Nodes appended by one trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSubgraph {
    /// Half-open range of the nodes appended by the contributor.
    pub range: NodeRange,
    /// Reference-date value followed by one value per simulation date.
    pub outputs: Vec<NodeIndex>,
}

/// Per-trade pricing logic appending a subgraph to the shared graph.
///
/// The engine sets the graph's label prefix to `"{trade_id}_"` before
/// calling [`contribute`](Self::contribute), so labels chosen by the
/// contributor are unique across the portfolio.
///
/// # Examples
///
/// A zero-coupon bond valued from the model's discount bonds:
///
/// ```
/// use chrono::NaiveDate;
/// use pricer_graph::{ComputationGraph, NodeIndex};
/// use pricer_models::models::{CgModel, CrossAssetModelBuilder, ModelBuilder};
/// use pricer_xva::trade::TradeGraphContributor;
/// use pricer_xva::{EngineConfig, TradeError};
///
/// #[derive(Debug)]
/// struct ZeroBond {
///     maturity: NaiveDate,
/// }
///
/// impl TradeGraphContributor for ZeroBond {
///     fn trade_id(&self) -> &str {
///         "ZB"
///     }
///
///     fn append_nodes(
///         &self,
///         graph: &mut ComputationGraph,
///         model: &dyn CgModel,
///     ) -> Result<Vec<NodeIndex>, TradeError> {
///         let grid = model.grid();
///         let mut outputs = vec![model.discount_bond(graph, grid.reference_date(), self.maturity)?];
///         for &date in grid.dates() {
///             outputs.push(model.discount_bond(graph, date, self.maturity)?);
///         }
///         Ok(outputs)
///     }
/// }
///
/// let config = EngineConfig::from_toml_str(r#"
///     reference_date = "2026-01-02"
///
///     [simulation]
///     samples = 8
///     grid = ["1Y"]
///
///     [model.ir]
///     currency = "EUR"
///     kappa = 0.05
///     sigma = 0.01
///     rate = 0.02
/// "#).unwrap();
/// let grid = config.grid().unwrap();
/// let mut model = CrossAssetModelBuilder::new(config.model.clone()).build(&grid, 8).unwrap();
/// let mut graph = ComputationGraph::new();
/// model.build_layer(&mut graph).unwrap();
///
/// let bond = ZeroBond { maturity: NaiveDate::from_ymd_opt(2028, 1, 2).unwrap() };
/// let subgraph = bond.contribute(&mut graph, model.as_ref()).unwrap();
/// assert_eq!(subgraph.outputs.len(), 2);
/// assert_eq!(graph.node_index("npv_1").unwrap(), subgraph.outputs[1]);
/// assert!(subgraph.range.contains(subgraph.outputs[1]));
/// ```
pub trait TradeGraphContributor: fmt::Debug {
    /// Trade identifier.
    fn trade_id(&self) -> &str;

    /// Appends the trade's nodes and returns its output nodes, one for the
    /// reference date and one per simulation date.
    fn append_nodes(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
    ) -> Result<Vec<NodeIndex>, TradeError>;

    /// Runs [`append_nodes`](Self::append_nodes), checks the output count and
    /// labels the outputs `npv_0`, `npv_1`, ...
    fn contribute(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
    ) -> Result<TradeSubgraph, TradeError> {
        let first = graph.size();
        let outputs = self.append_nodes(graph, model)?;

        let expected = model.grid().dates().len() + 1;
        if outputs.len() != expected {
            return Err(TradeError::OutputCount {
                expected,
                actual: outputs.len(),
            });
        }
        for (i, &node) in outputs.iter().enumerate() {
            graph.register_label(&format!("npv_{}", i), node)?;
        }

        Ok(TradeSubgraph {
            range: graph.range_since(first),
            outputs,
        })
    }
}

/// Reference date followed by the simulation dates.
pub(crate) fn valuation_dates(model: &dyn CgModel) -> Vec<NaiveDate> {
    let grid = model.grid();
    std::iter::once(grid.reference_date())
        .chain(grid.dates().iter().copied())
        .collect()
}
