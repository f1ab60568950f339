//! Simulation models expressed as computation-graph layers.
//!
//! A model appends its state variables to the shared graph once
//! ([`CgModel::build_layer`]) and then hands out node indices that trades
//! combine into their own subgraphs:
//!
//! - random-variate input nodes, one per factor and step, bound to the path
//!   tensor by the engine;
//! - parameter input nodes, bound to their calibrated scalar values;
//! - state, numeraire, spot and discount-bond nodes at simulation dates.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use pricer_graph::ComputationGraph;
//! use pricer_models::models::{CrossAssetModelBuilder, CrossAssetModelData, IrModelData, ModelBuilder};
//! use pricer_models::SimulationGrid;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
//! let grid = SimulationGrid::from_tenors(today, &["1Y", "2Y"], 0).unwrap();
//! let data = CrossAssetModelData::rates_only(IrModelData {
//!     currency: "EUR".to_string(),
//!     kappa: 0.03,
//!     sigma: 0.01,
//!     rate: 0.02,
//! });
//!
//! let mut model = CrossAssetModelBuilder::new(data).build(&grid, 1_000).unwrap();
//! let mut graph = ComputationGraph::new();
//! model.build_layer(&mut graph).unwrap();
//! assert_eq!(model.random_variates()[0].len(), 2);
//! assert!(model.numeraire(grid.dates()[1]).is_ok());
//! ```

mod correlation;
mod cross_asset;
mod data;

use std::fmt;

use chrono::NaiveDate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use pricer_graph::graph::cg_conditional_expectation;
use pricer_graph::{ComputationGraph, NodeIndex};

use crate::error::ModelResult;
use crate::grid::SimulationGrid;

pub use correlation::CorrelationMatrix;
pub use cross_asset::{CrossAssetModel, CrossAssetModelBuilder};
pub use data::{CrossAssetModelData, EquityModelData, IrModelData};

/// Time discretisation of the model dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Discretization {
    /// Euler steps over the refined grid.
    #[default]
    Euler,
    /// Exact transition between simulation dates.
    Exact,
}

/// A model parameter input node and the value it is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameter {
    /// Parameter label, e.g. `"ir.sigma"`.
    pub name: String,
    /// Input node carrying the parameter.
    pub node: NodeIndex,
    /// Calibrated value.
    pub value: f64,
}

/// Model adapter: the simulation model as seen by trades and the engine.
///
/// Node queries are valid once [`build_layer`](Self::build_layer) has run
/// and return [`ModelError::NotBuilt`](crate::ModelError::NotBuilt) before.
/// Dates must be the reference date or one of the grid dates.
pub trait CgModel: fmt::Debug + Send + Sync {
    /// Number of Monte Carlo paths.
    fn size(&self) -> usize;

    /// Simulation grid.
    fn grid(&self) -> &SimulationGrid;

    /// Number of Brownian factors.
    fn n_factors(&self) -> usize;

    /// Discretisation scheme of the dynamics.
    fn discretization(&self) -> Discretization;

    /// Appends parameter, variate and state nodes to `graph`.
    fn build_layer(&mut self, graph: &mut ComputationGraph) -> ModelResult<()>;

    /// Random-variate input nodes indexed `[factor][step]`.
    fn random_variates(&self) -> &[Vec<NodeIndex>];

    /// Parameter input nodes with their values.
    fn model_parameters(&self) -> &[ModelParameter];

    /// Primary state variable at `date`.
    fn state_variable(&self, date: NaiveDate) -> ModelResult<NodeIndex>;

    /// Numeraire at `date`; its value at the reference date is 1.
    fn numeraire(&self, date: NaiveDate) -> ModelResult<NodeIndex>;

    /// Spot of asset `name` at `date`.
    fn spot(&self, name: &str, date: NaiveDate) -> ModelResult<NodeIndex>;

    /// Zero-coupon bond price at `date` for `maturity`, appended to `graph`.
    fn discount_bond(
        &self,
        graph: &mut ComputationGraph,
        date: NaiveDate,
        maturity: NaiveDate,
    ) -> ModelResult<NodeIndex>;

    /// Regressors for conditional expectations at `date`.
    fn regressors(&self, date: NaiveDate) -> ModelResult<Vec<NodeIndex>>;

    /// Conditional expectation of `amount` given the state at `date`.
    fn npv(
        &self,
        graph: &mut ComputationGraph,
        amount: NodeIndex,
        date: NaiveDate,
    ) -> ModelResult<NodeIndex> {
        self.npv_filtered(graph, amount, date, None)
    }

    /// [`npv`](Self::npv) fitted on the paths where `filter` is non-zero.
    ///
    /// At the reference date every regressor is deterministic and the result
    /// is the (filtered) expectation of `amount`.
    fn npv_filtered(
        &self,
        graph: &mut ComputationGraph,
        amount: NodeIndex,
        date: NaiveDate,
        filter: Option<NodeIndex>,
    ) -> ModelResult<NodeIndex> {
        let regressors = if date == self.grid().reference_date() {
            Vec::new()
        } else {
            self.regressors(date)?
        };
        Ok(cg_conditional_expectation(graph, amount, &regressors, filter)?)
    }
}

/// Produces a calibrated model for a run.
pub trait ModelBuilder: fmt::Debug {
    /// Builds a model over `grid` simulating `samples` paths.
    fn build(&self, grid: &SimulationGrid, samples: usize) -> ModelResult<Box<dyn CgModel>>;
}
