//! Cross-asset Gaussian model: one LGM rate factor plus lognormal equities.
//!
//! Rates follow a Linear Gauss-Markov model with constant mean reversion
//! `kappa` and volatility `sigma` in the measure of its own numeraire:
//!
//! ```text
//! x(t+dt)  = x(t) + sigma * sqrt(dt) * W_0
//! H(t)     = (1 - exp(-kappa t)) / kappa
//! zeta(t)  = sigma^2 t
//! N(t)     = exp(H(t) x(t) + H(t)^2 zeta(t) / 2) / P(0, t)
//! P(t, T)  = P(0, T) / P(0, t) * exp(-(H(T) - H(t)) x(t) - (H(T)^2 - H(t)^2) zeta(t) / 2)
//! ```
//!
//! with the flat initial curve `P(0, t) = exp(-r t)`. Equities evolve in log
//! space with drift `r - vol^2 / 2` and a covariance adjustment
//! `rho * vol * sigma * (t H(t))` that keeps `S / N` a martingale.
//!
//! Every parameter is an input node, so the whole layer is differentiable
//! with respect to the model parameters.

use std::collections::HashMap;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use tracing::{debug, trace};

use pricer_graph::graph::{
    cg_add, cg_div, cg_exp, cg_log, cg_mult, cg_neg, cg_sub, cg_sum, InputKind,
};
use pricer_graph::ops::OpKind;
use pricer_graph::{ComputationGraph, GraphError, NodeIndex};

use super::data::CrossAssetModelData;
use super::{CgModel, Discretization, ModelBuilder, ModelParameter};
use crate::error::{ModelError, ModelResult};
use crate::grid::SimulationGrid;

type GraphResult<T> = Result<T, GraphError>;

// ============================================================================
// Builder
// ============================================================================

/// Builds [`CrossAssetModel`]s from fixed parameters.
#[derive(Debug, Clone)]
pub struct CrossAssetModelBuilder {
    data: CrossAssetModelData,
}

impl CrossAssetModelBuilder {
    /// Wraps model data.
    pub fn new(data: CrossAssetModelData) -> Self {
        Self { data }
    }

    /// Model data used by every build.
    pub fn data(&self) -> &CrossAssetModelData {
        &self.data
    }
}

impl ModelBuilder for CrossAssetModelBuilder {
    fn build(&self, grid: &SimulationGrid, samples: usize) -> ModelResult<Box<dyn CgModel>> {
        Ok(Box::new(CrossAssetModel::new(
            self.data.clone(),
            grid.clone(),
            samples,
        )?))
    }
}

// ============================================================================
// Model
// ============================================================================

/// Nodes describing the model at one observation date.
#[derive(Debug, Clone)]
struct StateNodes {
    time: f64,
    x: NodeIndex,
    h: NodeIndex,
    zeta: NodeIndex,
    discount: NodeIndex,
    numeraire: NodeIndex,
    spots: Vec<NodeIndex>,
}

#[derive(Debug, Clone)]
struct Layer {
    kappa: NodeIndex,
    rate: NodeIndex,
    half: NodeIndex,
    parameters: Vec<ModelParameter>,
    variates: Vec<Vec<NodeIndex>>,
    // index 0 is the reference date, index i + 1 grid date i
    states: Vec<StateNodes>,
}

/// LGM rates with lognormal equities on a [`SimulationGrid`].
#[derive(Debug, Clone)]
pub struct CrossAssetModel {
    data: CrossAssetModelData,
    grid: SimulationGrid,
    samples: usize,
    cholesky: DMatrix<f64>,
    equity_index: HashMap<String, usize>,
    layer: Option<Layer>,
}

impl CrossAssetModel {
    /// Validates `data` and prepares the model.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidParameter`] for out-of-domain parameters
    /// - [`ModelError::Correlation`] / [`ModelError::NotPositiveDefinite`]
    pub fn new(data: CrossAssetModelData, grid: SimulationGrid, samples: usize) -> ModelResult<Self> {
        data.validate()?;
        let cholesky = data.correlation_matrix()?.cholesky()?;
        let equity_index = data
            .equities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        Ok(Self {
            data,
            grid,
            samples,
            cholesky,
            equity_index,
            layer: None,
        })
    }

    /// Model data.
    pub fn data(&self) -> &CrossAssetModelData {
        &self.data
    }

    fn layer(&self) -> ModelResult<&Layer> {
        self.layer.as_ref().ok_or(ModelError::NotBuilt)
    }

    fn state(&self, date: NaiveDate) -> ModelResult<&StateNodes> {
        let layer = self.layer()?;
        let slot = if date == self.grid.reference_date() {
            0
        } else {
            self.grid
                .date_index(date)
                .ok_or(ModelError::DateNotOnGrid(date))?
                + 1
        };
        Ok(&layer.states[slot])
    }

    fn parameter(
        graph: &mut ComputationGraph,
        parameters: &mut Vec<ModelParameter>,
        name: String,
        value: f64,
    ) -> GraphResult<NodeIndex> {
        let node = graph.insert_input(InputKind::Parameter, Some(&name))?;
        parameters.push(ModelParameter { name, node, value });
        Ok(node)
    }

    /// `W = L Z` for the variates of one step.
    fn correlate(&self, graph: &mut ComputationGraph, z: &[NodeIndex]) -> GraphResult<Vec<NodeIndex>> {
        let n = z.len();
        let mut shocks = Vec::with_capacity(n);
        for f in 0..n {
            let mut terms = Vec::with_capacity(f + 1);
            for (k, &zk) in z.iter().enumerate().take(f + 1) {
                let l = self.cholesky[(f, k)];
                if l == 1.0 {
                    terms.push(zk);
                } else if l != 0.0 {
                    let c = graph.constant(l);
                    terms.push(cg_mult(graph, c, zk)?);
                }
            }
            shocks.push(cg_sum(graph, &terms)?);
        }
        Ok(shocks)
    }

    #[allow(clippy::too_many_arguments)]
    fn observe(
        graph: &mut ComputationGraph,
        kappa: NodeIndex,
        sigma: NodeIndex,
        rate: NodeIndex,
        half: NodeIndex,
        time: f64,
        x: NodeIndex,
        log_spots: &[NodeIndex],
    ) -> GraphResult<StateNodes> {
        let h = lgm_h(graph, kappa, time)?;
        let t = graph.constant(time);
        let zeta = graph.append(OpKind::Mult, &[sigma, sigma, t], None)?;
        let discount = flat_discount(graph, rate, time)?;

        let hx = cg_mult(graph, h, x)?;
        let convexity = graph.append(OpKind::Mult, &[half, h, h, zeta], None)?;
        let exponent = cg_add(graph, hx, convexity)?;
        let growth = cg_exp(graph, exponent)?;
        let numeraire = cg_div(graph, growth, discount)?;

        let spots = log_spots
            .iter()
            .map(|&ls| cg_exp(graph, ls))
            .collect::<GraphResult<Vec<_>>>()?;

        Ok(StateNodes {
            time,
            x,
            h,
            zeta,
            discount,
            numeraire,
            spots,
        })
    }
}

/// `H(t) = (1 - exp(-kappa t)) / kappa`.
fn lgm_h(graph: &mut ComputationGraph, kappa: NodeIndex, time: f64) -> GraphResult<NodeIndex> {
    if time == 0.0 {
        return Ok(graph.constant(0.0));
    }
    let minus_t = graph.constant(-time);
    let one = graph.constant(1.0);
    let kt = cg_mult(graph, kappa, minus_t)?;
    let decay = cg_exp(graph, kt)?;
    let num = cg_sub(graph, one, decay)?;
    cg_div(graph, num, kappa)
}

/// `P(0, t) = exp(-r t)`.
fn flat_discount(graph: &mut ComputationGraph, rate: NodeIndex, time: f64) -> GraphResult<NodeIndex> {
    if time == 0.0 {
        return Ok(graph.constant(1.0));
    }
    let minus_t = graph.constant(-time);
    let rt = cg_mult(graph, rate, minus_t)?;
    cg_exp(graph, rt)
}

impl CgModel for CrossAssetModel {
    fn size(&self) -> usize {
        self.samples
    }

    fn grid(&self) -> &SimulationGrid {
        &self.grid
    }

    fn n_factors(&self) -> usize {
        self.data.n_factors()
    }

    fn discretization(&self) -> Discretization {
        self.data.discretization
    }

    fn build_layer(&mut self, graph: &mut ComputationGraph) -> ModelResult<()> {
        let first = graph.size();
        let n_steps = self.grid.n_steps();
        let n_factors = self.n_factors();

        let mut parameters = Vec::new();
        let ir = &self.data.ir;
        let kappa = Self::parameter(graph, &mut parameters, "ir.kappa".to_string(), ir.kappa)?;
        let sigma = Self::parameter(graph, &mut parameters, "ir.sigma".to_string(), ir.sigma)?;
        let rate = Self::parameter(graph, &mut parameters, "ir.rate".to_string(), ir.rate)?;
        let mut spots = Vec::with_capacity(self.data.equities.len());
        let mut vols = Vec::with_capacity(self.data.equities.len());
        for eq in &self.data.equities {
            spots.push(Self::parameter(graph, &mut parameters, format!("eq.{}.spot", eq.name), eq.spot)?);
            vols.push(Self::parameter(graph, &mut parameters, format!("eq.{}.vol", eq.name), eq.vol)?);
        }

        let variates = (0..n_factors)
            .map(|_| {
                (0..n_steps)
                    .map(|_| graph.insert_input(InputKind::RandomVariate, None))
                    .collect::<GraphResult<Vec<_>>>()
            })
            .collect::<GraphResult<Vec<_>>>()?;

        let half = graph.constant(0.5);
        // log-spot drift r - vol^2 / 2 per equity
        let mut drifts = Vec::with_capacity(vols.len());
        for &vol in &vols {
            let var = graph.append(OpKind::Mult, &[half, vol, vol], None)?;
            drifts.push(cg_sub(graph, rate, var)?);
        }
        let correlation = self.data.correlation_matrix()?;
        let rho: Vec<f64> = (0..spots.len()).map(|e| correlation.get(0, e + 1)).collect();

        let mut x = graph.constant(0.0);
        let mut log_spots = spots
            .iter()
            .map(|&s| cg_log(graph, s))
            .collect::<GraphResult<Vec<_>>>()?;

        let mut states = Vec::with_capacity(self.grid.dates().len() + 1);
        states.push(Self::observe(graph, kappa, sigma, rate, half, 0.0, x, &log_spots)?);

        // t * H(t) at the start of the current step, for the covariance adjustment
        let needs_adjustment = rho.iter().any(|&r| r != 0.0);
        let mut th_prev = graph.constant(0.0);
        let mut next_date = 0;

        for step in 0..n_steps {
            let (t0, t1) = self.grid.step_interval(step);
            let dt = t1 - t0;
            let sqrt_dt = graph.constant(dt.sqrt());
            let dt_node = graph.constant(dt);

            let z: Vec<NodeIndex> = variates.iter().map(|f| f[step]).collect();
            let w = self.correlate(graph, &z)?;

            let dx = graph.append(OpKind::Mult, &[sigma, sqrt_dt, w[0]], None)?;
            x = cg_add(graph, x, dx)?;

            let th_next = if needs_adjustment {
                let h1 = lgm_h(graph, kappa, t1)?;
                let t1_node = graph.constant(t1);
                let th = cg_mult(graph, t1_node, h1)?;
                Some(th)
            } else {
                None
            };

            for e in 0..log_spots.len() {
                let drift = cg_mult(graph, drifts[e], dt_node)?;
                let diffusion = graph.append(OpKind::Mult, &[vols[e], sqrt_dt, w[e + 1]], None)?;
                let mut terms = vec![log_spots[e], drift, diffusion];
                if let Some(th) = th_next.filter(|_| rho[e] != 0.0) {
                    let c = graph.constant(rho[e]);
                    let d_th = cg_sub(graph, th, th_prev)?;
                    terms.push(graph.append(OpKind::Mult, &[c, vols[e], sigma, d_th], None)?);
                }
                log_spots[e] = cg_sum(graph, &terms)?;
            }
            if let Some(th) = th_next {
                th_prev = th;
            }

            if next_date < self.grid.dates().len()
                && self.grid.state_index(self.grid.dates()[next_date])? == step + 1
            {
                states.push(Self::observe(graph, kappa, sigma, rate, half, t1, x, &log_spots)?);
                next_date += 1;
            }
        }

        debug!(
            nodes = graph.size() - first,
            n_steps,
            n_factors,
            parameters = parameters.len(),
            "Cross-asset model layer built"
        );
        trace!(parameters = ?parameters.iter().map(|p| &p.name).collect::<Vec<_>>());

        self.layer = Some(Layer {
            kappa,
            rate,
            half,
            parameters,
            variates,
            states,
        });
        Ok(())
    }

    fn random_variates(&self) -> &[Vec<NodeIndex>] {
        self.layer.as_ref().map_or(&[], |l| l.variates.as_slice())
    }

    fn model_parameters(&self) -> &[ModelParameter] {
        self.layer.as_ref().map_or(&[], |l| l.parameters.as_slice())
    }

    fn state_variable(&self, date: NaiveDate) -> ModelResult<NodeIndex> {
        Ok(self.state(date)?.x)
    }

    fn numeraire(&self, date: NaiveDate) -> ModelResult<NodeIndex> {
        Ok(self.state(date)?.numeraire)
    }

    fn spot(&self, name: &str, date: NaiveDate) -> ModelResult<NodeIndex> {
        let e = *self
            .equity_index
            .get(name)
            .ok_or_else(|| ModelError::UnknownSpot(name.to_string()))?;
        Ok(self.state(date)?.spots[e])
    }

    fn discount_bond(
        &self,
        graph: &mut ComputationGraph,
        date: NaiveDate,
        maturity: NaiveDate,
    ) -> ModelResult<NodeIndex> {
        let layer = self.layer()?;
        let state = self.state(date)?;
        let t_mat = self.grid.time(maturity);
        if t_mat <= state.time {
            return Ok(graph.constant(1.0));
        }

        let h_mat = lgm_h(graph, layer.kappa, t_mat)?;
        let p_mat = flat_discount(graph, layer.rate, t_mat)?;

        let dh = cg_sub(graph, h_mat, state.h)?;
        let h2_mat = cg_mult(graph, h_mat, h_mat)?;
        let h2 = cg_mult(graph, state.h, state.h)?;
        let dh2 = cg_sub(graph, h2_mat, h2)?;
        let slope = cg_mult(graph, dh, state.x)?;
        let convexity = graph.append(OpKind::Mult, &[layer.half, dh2, state.zeta], None)?;
        let exponent = cg_add(graph, slope, convexity)?;
        let minus_exponent = cg_neg(graph, exponent)?;
        let stochastic = cg_exp(graph, minus_exponent)?;
        let forward = cg_div(graph, p_mat, state.discount)?;
        Ok(cg_mult(graph, forward, stochastic)?)
    }

    fn regressors(&self, date: NaiveDate) -> ModelResult<Vec<NodeIndex>> {
        let state = self.state(date)?;
        let mut regressors = Vec::with_capacity(1 + state.spots.len());
        regressors.push(state.x);
        regressors.extend_from_slice(&state.spots);
        Ok(regressors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EquityModelData, IrModelData};

    fn grid() -> SimulationGrid {
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        SimulationGrid::from_tenors(today, &["6M", "1Y", "2Y"], 4).unwrap()
    }

    fn data(rho: f64) -> CrossAssetModelData {
        CrossAssetModelData {
            ir: IrModelData {
                currency: "EUR".to_string(),
                kappa: 0.05,
                sigma: 0.01,
                rate: 0.02,
            },
            equities: vec![EquityModelData {
                name: "SX5E".to_string(),
                spot: 4_000.0,
                vol: 0.2,
            }],
            correlation: Some(vec![vec![1.0, rho], vec![rho, 1.0]]),
            discretization: Discretization::Euler,
        }
    }

    #[test]
    fn test_layer_shapes() {
        let g = grid();
        let mut model = CrossAssetModel::new(data(0.3), g.clone(), 10).unwrap();
        let mut graph = ComputationGraph::new();
        model.build_layer(&mut graph).unwrap();

        assert_eq!(model.random_variates().len(), 2);
        assert_eq!(model.random_variates()[1].len(), g.n_steps());
        let names: Vec<&str> = model.model_parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["ir.kappa", "ir.sigma", "ir.rate", "eq.SX5E.spot", "eq.SX5E.vol"]);
        assert_eq!(graph.node_index("ir.sigma").unwrap(), model.model_parameters()[1].node);
        assert!(graph.validate().is_ok());

        for &d in g.dates() {
            assert!(model.spot("SX5E", d).is_ok());
            assert_eq!(model.regressors(d).unwrap().len(), 2);
        }
        assert_eq!(
            model.spot("DAX", g.dates()[0]).unwrap_err(),
            ModelError::UnknownSpot("DAX".to_string())
        );
    }

    #[test]
    fn test_queries_before_build() {
        let g = grid();
        let model = CrossAssetModel::new(data(0.0), g.clone(), 10).unwrap();
        assert_eq!(model.numeraire(g.dates()[0]).unwrap_err(), ModelError::NotBuilt);
        assert!(model.random_variates().is_empty());
    }

    #[test]
    fn test_off_grid_date() {
        let g = grid();
        let mut model = CrossAssetModel::new(data(0.0), g.clone(), 10).unwrap();
        let mut graph = ComputationGraph::new();
        model.build_layer(&mut graph).unwrap();
        let off = g.reference_date() + chrono::Days::new(3);
        assert_eq!(model.state_variable(off).unwrap_err(), ModelError::DateNotOnGrid(off));
    }

    #[test]
    fn test_uncorrelated_shocks_use_variates_directly() {
        let g = grid();
        let model = CrossAssetModel::new(data(0.0), g, 10).unwrap();
        let mut graph = ComputationGraph::new();
        let z: Vec<NodeIndex> = (0..2)
            .map(|_| graph.insert_input(InputKind::RandomVariate, None).unwrap())
            .collect();
        let size = graph.size();
        assert_eq!(model.correlate(&mut graph, &z).unwrap(), z);
        assert_eq!(graph.size(), size);
    }

    #[test]
    fn test_lgm_h_limits() {
        let mut graph = ComputationGraph::new();
        let kappa = graph.insert_input(InputKind::Parameter, None).unwrap();
        let h0 = lgm_h(&mut graph, kappa, 0.0).unwrap();
        assert_eq!(graph.constants().find(|&(n, _)| n == h0), Some((h0, 0.0)));
        let h1 = lgm_h(&mut graph, kappa, 1.5).unwrap();
        assert_eq!(graph.node(h1).unwrap().op(), Some(OpKind::Div));
    }
}
