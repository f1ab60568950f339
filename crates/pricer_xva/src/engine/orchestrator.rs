//! Single-run exposure engine.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::NaiveDate;
use pricer_graph::eval::{
    BackwardEvaluator, CancellationToken, EvalError, EvalResult, EvalStats, EvalStatus,
    EvaluationObserver, ForwardEvaluator, InputBindings, RetentionBitmap, ValueStore,
};
use pricer_graph::ops::OperatorRegistry;
use pricer_graph::{ComputationGraph, NodeIndex, NodeRange, RandomVariable, RegressionConfig};
use pricer_models::models::{CgModel, CrossAssetModelBuilder, Discretization, ModelBuilder, ModelParameter};
use pricer_models::rng::{generate_paths, PathGeneratorSpec};
use pricer_models::ModelError;
use tracing::{debug, info, trace, warn};

use super::stage::{Stage, StageTimings};
use crate::config::EngineConfig;
use crate::error::{EngineError, StageError};
use crate::exposure::{net_values, ExposureProfile};
use crate::trade::{ContributorFactory, TradeSubgraph};

/// Simulated values of one trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeExposure {
    /// Reference date followed by the simulation dates.
    pub dates: Vec<NaiveDate>,
    /// Nodes appended by the trade's contributor.
    pub node_range: NodeRange,
    /// Output node per date.
    pub outputs: Vec<NodeIndex>,
    /// Value per date; the first entry is the reference-date NPV.
    pub npvs: Vec<RandomVariable>,
}

impl TradeExposure {
    /// Mean reference-date value.
    pub fn npv(&self) -> f64 {
        self.npvs.first().map_or(0.0, RandomVariable::expectation)
    }

    /// Exposure statistics per date.
    pub fn profile(&self) -> ExposureProfile {
        ExposureProfile::from_values(&self.dates, &self.npvs)
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ExposureRun {
    /// Per-trade values keyed by trade id.
    pub trades: BTreeMap<String, TradeExposure>,
    /// Nodes in the shared graph.
    pub graph_size: usize,
    /// Nodes appended by the model layer.
    pub model_node_count: usize,
    /// Wall-clock time per stage.
    pub timings: StageTimings,
    /// Forward evaluation counters.
    pub eval_stats: EvalStats,
    graph: ComputationGraph,
    values: ValueStore,
    parameters: Vec<ModelParameter>,
    samples: usize,
    regression: RegressionConfig,
}

impl ExposureRun {
    /// Values of `trade_id`.
    pub fn trade(&self, trade_id: &str) -> Option<&TradeExposure> {
        self.trades.get(trade_id)
    }

    /// Shared graph of the run.
    pub fn graph(&self) -> &ComputationGraph {
        &self.graph
    }

    /// Model parameters bound in the run.
    pub fn parameters(&self) -> &[ModelParameter] {
        &self.parameters
    }

    /// Exposure profile of the whole portfolio with full netting.
    pub fn netted_profile(&self) -> Option<ExposureProfile> {
        let first = self.trades.values().next()?;
        let per_trade: Vec<&[RandomVariable]> =
            self.trades.values().map(|t| t.npvs.as_slice()).collect();
        Some(ExposureProfile::from_values(&first.dates, &net_values(&per_trade)))
    }

    /// Derivatives of the reference-date NPV of `trade_id` with respect to
    /// every model parameter, keyed by parameter name.
    ///
    /// Requires `evaluation.keep_values_for_derivatives`; otherwise the
    /// backward pass fails with [`EvalError::MissingValue`]. Returns `None`
    /// for an unknown trade.
    pub fn parameter_sensitivities(&self, trade_id: &str) -> Option<EvalResult<BTreeMap<String, f64>>> {
        let trade = self.trades.get(trade_id)?;
        let seed = *trade.outputs.first()?;

        let registry = OperatorRegistry::new(self.samples, self.regression);
        let result = BackwardEvaluator::new(&registry)
            .evaluate(&self.graph, &self.values, &[seed])
            .map(|adjoints| {
                self.parameters
                    .iter()
                    .map(|p| (p.name.clone(), adjoints.expectation(p.node).unwrap_or(0.0)))
                    .collect()
            });
        Some(result)
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum EngineOutcome {
    /// Every stage ran.
    Completed(Box<ExposureRun>),
    /// The cancellation token fired before or during `stage`.
    Cancelled {
        /// Stage that did not finish.
        stage: Stage,
        /// Nodes evaluated before the stop; zero outside evaluation.
        evaluated: usize,
    },
}

impl EngineOutcome {
    /// Completed run, if any.
    pub fn completed(self) -> Option<ExposureRun> {
        match self {
            EngineOutcome::Completed(run) => Some(*run),
            EngineOutcome::Cancelled { .. } => None,
        }
    }
}

/// Orchestrates one exposure run over a shared computation graph.
///
/// The engine is consumed by [`run`](Self::run): one instance, one run.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use pricer_xva::{EngineConfig, XvaEngine};
///
/// let config = EngineConfig::load_with_env_and_validate(Path::new("xva.toml")).unwrap();
/// let run = XvaEngine::new(config).run().unwrap().completed().unwrap();
/// for (id, trade) in &run.trades {
///     println!("{}: {:.2}", id, trade.npv());
/// }
/// ```
pub struct XvaEngine {
    config: EngineConfig,
    model_builder: Box<dyn ModelBuilder>,
    factory: ContributorFactory,
    cancellation: CancellationToken,
    observer: Option<Box<dyn EvaluationObserver + Send>>,
}

impl fmt::Debug for XvaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XvaEngine")
            .field("config", &self.config)
            .field("model_builder", &self.model_builder)
            .field("factory", &self.factory)
            .field("cancellation", &self.cancellation)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl XvaEngine {
    /// Engine using the cross-asset model of the configuration and the
    /// default contributors.
    pub fn new(config: EngineConfig) -> Self {
        let model_builder = Box::new(CrossAssetModelBuilder::new(config.model.clone()));
        Self {
            config,
            model_builder,
            factory: ContributorFactory::with_default_builders(),
            cancellation: CancellationToken::new(),
            observer: None,
        }
    }

    /// Replaces the model builder.
    pub fn with_model_builder(mut self, builder: Box<dyn ModelBuilder>) -> Self {
        self.model_builder = builder;
        self
    }

    /// Replaces the contributor factory.
    pub fn with_factory(mut self, factory: ContributorFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Uses `token` for cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Reports every node evaluation and release of the forward pass to
    /// `observer`.
    pub fn with_observer(mut self, observer: Box<dyn EvaluationObserver + Send>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Token cancelling this engine's run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Configuration of the run.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs every stage once.
    ///
    /// # Errors
    ///
    /// [`EngineError`] naming the stage that failed. Cancellation is reported
    /// as [`EngineOutcome::Cancelled`], not as an error.
    pub fn run(mut self) -> Result<EngineOutcome, EngineError> {
        let mut observer = self.observer.take();
        let mut timings = StageTimings::default();
        let config = &self.config;
        let samples = config.simulation.samples;

        macro_rules! stage {
            ($stage:expr, $body:block) => {{
                if self.cancellation.is_cancelled() {
                    debug!(stage = %$stage, "run cancelled");
                    return Ok(EngineOutcome::Cancelled {
                        stage: $stage,
                        evaluated: 0,
                    });
                }
                debug!(stage = %$stage, "stage started");
                let started = Instant::now();
                let result = (|| -> Result<_, StageError> { $body })();
                let elapsed = started.elapsed();
                timings.record($stage, elapsed);
                debug!(stage = %$stage, elapsed_ms = elapsed.as_secs_f64() * 1e3, "stage finished");
                result.map_err(|e| EngineError::new($stage, e))?
            }};
        }

        let (grid, portfolio) = stage!(Stage::Config, {
            config.validate()?;
            Ok((config.grid()?, config.portfolio()?))
        });

        let mut model: Box<dyn CgModel> = stage!(Stage::ModelBuild, {
            let model = self.model_builder.build(&grid, samples)?;
            if model.discretization() != Discretization::Euler {
                return Err(ModelError::UnsupportedDiscretization(model.discretization()).into());
            }
            if model.size() != samples {
                return Err(ModelError::InvalidParameter {
                    name: "samples".to_string(),
                    reason: format!("model simulates {} paths, run needs {}", model.size(), samples),
                }
                .into());
            }
            Ok(model)
        });

        let mut graph = ComputationGraph::new();
        let model_node_count = stage!(Stage::GraphBuild, {
            model.build_layer(&mut graph)?;
            trace!("model layer:\n{}", graph.ssa_form());
            Ok(graph.size())
        });

        let subgraphs: Vec<(String, TradeSubgraph)> = stage!(Stage::TradeBuild, {
            let mut subgraphs = Vec::with_capacity(portfolio.len());
            for trade in portfolio.iter() {
                let trade_error = |source| StageError::Trade {
                    trade_id: trade.id.clone(),
                    source,
                };
                let contributor = self.factory.build(trade).map_err(trade_error)?;
                graph.set_prefix(format!("{}_", trade.id));
                let contributed = contributor.contribute(&mut graph, model.as_ref());
                graph.clear_prefix();
                let subgraph = contributed.map_err(trade_error)?;
                trace!(
                    trade = %trade.id,
                    "trade subgraph:\n{}",
                    graph.ssa_form_range(subgraph.range)
                );
                subgraphs.push((trade.id.clone(), subgraph));
            }
            graph.validate()?;
            Ok(subgraphs)
        });

        let mut bindings = InputBindings::new();
        stage!(Stage::PathGeneration, {
            let spec = PathGeneratorSpec {
                sequence: config.simulation.sequence,
                n_factors: model.n_factors(),
                n_steps: model.grid().n_steps(),
                seed: config.simulation.seed,
                ordering: config.simulation.ordering,
                step_times: model.grid().step_times().to_vec(),
            };
            let paths = generate_paths(&spec, samples)?;
            for (factor, steps) in model.random_variates().iter().enumerate() {
                for (step, &node) in steps.iter().enumerate() {
                    bindings.bind(node, paths.random_variable(step, factor));
                }
            }
            Ok(())
        });

        stage!(Stage::Binding, {
            for (node, value) in graph.constants() {
                bindings.bind_scalar(node, samples, value);
            }
            for parameter in model.model_parameters() {
                bindings.bind_scalar(parameter.node, samples, parameter.value);
            }
            Ok(())
        });

        let registry = OperatorRegistry::new(samples, config.evaluation.regression);
        let evaluation = stage!(Stage::Evaluation, {
            let outputs = subgraphs.iter().flat_map(|(_, s)| s.outputs.iter().copied());
            let retention = RetentionBitmap::from_nodes(graph.size(), outputs)?;
            let evaluator = ForwardEvaluator::new(&registry)
                .with_options(config.evaluation.eval_options())
                .with_cancellation(self.cancellation.clone());
            let evaluation = match observer.as_deref_mut() {
                Some(observer) => evaluator.evaluate_observed(&graph, &bindings, &retention, observer)?,
                None => evaluator.evaluate(&graph, &bindings, &retention)?,
            };
            Ok(evaluation)
        });

        if let EvalStatus::Cancelled { evaluated } = evaluation.status {
            warn!(evaluated, "evaluation cancelled");
            return Ok(EngineOutcome::Cancelled {
                stage: Stage::Evaluation,
                evaluated,
            });
        }

        let dates: Vec<NaiveDate> = std::iter::once(grid.reference_date())
            .chain(grid.dates().iter().copied())
            .collect();
        let mut trades = BTreeMap::new();
        for (id, subgraph) in subgraphs {
            let npvs = subgraph
                .outputs
                .iter()
                .map(|&node| {
                    evaluation.value(node).cloned().ok_or(EvalError::MissingValue {
                        node,
                        consumer: node,
                    })
                })
                .collect::<EvalResult<Vec<_>>>()
                .map_err(|e| EngineError::new(Stage::Evaluation, e))?;
            trades.insert(
                id,
                TradeExposure {
                    dates: dates.clone(),
                    node_range: subgraph.range,
                    outputs: subgraph.outputs,
                    npvs,
                },
            );
        }

        info!(
            trades = trades.len(),
            graph_size = graph.size(),
            model_nodes = model_node_count,
            samples,
            peak_live_values = evaluation.stats.peak_live_values,
            total_ms = timings.total().as_secs_f64() * 1e3,
            "exposure run completed"
        );

        Ok(EngineOutcome::Completed(Box::new(ExposureRun {
            trades,
            graph_size: graph.size(),
            model_node_count,
            timings,
            eval_stats: evaluation.stats,
            parameters: model.model_parameters().to_vec(),
            graph,
            values: evaluation.store,
            samples,
            regression: config.evaluation.regression,
        })))
    }
}
