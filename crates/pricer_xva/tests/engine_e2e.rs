//! End-to-end tests of the exposure engine.
//!
//! # Test Coverage
//!
//! - A four-path run of a `max(x - K, 0)` trade matches a hand computation
//! - Swap at the par rate is worth zero at the reference date
//! - European option matches Black-Scholes under independent rates
//! - Failing stages are reported with the trade and stage
//! - Option expiries off the configured grid join the simulation dates
//! - Cancellation before the run and part-way through evaluation
//! - Parameter sensitivities through the backward pass

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Once};

use approx::assert_relative_eq;
use chrono::NaiveDate;
use pricer_graph::eval::{CancellationToken, EvaluationObserver};
use pricer_graph::graph::{cg_max, cg_sub};
use pricer_graph::math::norm_cdf;
use pricer_graph::{ComputationGraph, NodeIndex};
use pricer_models::grid::year_fraction;
use pricer_models::models::CgModel;
use pricer_models::rng::{generate_paths, Ordering, PathGeneratorSpec, SequenceType};
use pricer_xva::portfolio::{Product, TradeDefinition, TradeType};
use pricer_xva::trade::{ContributorFactory, TradeGraphContributor, VanillaSwap};
use pricer_xva::{EngineConfig, EngineOutcome, ExposureRun, Stage, StageError, TradeError, XvaEngine};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

const RATES_ONLY: &str = r#"
    reference_date = "2026-01-02"

    [simulation]
    samples = 4
    seed = 7
    sequence = "pseudo_random"
    grid = ["1Y", "2Y"]

    [model.ir]
    currency = "EUR"
    kappa = 0.05
    sigma = 0.01
    rate = 0.02

    [[trades]]
    id = "CALLX"
    type = "european_option"
    underlying = "x"
    strike = 0.001
    expiry = "2028-01-02"
"#;

fn run(config: EngineConfig) -> ExposureRun {
    init_tracing();
    XvaEngine::new(config).run().unwrap().completed().unwrap()
}

/// Pays `max(x(t) - K, 0)` on the model state at every valuation date.
#[derive(Debug)]
struct StateCall {
    id: String,
    strike: f64,
}

impl TradeGraphContributor for StateCall {
    fn trade_id(&self) -> &str {
        &self.id
    }

    fn append_nodes(
        &self,
        graph: &mut ComputationGraph,
        model: &dyn CgModel,
    ) -> Result<Vec<NodeIndex>, TradeError> {
        let grid = model.grid();
        let dates: Vec<NaiveDate> = std::iter::once(grid.reference_date())
            .chain(grid.dates().iter().copied())
            .collect();
        let strike = graph.constant(self.strike);
        let zero = graph.constant(0.0);
        let mut outputs = Vec::new();
        for date in dates {
            let x = model.state_variable(date)?;
            let intrinsic = cg_sub(graph, x, strike)?;
            outputs.push(cg_max(graph, intrinsic, zero)?);
        }
        Ok(outputs)
    }
}

fn state_call_factory() -> ContributorFactory {
    let mut factory = ContributorFactory::new();
    factory.register(
        TradeType::EuropeanOption,
        Box::new(|trade: &TradeDefinition| match &trade.product {
            Product::EuropeanOption(terms) => Ok(Box::new(StateCall {
                id: trade.id.clone(),
                strike: terms.strike,
            }) as Box<dyn TradeGraphContributor>),
            _ => Err(TradeError::UnsupportedTradeType(trade.trade_type())),
        }),
    );
    factory
}

#[test]
fn test_four_path_state_call_matches_hand_computation() {
    init_tracing();
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let grid = config.grid().unwrap();
    let outcome = XvaEngine::new(config)
        .with_factory(state_call_factory())
        .run()
        .unwrap();
    let run = outcome.completed().unwrap();
    let trade = run.trade("CALLX").unwrap();
    assert_eq!(trade.npvs.len(), 3);
    assert_eq!(trade.dates, vec![d(2026, 1, 2), d(2027, 1, 2), d(2028, 1, 2)]);

    let spec = PathGeneratorSpec {
        sequence: SequenceType::PseudoRandom,
        n_factors: 1,
        n_steps: 2,
        seed: 7,
        ordering: Ordering::Steps,
        step_times: grid.step_times().to_vec(),
    };
    let paths = generate_paths(&spec, 4).unwrap();
    let (t0, t1) = grid.step_interval(0);
    let (_, t2) = grid.step_interval(1);

    for p in 0..4 {
        let x1 = 0.01 * (t1 - t0).sqrt() * paths.get(p, 0, 0);
        let x2 = x1 + 0.01 * (t2 - t1).sqrt() * paths.get(p, 1, 0);
        assert_eq!(trade.npvs[0].at(p), 0.0);
        assert_relative_eq!(trade.npvs[1].at(p), (x1 - 0.001).max(0.0), epsilon = 1e-15);
        assert_relative_eq!(trade.npvs[2].at(p), (x2 - 0.001).max(0.0), epsilon = 1e-15);
    }

    let labelled = run.graph().node_index("CALLX_npv_2").unwrap();
    assert_eq!(labelled, trade.outputs[2]);
    assert!(trade.node_range.first >= run.model_node_count);
}

#[test]
fn test_repeated_runs_are_identical() {
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let a = XvaEngine::new(config.clone())
        .with_factory(state_call_factory())
        .run()
        .unwrap()
        .completed()
        .unwrap();
    let b = XvaEngine::new(config)
        .with_factory(state_call_factory())
        .run()
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.graph_size, b.graph_size);
}

#[test]
fn test_par_swap_has_zero_initial_value() {
    let reference = d(2026, 1, 2);
    let maturity = d(2031, 1, 2);
    let unit_swap = VanillaSwap::new(
        "UNIT",
        pricer_xva::portfolio::SwapTerms {
            notional: 1.0,
            fixed_rate: 0.0,
            pay_fixed: true,
            start: reference,
            maturity,
            fixed_tenor: "1Y".to_string(),
            float_tenor: "6M".to_string(),
        },
    )
    .unwrap();
    let bond = |date: NaiveDate| (-0.02 * year_fraction(reference, date)).exp();
    let annuity: f64 = unit_swap
        .fixed_dates()
        .windows(2)
        .map(|w| year_fraction(w[0], w[1]) * bond(w[1]))
        .sum();
    let par = (1.0 - bond(maturity)) / annuity;

    let toml = format!(
        r#"
        reference_date = "2026-01-02"

        [simulation]
        samples = 1024
        grid = ["6M", "1Y", "3Y", "5Y", "6Y"]
        time_steps_per_year = 4

        [model.ir]
        currency = "EUR"
        kappa = 0.05
        sigma = 0.01
        rate = 0.02

        [[trades]]
        id = "SWP"
        type = "vanilla_swap"
        notional = 1e6
        fixed_rate = {par}
        start = "2026-01-02"
        maturity = "2031-01-02"
        "#
    );
    let run = run(EngineConfig::from_toml_str(&toml).unwrap());
    let swap = run.trade("SWP").unwrap();

    assert!(swap.npv().abs() < 1e-6, "t0 npv {}", swap.npv());
    // dead after maturity
    assert_eq!(swap.npvs[5].expectation(), 0.0);
    // floating rates move the mid-life value
    assert!(swap.profile().epe[3] > 0.0);
    assert!(swap.profile().ene[3] > 0.0);
}

#[test]
fn test_european_option_matches_black_scholes() {
    let config = EngineConfig::from_toml_str(
        r#"
        reference_date = "2026-01-02"

        [simulation]
        samples = 4096
        seed = 11
        grid = ["6M", "1Y"]

        [model.ir]
        currency = "EUR"
        kappa = 0.05
        sigma = 0.005
        rate = 0.02

        [[model.equities]]
        name = "SX5E"
        spot = 100.0
        vol = 0.2

        [[trades]]
        id = "OPT"
        type = "european_option"
        underlying = "SX5E"
        strike = 100.0
        expiry = "2027-01-02"
        "#,
    )
    .unwrap();
    let run = run(config);
    let option = run.trade("OPT").unwrap();

    let (s, k, r, v, t): (f64, f64, f64, f64, f64) = (100.0, 100.0, 0.02, 0.2, 1.0);
    let d1 = ((s / k).ln() + (r + 0.5 * v * v) * t) / (v * t.sqrt());
    let d2 = d1 - v * t.sqrt();
    let black_scholes = s * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2);

    assert_relative_eq!(option.npv(), black_scholes, max_relative = 0.02);
    // the payoff itself is held at expiry
    let profile = option.profile();
    assert_eq!(profile.ene[2], 0.0);
    assert!(profile.epe[2] > 0.0);
    assert_relative_eq!(profile.expected_value[0], option.npv());
}

#[test]
fn test_unknown_underlying_fails_trade_build() {
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let err = XvaEngine::new(config).run().unwrap_err();

    assert_eq!(err.stage, Stage::TradeBuild);
    match &err.source {
        StageError::Trade { trade_id, source } => {
            assert_eq!(trade_id, "CALLX");
            assert!(matches!(source, TradeError::Model(_)));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_expired_option_fails_trade_build_with_its_id() {
    let config = EngineConfig::from_toml_str(
        r#"
        reference_date = "2026-01-02"

        [simulation]
        samples = 16
        grid = ["1Y"]

        [model.ir]
        currency = "EUR"
        kappa = 0.05
        sigma = 0.01
        rate = 0.02

        [[model.equities]]
        name = "SX5E"
        spot = 100.0
        vol = 0.2

        [[trades]]
        id = "ACTIVE"
        type = "european_option"
        underlying = "SX5E"
        strike = 100.0
        expiry = "2027-01-02"

        [[trades]]
        id = "EXPIRED"
        type = "european_option"
        underlying = "SX5E"
        strike = 100.0
        expiry = "2025-12-01"
        "#,
    )
    .unwrap();
    let err = XvaEngine::new(config).run().unwrap_err();

    assert_eq!(err.stage, Stage::TradeBuild);
    match &err.source {
        StageError::Trade { trade_id, source } => {
            assert_eq!(trade_id, "EXPIRED");
            assert!(matches!(source, TradeError::Invalid(_)), "{:?}", source);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().starts_with("trade_build stage failed: trade EXPIRED"));
}

#[test]
fn test_option_expiry_off_grid_joins_simulation_dates() {
    let config = EngineConfig::from_toml_str(
        r#"
        reference_date = "2026-01-02"

        [simulation]
        samples = 256
        grid = ["6M", "1Y"]

        [model.ir]
        currency = "EUR"
        kappa = 0.05
        sigma = 0.01
        rate = 0.02

        [[model.equities]]
        name = "SX5E"
        spot = 100.0
        vol = 0.2

        [[trades]]
        id = "OPT9M"
        type = "european_option"
        underlying = "SX5E"
        strike = 100.0
        expiry = "2026-10-02"
        "#,
    )
    .unwrap();
    let run = run(config);
    let option = run.trade("OPT9M").unwrap();

    assert_eq!(
        option.dates,
        vec![d(2026, 1, 2), d(2026, 7, 2), d(2026, 10, 2), d(2027, 1, 2)]
    );
    assert!(option.npv() > 0.0);
    assert!(option.npvs[2].expectation() > 0.0);
    assert_eq!(option.npvs[3].expectation(), 0.0);
}

#[test]
fn test_unsupported_trade_type() {
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let err = XvaEngine::new(config)
        .with_factory(ContributorFactory::new())
        .run()
        .unwrap_err();
    assert_eq!(err.stage, Stage::TradeBuild);
    assert!(matches!(
        err.source,
        StageError::Trade {
            source: TradeError::UnsupportedTradeType(TradeType::EuropeanOption),
            ..
        }
    ));
}

#[test]
fn test_invalid_config_fails_in_config_stage() {
    let mut config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    config.simulation.samples = 0;
    let err = XvaEngine::new(config).run().unwrap_err();
    assert_eq!(err.stage, Stage::Config);
}

#[test]
fn test_cancelled_before_start() {
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let engine = XvaEngine::new(config).with_factory(state_call_factory());
    engine.cancellation_token().cancel();

    match engine.run().unwrap() {
        EngineOutcome::Cancelled { stage, evaluated } => {
            assert_eq!(stage, Stage::Config);
            assert_eq!(evaluated, 0);
        }
        EngineOutcome::Completed(_) => panic!("run should have been cancelled"),
    }
}

/// Requests cancellation as soon as the first node has been evaluated.
struct CancelOnFirstNode {
    token: CancellationToken,
    evaluated: Arc<AtomicUsize>,
}

impl EvaluationObserver for CancelOnFirstNode {
    fn on_evaluated(&mut self, _node: NodeIndex) {
        self.evaluated.fetch_add(1, AtomicOrdering::SeqCst);
        self.token.cancel();
    }
}

#[test]
fn test_cancelled_during_evaluation_discards_results() {
    init_tracing();
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let node_count = XvaEngine::new(config.clone())
        .with_factory(state_call_factory())
        .run()
        .unwrap()
        .completed()
        .unwrap()
        .graph_size;
    assert!(node_count > 1);

    let engine = XvaEngine::new(config).with_factory(state_call_factory());
    let evaluated = Arc::new(AtomicUsize::new(0));
    let observer = CancelOnFirstNode {
        token: engine.cancellation_token(),
        evaluated: Arc::clone(&evaluated),
    };
    let outcome = engine.with_observer(Box::new(observer)).run().unwrap();

    match outcome {
        EngineOutcome::Cancelled { stage, evaluated: stopped_at } => {
            assert_eq!(stage, Stage::Evaluation);
            assert!(stopped_at > 0 && stopped_at < node_count, "stopped at {}", stopped_at);
            assert_eq!(stopped_at, evaluated.load(AtomicOrdering::SeqCst));
        }
        EngineOutcome::Completed(_) => panic!("run should have been cancelled"),
    }
}

#[test]
fn test_stage_timings_and_stats() {
    let config = EngineConfig::from_toml_str(RATES_ONLY).unwrap();
    let run = XvaEngine::new(config)
        .with_factory(state_call_factory())
        .run()
        .unwrap()
        .completed()
        .unwrap();
    for stage in Stage::ALL {
        assert!(run.timings.get(stage).is_some(), "{} not timed", stage);
    }
    assert_eq!(run.eval_stats.nodes_evaluated, run.graph_size);
    assert!(run.model_node_count > 0 && run.model_node_count < run.graph_size);
}

#[test]
fn test_parameter_sensitivities() {
    let mut config = EngineConfig::from_toml_str(
        r#"
        reference_date = "2026-01-02"

        [simulation]
        samples = 2048
        grid = ["1Y"]

        [model.ir]
        currency = "EUR"
        kappa = 0.05
        sigma = 0.01
        rate = 0.02

        [[model.equities]]
        name = "SX5E"
        spot = 100.0
        vol = 0.2

        [[trades]]
        id = "OPT"
        type = "european_option"
        underlying = "SX5E"
        strike = 100.0
        expiry = "2027-01-02"
        "#,
    )
    .unwrap();
    config.evaluation.keep_values_for_derivatives = true;
    let run = run(config);

    let sensitivities = run.parameter_sensitivities("OPT").unwrap().unwrap();
    assert_eq!(sensitivities.len(), run.parameters().len());
    // at-the-money call delta is close to N(d1) = N(0.2)
    let delta = sensitivities["eq.SX5E.spot"];
    assert_relative_eq!(delta, norm_cdf(0.2), max_relative = 0.05);
    assert!(sensitivities["eq.SX5E.vol"] > 0.0);

    assert!(run.parameter_sensitivities("UNKNOWN").is_none());
}

#[test]
fn test_netted_profile_sums_trades() {
    let config = EngineConfig::from_toml_str(
        r#"
        reference_date = "2026-01-02"

        [simulation]
        samples = 64
        grid = ["1Y", "2Y"]

        [model.ir]
        currency = "EUR"
        kappa = 0.05
        sigma = 0.01
        rate = 0.02

        [[trades]]
        id = "PAY"
        type = "vanilla_swap"
        notional = 1e6
        fixed_rate = 0.02
        start = "2026-01-02"
        maturity = "2029-01-02"

        [[trades]]
        id = "RECEIVE"
        type = "vanilla_swap"
        notional = 1e6
        fixed_rate = 0.02
        pay_fixed = false
        start = "2026-01-02"
        maturity = "2029-01-02"
        "#,
    )
    .unwrap();
    let run = run(config);
    let netted = run.netted_profile().unwrap();
    for i in 0..netted.len() {
        assert!(netted.epe[i].abs() < 1e-6);
        assert!(netted.ene[i].abs() < 1e-6);
    }
    assert!(run.trade("PAY").unwrap().profile().epe[1] > 0.0);
}
