//! Pipeline stages and their timings.

use std::fmt;
use std::time::Duration;

/// Orchestrator stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Configuration checks before any work.
    Config,
    /// Model construction from the builder.
    ModelBuild,
    /// Model layer appended to the graph.
    GraphBuild,
    /// Trade subgraphs appended.
    TradeBuild,
    /// Path tensor generation.
    PathGeneration,
    /// Constants, parameters and variates bound.
    Binding,
    /// Forward evaluation.
    Evaluation,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Config,
        Stage::ModelBuild,
        Stage::GraphBuild,
        Stage::TradeBuild,
        Stage::PathGeneration,
        Stage::Binding,
        Stage::Evaluation,
    ];

    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::ModelBuild => "model_build",
            Stage::GraphBuild => "graph_build",
            Stage::TradeBuild => "trade_build",
            Stage::PathGeneration => "path_generation",
            Stage::Binding => "binding",
            Stage::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock time spent per stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimings {
    entries: Vec<(Stage, Duration)>,
}

impl StageTimings {
    /// Records the duration of `stage`.
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.entries.push((stage, elapsed));
    }

    /// Duration of `stage`, if it ran.
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.entries
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|&(_, d)| d)
    }

    /// Sum over all recorded stages.
    pub fn total(&self) -> Duration {
        self.entries.iter().map(|&(_, d)| d).sum()
    }

    /// Recorded `(stage, duration)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::TradeBuild.to_string(), "trade_build");
    }

    #[test]
    fn test_timings() {
        let mut t = StageTimings::default();
        t.record(Stage::ModelBuild, Duration::from_millis(3));
        t.record(Stage::Evaluation, Duration::from_millis(7));
        assert_eq!(t.get(Stage::Evaluation), Some(Duration::from_millis(7)));
        assert_eq!(t.get(Stage::Binding), None);
        assert_eq!(t.total(), Duration::from_millis(10));
        assert_eq!(t.iter().count(), 2);
    }
}
