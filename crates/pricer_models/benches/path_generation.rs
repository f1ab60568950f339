//! Criterion benchmarks for path tensor generation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pricer_models::rng::{generate_paths, Ordering, PathGeneratorSpec, SequenceType};

/// Benchmark each sequence type over a two-factor, 40-step grid.
fn bench_sequences(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_paths");
    let n_paths = 10_000;

    for sequence in [
        SequenceType::PseudoRandom,
        SequenceType::PseudoRandomAntithetic,
        SequenceType::Sobol,
        SequenceType::SobolBrownianBridge,
    ] {
        let spec = PathGeneratorSpec {
            sequence,
            n_factors: 2,
            n_steps: 40,
            seed: 42,
            ordering: Ordering::Steps,
            step_times: Vec::new(),
        };
        group.bench_with_input(
            BenchmarkId::new(format!("{:?}", sequence), n_paths),
            &spec,
            |b, spec| b.iter(|| generate_paths(black_box(spec), n_paths).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sequences);
criterion_main!(benches);
