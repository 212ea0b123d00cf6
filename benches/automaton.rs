//! Benchmarks for rule compilation, automaton steps and the genetic search.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use cellygen::{
    compiler,
    compute::{Automaton, CancelToken, Grid, evolution::EvolutionEngine},
    schema::{AutomatonConfig, EvolutionConfig, SelectionMethod, Targets},
};

fn life(size: usize) -> (AutomatonConfig, Automaton) {
    let config = AutomatonConfig {
        width: size,
        height: size,
        ..AutomatonConfig::default()
    };
    let rules = compiler::compile(&config)
        .into_result()
        .expect("default rules compile");
    let automaton = Automaton::new(config.states.clone(), config.neighborhood, rules);
    (config, automaton)
}

fn bench_compile(c: &mut Criterion) {
    let config = AutomatonConfig::default();
    c.bench_function("compile_life", |b| {
        b.iter(|| compiler::compile(black_box(&config)));
    });
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("automaton_step");
    let cancel = CancelToken::new();

    for size in [32, 64, 128] {
        let (config, automaton) = life(size);
        let full_scan = automaton.clone().with_full_scan();

        let mut grid = Grid::new(size, size);
        grid.populate(&config.states, 0.3, &mut StdRng::seed_from_u64(42));

        group.bench_with_input(
            BenchmarkId::new("heuristic", format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| automaton.changes(black_box(&grid), &cancel));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("full_scan", format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| full_scan.changes(black_box(&grid), &cancel));
            },
        );
    }

    group.finish();
}

fn bench_sparse_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_step");
    let cancel = CancelToken::new();

    for density in [0.01, 0.05, 0.2] {
        let (config, automaton) = life(128);
        let mut grid = Grid::new(128, 128);
        grid.populate(&config.states, density, &mut StdRng::seed_from_u64(7));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:.0}%", density * 100.0)),
            &density,
            |b, _| {
                b.iter(|| automaton.changes(black_box(&grid), &cancel));
            },
        );
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for selection in [SelectionMethod::Tournament, SelectionMethod::SteadyState] {
        let automaton = AutomatonConfig {
            width: 16,
            height: 16,
            ..AutomatonConfig::default()
        };
        let config = EvolutionConfig {
            population_size: 20,
            selection,
            targets: Targets {
                generations: 50,
                population: 0,
                epochs: 3,
            },
            random_seed: Some(1),
            ..EvolutionConfig::default()
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(selection),
            &selection,
            |b, _| {
                b.iter(|| {
                    let mut engine = EvolutionEngine::new(config.clone(), &automaton)
                        .expect("valid search settings");
                    engine.run()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_step,
    bench_sparse_step,
    bench_search
);
criterion_main!(benches);
