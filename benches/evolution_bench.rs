//! Criterion benchmarks for the u-evolution algorithms.
//!
//! Uses synthetic problems (Sphere function, OneMax) to measure
//! pure algorithm overhead independent of any domain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use u_evolution::adaptive::{
    AdaptationBounds, AdaptationProblem, AdaptationType, AdaptiveEvolutionaryAlgorithm,
};
use u_evolution::ea::{Crossover, EaConfig, EvolutionaryAlgorithm, Mutation, Selection};
use u_evolution::problem::{DecisionVariable, OptimizationProblem, Value};
use u_evolution::StopConditions;

// ===========================================================================
// Problems
// ===========================================================================

/// Minimize sum(x_i^2) over [-5, 5]^dim.
fn sphere(dim: usize) -> OptimizationProblem {
    let mut builder = OptimizationProblem::builder().minimize();
    for i in 0..dim {
        builder = builder.variable(format!("x{i}"), DecisionVariable::float(-5.0, 5.0).unwrap());
    }
    builder
        .objective(|v: &[Value]| Ok(v.iter().filter_map(Value::as_f64).map(|x| x * x).sum::<f64>()))
        .build()
        .unwrap()
}

/// Maximize the number of `true` genes.
fn onemax(dim: usize) -> OptimizationProblem {
    let mut builder = OptimizationProblem::builder().maximize();
    for i in 0..dim {
        let bit = DecisionVariable::choice([false, true]).unwrap();
        builder = builder.variable(format!("b{i}"), bit);
    }
    builder
        .objective(|v: &[Value]| Ok(v.iter().filter(|g| g.as_bool() == Some(true)).count() as f64))
        .build()
        .unwrap()
}

fn iterations(n: usize) -> StopConditions {
    StopConditions::builder().max_iterations(n).build().unwrap()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_ea_sphere(c: &mut Criterion) {
    let mut group = c.benchmark_group("ea_sphere");
    group.sample_size(10);

    for (dim, pop, gen) in [(10usize, 50usize, 50usize), (50, 100, 30), (100, 100, 20)] {
        let problem = sphere(dim);
        let config = EaConfig::default()
            .with_population_size(pop)
            .with_selection(Selection::Tournament { group_size: 3 })
            .with_seed(42);
        group.bench_with_input(
            BenchmarkId::new(format!("d{}_p{}_g{}", dim, pop, gen), dim),
            &(problem, config),
            |b, (p, c)| {
                b.iter(|| {
                    let mut ea =
                        EvolutionaryAlgorithm::new(black_box(p), iterations(gen), c.clone())
                            .unwrap();
                    black_box(ea.run().unwrap())
                })
            },
        );
    }
    group.finish();
}

fn bench_ea_onemax_operators(c: &mut Criterion) {
    let mut group = c.benchmark_group("ea_onemax_operators");
    group.sample_size(10);

    let problem = onemax(64);
    let operators = [
        ("single_point", Crossover::SinglePoint, Mutation::Probabilistic),
        ("multi_point", Crossover::MultiPoint { points: 3 }, Mutation::MultiPoint { points: 2 }),
        ("uniform", Crossover::Uniform, Mutation::SinglePoint),
    ];
    for (name, crossover, mutation) in operators {
        let config = EaConfig::default()
            .with_population_size(60)
            .with_crossover(crossover)
            .with_mutation(mutation)
            .with_mutation_chance(0.02)
            .with_seed(7);
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, c| {
            b.iter(|| {
                let mut ea =
                    EvolutionaryAlgorithm::new(&problem, iterations(40), c.clone()).unwrap();
                black_box(ea.run().unwrap())
            })
        });
    }
    group.finish();
}

fn bench_adaptive_sphere(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_sphere");
    group.sample_size(10);

    for &dim in &[5usize, 20] {
        let original = Arc::new(sphere(dim));
        group.bench_with_input(BenchmarkId::from_parameter(dim), &original, |b, p| {
            b.iter(|| {
                let adaptation = AdaptationProblem::new(
                    Arc::clone(p),
                    AdaptationBounds::default().with_population_size(10, 40),
                    AdaptationType::BestSolution,
                    iterations(15),
                )
                .unwrap();
                let config = EaConfig::default().with_population_size(6).with_seed(42);
                let mut adaptive =
                    AdaptiveEvolutionaryAlgorithm::new(adaptation, iterations(3), config).unwrap();
                black_box(adaptive.run().unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ea_sphere, bench_ea_onemax_operators, bench_adaptive_sphere);
criterion_main!(benches);
