//! Inference engine benchmarks.
//!
//! Engines are compared on randomly generated layered networks, with and
//! without evidence.
//!
//! Run with:
//! ```bash
//! cargo bench --bench inference
//! ```

use bn_rs::assignment::Assignment;
use bn_rs::config::SearchConfig;
use bn_rs::engine::{BestEngine, InferenceEngine, RecursiveConditioning, SimpleConditioning, VariableElimination};
use bn_rs::moral::MoralGraph;
use bn_rs::network::Network;
use bn_rs::types::VarId;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Helper: random layered network
// ============================================================================

/// Each variable below the first layer picks up to `max_parents` parents from the layer above.
fn layered(seed: u64, layers: usize, width: usize, max_parents: usize) -> Network {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut net = Network::new(format!("layered-{}x{}", layers, width));
    let mut previous: Vec<VarId> = Vec::new();

    for layer in 0..layers {
        let mut current = Vec::with_capacity(width);
        for i in 0..width {
            let card = rng.gen_range(2..=3);
            let domain: Vec<String> = (0..card).map(|v| format!("s{}", v)).collect();
            let var = net.add_variable(format!("x{}_{}", layer, i), domain).unwrap();
            if !previous.is_empty() {
                let k = rng.gen_range(1..=max_parents.min(previous.len()));
                for &p in previous.choose_multiple(&mut rng, k) {
                    net.add_parent(var, p).unwrap();
                }
            }
            current.push(var);
        }
        previous = current;
    }

    for var in net.ids().collect::<Vec<_>>() {
        let card = net.cardinality(var);
        let rows = net.variable(var).row_count();
        let mut table = Vec::with_capacity(rows * card);
        for _ in 0..rows {
            let row: Vec<f64> = (0..card).map(|_| rng.gen_range(0.05..1.0)).collect();
            let total: f64 = row.iter().sum();
            table.extend(row.iter().map(|p| p / total));
        }
        net.set_probabilities(var, &table).unwrap();
    }
    net
}

/// Observes the first value of every leaf.
fn leaf_evidence(net: &Network) -> Assignment {
    net.leaves().into_iter().map(|v| (v, 0)).collect()
}

/// All single-variable posteriors, from a fresh engine.
fn all_marginals(engine: &mut dyn InferenceEngine, evidence: &Assignment) -> f64 {
    engine.replace_evidence(evidence.clone()).unwrap();
    let ids: Vec<VarId> = engine.network().ids().collect();
    ids.into_iter().map(|v| engine.distribution(v).unwrap()[0]).sum()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_marginals(c: &mut Criterion) {
    let mut group = c.benchmark_group("marginals");
    group.sample_size(10);

    for layers in [3, 4] {
        let net = layered(1, layers, 4, 2);
        let evidence = leaf_evidence(&net);

        group.bench_with_input(BenchmarkId::new("simple", layers), &net, |b, net| {
            b.iter(|| all_marginals(&mut SimpleConditioning::new(net), &evidence))
        });
        group.bench_with_input(BenchmarkId::new("elimination", layers), &net, |b, net| {
            b.iter(|| all_marginals(&mut VariableElimination::new(net), &evidence))
        });
        group.bench_with_input(BenchmarkId::new("recursive", layers), &net, |b, net| {
            b.iter(|| all_marginals(&mut RecursiveConditioning::new(net), &evidence))
        });
        group.bench_with_input(BenchmarkId::new("best", layers), &net, |b, net| {
            b.iter(|| all_marginals(&mut BestEngine::new(net), &evidence))
        });
    }

    group.finish();
}

fn bench_evidence_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("evidence_changes");
    group.sample_size(10);

    let net = layered(2, 5, 4, 2);
    let leaves = net.leaves();
    let root = net.roots()[0];

    // Caches that survive evidence changes pay off here.
    group.bench_function("recursive", |b| {
        let mut engine = RecursiveConditioning::new(&net);
        b.iter(|| {
            let mut total = 0.0;
            for &leaf in &leaves {
                for value in 0..net.cardinality(leaf) {
                    engine.set_evidence(leaf, value).unwrap();
                    total += engine.probability(root, 0).unwrap();
                }
                engine.remove_evidence(leaf);
            }
            total
        })
    });
    group.bench_function("elimination", |b| {
        let mut engine = VariableElimination::new(&net);
        b.iter(|| {
            let mut total = 0.0;
            for &leaf in &leaves {
                for value in 0..net.cardinality(leaf) {
                    engine.set_evidence(leaf, value).unwrap();
                    total += engine.probability(root, 0).unwrap();
                }
                engine.remove_evidence(leaf);
            }
            total
        })
    });

    group.finish();
}

fn bench_order_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_search");
    group.sample_size(10);

    for width in [3, 4, 5] {
        let net = layered(3, 3, width, 3);
        let graph = MoralGraph::from_network(&net);

        group.bench_with_input(BenchmarkId::new("min_fill", width), &graph, |b, g| {
            b.iter(|| g.min_fill_order())
        });
        group.bench_with_input(BenchmarkId::new("branch_and_bound", width), &graph, |b, g| {
            b.iter(|| g.branch_and_bound(&SearchConfig::default()).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("best_first", width), &graph, |b, g| {
            b.iter(|| g.best_first().unwrap())
        });
    }

    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    group.sample_size(10);

    let net = layered(4, 4, 4, 2);
    let evidence = leaf_evidence(&net);

    group.bench_function("ancestral", |b| {
        let mut engine = SimpleConditioning::new(&net);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        b.iter(|| engine.sample(&mut rng).unwrap())
    });
    group.bench_function("recursive_generate", |b| {
        let mut engine = RecursiveConditioning::new(&net);
        engine.replace_evidence(evidence.clone()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        b.iter(|| engine.sample(&mut rng).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_marginals,
    bench_evidence_changes,
    bench_order_search,
    bench_sampling
);
criterion_main!(benches);
