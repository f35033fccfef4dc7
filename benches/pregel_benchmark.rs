use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pregel_engine::graph::{CsrGraph, Orientation};
use pregel_engine::pregel::messenger::Sum;
use pregel_engine::pregel::{ComputeContext, InitContext, Messages, Pregel, PregelComputation, PregelConfig};

struct Wcc;

impl PregelComputation for Wcc {
    type Value = u64;
    type Message = u64;

    fn init(&self, context: &mut InitContext<'_, u64>) -> anyhow::Result<()> {
        let id = context.node_id();
        context.set_value(id);
        Ok(())
    }

    fn compute(&self, context: &mut ComputeContext<'_, u64, u64>, messages: Messages<'_, u64>) -> anyhow::Result<()> {
        let current = *context.value();
        let best = messages.fold(current, u64::min);
        if context.is_initial_superstep() || best < current {
            context.set_value(best);
            context.send_to_neighbors(best);
        }
        context.vote_to_halt();
        Ok(())
    }
}

struct PageRank;

impl PregelComputation for PageRank {
    type Value = f64;
    type Message = f64;

    fn init(&self, context: &mut InitContext<'_, f64>) -> anyhow::Result<()> {
        let n = context.node_count() as f64;
        context.set_value(1.0 / n);
        Ok(())
    }

    fn compute(&self, context: &mut ComputeContext<'_, f64, f64>, messages: Messages<'_, f64>) -> anyhow::Result<()> {
        if !context.is_initial_superstep() {
            let n = context.node_count() as f64;
            context.set_value(0.15 / n + 0.85 * messages.sum::<f64>());
        }
        let degree = context.degree();
        if degree > 0 {
            context.send_to_neighbors(*context.value() / degree as f64);
        }
        Ok(())
    }
}

/// Deterministic pseudo-random graph with `n` nodes and average out-degree `d`.
fn random_graph(n: u64, d: u64, orientation: Orientation) -> CsrGraph {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let edges: Vec<(u64, u64)> = (0..n * d).map(|_| (next() % n, next() % n)).collect();
    CsrGraph::from_edges(n, &edges, orientation).unwrap()
}

fn bench_wcc(c: &mut Criterion) {
    let graph = random_graph(100_000, 4, Orientation::Undirected);
    let mut group = c.benchmark_group("pregel_wcc");
    group.sample_size(10);
    for concurrency in [1, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(concurrency), &concurrency, |b, &concurrency| {
            b.iter(|| {
                let config = PregelConfig::default().concurrency(concurrency).max_iterations(100);
                let result = Pregel::new(&graph, config, Wcc).unwrap().run().unwrap();
                black_box(result.ran_iterations)
            });
        });
    }
    group.finish();
}

fn bench_page_rank_reducing(c: &mut Criterion) {
    let graph = random_graph(100_000, 8, Orientation::Natural);
    let mut group = c.benchmark_group("pregel_page_rank");
    group.sample_size(10);
    group.bench_function("queue", |b| {
        b.iter(|| {
            let config = PregelConfig::default().max_iterations(10);
            black_box(Pregel::new(&graph, config, PageRank).unwrap().run().unwrap().ran_iterations)
        });
    });
    group.bench_function("reducing_sum", |b| {
        b.iter(|| {
            let config = PregelConfig::default().max_iterations(10);
            black_box(
                Pregel::with_reducer(&graph, config, PageRank, Sum)
                    .unwrap()
                    .run()
                    .unwrap()
                    .ran_iterations,
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_wcc, bench_page_rank_reducing);
criterion_main!(benches);
