//! Benchmarks for the model forward pass and a training step.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use traffic_gnn::autograd::{clear_graph, no_grad};
use traffic_gnn::prelude::*;

fn sample(num_nodes: usize) -> GraphData {
    let spec = SampleSpec {
        num_nodes,
        num_features: 10,
        num_classes: 3,
    };
    generate_sample_data(spec, Some(42)).unwrap()
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("traffic_gnn_forward");

    for size in [100, 500, 1000].iter() {
        let data = sample(*size);
        let adj = data.adjacency();
        let mut model = TrafficGNN::with_seed(ModelConfig::new(10, 3), Some(42)).unwrap();
        model.eval();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| no_grad(|| model.forward(black_box(&data.x), black_box(&adj))));
        });
    }

    group.finish();
}

fn bench_train_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("traffic_gnn_train_step");

    for size in [100, 500].iter() {
        let data = sample(*size);
        let adj = data.adjacency();
        let train_idx = data.train_indices().unwrap();
        let mut model = TrafficGNN::with_seed(ModelConfig::new(10, 3), Some(42)).unwrap();
        let mut trainer = Trainer::new(&model, 0.01);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| trainer.step(&mut model, &data, &adj, black_box(&train_idx)));
        });
        clear_graph();
    }

    group.finish();
}

criterion_group!(benches, bench_forward, bench_train_step);
criterion_main!(benches);
