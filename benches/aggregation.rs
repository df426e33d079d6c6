use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::ArrayD;

use cipherfed::aggregators::krum;
use cipherfed::fedavg;
use cipherfed::ModelState;

fn synthetic_updates(n_clients: usize, n_params: usize) -> Vec<ModelState> {
    (0..n_clients)
        .map(|i| {
            let values: Vec<f32> = (0..n_params)
                .map(|j| ((i * n_params + j) as f32).sin())
                .collect();
            let mut s = ModelState::new();
            s.push(
                "w",
                ArrayD::from_shape_vec(ndarray::IxDyn(&[n_params]), values).unwrap(),
            );
            s
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for &n_clients in &[10, 30] {
        for &n_params in &[1_000usize, 100_000] {
            let updates = synthetic_updates(n_clients, n_params);
            let f = (n_clients - 3) / 2;
            let id = format!("{}c_{}p", n_clients, n_params);

            group.bench_with_input(BenchmarkId::new("krum", &id), &updates, |b, updates| {
                b.iter(|| krum::aggregate(updates, f).unwrap())
            });

            group.bench_with_input(BenchmarkId::new("fedavg", &id), &updates, |b, updates| {
                b.iter(|| fedavg(updates, None).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_aggregation);
criterion_main!(benches);
