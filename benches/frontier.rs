use std::hint::black_box;
use std::time::Duration;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use frontier_rs::ReturnMatrix;
use frontier_rs::SolverConfig;
use frontier_rs::annualized_covariance;
use frontier_rs::efficient_frontier;
use frontier_rs::max_sharpe_weights;
use frontier_rs::min_variance_weights;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;

fn synthetic_returns(rows: usize, assets: usize, seed: u64) -> ReturnMatrix {
  let mut rng = StdRng::seed_from_u64(seed);
  let noise = Normal::new(0.0, 1.0).unwrap();
  ReturnMatrix::from_shape_fn((rows, assets), |(_, i)| {
    0.002 + 0.001 * i as f64 + 0.02 * noise.sample(&mut rng)
  })
}

fn bench_frontier(c: &mut Criterion) {
  let mut group = c.benchmark_group("Frontier");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));

  for &assets in &[4usize, 8usize, 16usize] {
    let returns = synthetic_returns(252, assets, 42);
    let cov = annualized_covariance(&returns, 252.0).unwrap();
    let bounds = vec![(-1.0, 1.0); assets];
    let solver = SolverConfig::default();

    group.bench_with_input(BenchmarkId::new("min_variance", assets), &assets, |b, _| {
      b.iter(|| {
        let result = min_variance_weights(&cov, &bounds, &solver).unwrap();
        black_box((result.iterations, result.objective))
      });
    });

    group.bench_with_input(BenchmarkId::new("max_sharpe", assets), &assets, |b, _| {
      b.iter(|| {
        let result = max_sharpe_weights(&returns, &cov, 0.02, 252.0, &bounds, &solver).unwrap();
        black_box((result.iterations, result.objective))
      });
    });
  }

  let returns = synthetic_returns(252, 8, 42);
  let cov = annualized_covariance(&returns, 252.0).unwrap();
  let bounds = vec![(-1.0, 1.0); 8];
  let solver = SolverConfig::default();

  for &points in &[20usize, 50usize] {
    group.bench_with_input(BenchmarkId::new("sweep", points), &points, |b, &points| {
      b.iter(|| {
        let curve = efficient_frontier(&returns, &cov, 252.0, points, &bounds, &solver).unwrap();
        black_box((curve.len(), curve.skipped))
      });
    });
  }

  group.finish();
}

criterion_group!(benches, bench_frontier);
criterion_main!(benches);
