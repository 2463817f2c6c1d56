//! Benchmarks of the L-BFGS driver on diagonal quadratics.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rsdfit_core::{
    objective::FnObjective,
    types::DVector,
};
use rsdfit_optim::{CurvatureMemory, LBFGSConfig, LBFGS};

fn diagonal(dim: usize) -> DVector<f64> {
    DVector::from_iterator(dim, (0..dim).map(|i| 1.0 + i as f64 / dim as f64 * 9.0))
}

fn benchmark_minimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("lbfgs_minimize");

    for &dim in &[10, 100, 1000] {
        let a = diagonal(dim);
        let x0 = DVector::from_element(dim, 10.0);

        for &memory_size in &[5, 20] {
            group.bench_with_input(
                BenchmarkId::new(format!("M{}", memory_size), dim),
                &dim,
                |b, _| {
                    b.iter(|| {
                        let objective = FnObjective::new(
                            |x: &DVector<f64>| 0.5 * x.component_mul(&a).dot(x),
                            |x: &DVector<f64>| x.component_mul(&a),
                        );
                        let config = LBFGSConfig::new()
                            .with_memory_size(memory_size)
                            .with_display(0)
                            .with_max_iterations(50);
                        let mut lbfgs = LBFGS::new(objective, x0.clone(), config).unwrap();
                        black_box(lbfgs.run_to_completion().unwrap())
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_two_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_loop_recursion");

    for &dim in &[100, 1000] {
        let a = diagonal(dim);
        let mut memory = CurvatureMemory::new(20, dim).unwrap();
        for k in 0..20 {
            let s = DVector::from_fn(dim, |i, _| ((i + k) % 7) as f64 - 3.0);
            let y = s.component_mul(&a);
            memory.update(&s, &y, false).unwrap();
        }
        let g = DVector::from_element(dim, 1.0);
        let gnorm = g.norm();
        let mut alpha = vec![0.0; 20];

        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, _| {
            b.iter(|| {
                black_box(
                    memory
                        .two_loop_recursion(20, black_box(&g), gnorm, &mut alpha)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_minimize, benchmark_two_loop);
criterion_main!(benches);
