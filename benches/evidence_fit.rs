// ========================================================================================
//
//                 Evidence approximation benchmark for bayesreg
//
// ========================================================================================
//
// Compares the EM and fixed-point update rules on the same factorized problem,
// and measures the one-time SVD cost that both of them amortize.
//
// ========================================================================================

use bayesreg::data::Dataset;
use bayesreg::estimate::approximate_evidence;
use bayesreg::factorization::Factorization;
use bayesreg::{EvidenceMethod, Hyperparameters};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array1, Array2};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SHAPES: [(usize, usize); 3] = [(200, 5), (2_000, 20), (10_000, 50)];

fn random_problem(n: usize, m: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(0x5EED_F64 + (n * m) as u64);
    let x = Array2::from_shape_fn((n, m), |_| rng.sample::<f64, _>(Standard));
    let weights = Array1::from_shape_fn(m, |j| (j as f64 + 1.0).recip());
    let y = x.dot(&weights) + Array1::from_shape_fn(n, |_| 0.1 * rng.sample::<f64, _>(Standard));
    Dataset::new(x.view(), y.view()).expect("benchmark data is well formed")
}

fn benchmark_evidence(c: &mut Criterion) {
    let problems: Vec<_> = SHAPES
        .iter()
        .map(|&(n, m)| {
            let data = random_problem(n, m);
            let factorization = Factorization::new(&data).expect("factorization succeeds");
            ((n, m), data, factorization)
        })
        .collect();

    let mut group = c.benchmark_group("evidence_approximation");
    for ((n, m), data, factorization) in problems.iter() {
        group.throughput(Throughput::Elements((*n * *m) as u64));
        let label = format!("{n}x{m}");

        group.bench_with_input(BenchmarkId::new("svd", &label), data, |b, input| {
            b.iter(|| black_box(Factorization::new(black_box(input)).is_ok()));
        });

        for method in [EvidenceMethod::Em, EvidenceMethod::FixedPoint] {
            group.bench_with_input(
                BenchmarkId::new(method.name(), &label),
                &(data, factorization),
                |b, (data, factorization)| {
                    b.iter(|| {
                        let result = approximate_evidence(
                            data,
                            factorization,
                            method,
                            Hyperparameters::new(0.5, 0.5),
                            100,
                            1e-5,
                        );
                        black_box(result.is_ok());
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(evidence_fit, benchmark_evidence);
criterion_main!(evidence_fit);
