use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use liftwise_rf::{CrossValidation, DecisionTreeConfig, ModelSpec, RandomForestConfig};

const N_SENSORS: usize = 52;

struct Lifts {
    features: Vec<Vec<f64>>,
    labels: Vec<usize>,
    names: Vec<String>,
}

/// Five classes of noisy sensor rows; only the first four channels carry
/// signal.
fn lifts(n_rows: usize) -> Lifts {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let labels: Vec<usize> = (0..n_rows).map(|i| i % 5).collect();
    let features = labels
        .iter()
        .map(|&class| {
            (0..N_SENSORS)
                .map(|s| {
                    let signal = if s < 4 { (class * (s + 1)) as f64 } else { 0.0 };
                    signal + 2.0 * rng.r#gen::<f64>()
                })
                .collect()
        })
        .collect();
    Lifts {
        features,
        labels,
        names: (0..N_SENSORS).map(|s| format!("sensor_{s}")).collect(),
    }
}

fn fitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    for n_rows in [500, 2000] {
        let data = lifts(n_rows);
        let tree = DecisionTreeConfig::rpart_defaults();
        group.bench_with_input(BenchmarkId::new("tree", n_rows), &data, |b, d| {
            b.iter(|| tree.fit(black_box(&d.features), &d.labels).unwrap());
        });
    }

    group.sample_size(10);
    let data = lifts(1000);
    let forest = RandomForestConfig::new(50).unwrap();
    group.bench_function("forest_50_trees/1000", |b| {
        b.iter(|| forest.fit(black_box(&data.features), &data.labels, &data.names).unwrap());
    });
    group.finish();
}

fn scoring(c: &mut Criterion) {
    let data = lifts(1000);
    let model = ModelSpec::Forest(RandomForestConfig::new(50).unwrap())
        .fit(&data.features, &data.labels, &data.names)
        .unwrap();
    c.bench_function("forest_predict_batch/1000", |b| {
        b.iter(|| model.predict_batch(black_box(&data.features)).unwrap());
    });
}

fn cross_validation(c: &mut Criterion) {
    let data = lifts(1000);
    let spec = ModelSpec::Tree(DecisionTreeConfig::rpart_defaults());
    let cv = CrossValidation::new(5).unwrap();

    let mut group = c.benchmark_group("cross_validation");
    group.sample_size(10);
    group.bench_function("tree_5_folds/1000", |b| {
        b.iter(|| cv.evaluate(&spec, &data.features, &data.labels, &data.names).unwrap());
    });
    group.finish();
}

criterion_group!(benches, fitting, scoring, cross_validation);
criterion_main!(benches);
