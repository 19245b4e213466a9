//! Criterion benchmarks for orrery-ensemble: base learner and stack training.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use orrery_ensemble::{
    AdaBoostConfig, Classifier, LogisticRegressionConfig, RandomForestConfig, StackingConfig,
};

fn make_classification(
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    seed: u64,
) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

fn bench_forest_train(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 3, 42);
    let cfg = RandomForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("forest_train_500x20_3class_50trees", |b| {
        b.iter(|| cfg.fit(&features, &labels, 3).unwrap());
    });
}

fn bench_adaboost_train(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 3, 42);
    let cfg = AdaBoostConfig::new(50).unwrap().with_seed(42);

    c.bench_function("adaboost_train_500x20_3class_50rounds", |b| {
        b.iter(|| cfg.fit(&features, &labels, 3).unwrap());
    });
}

fn bench_logistic_train(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 3, 42);
    let cfg = LogisticRegressionConfig::new().with_suppress_warnings(true);

    c.bench_function("logistic_train_500x20_3class", |b| {
        b.iter(|| cfg.fit(&features, &labels, 3).unwrap());
    });
}

fn bench_stack_train_and_predict(c: &mut Criterion) {
    let (features, labels) = make_classification(300, 20, 3, 42);
    let cfg = StackingConfig::new(
        RandomForestConfig::new(20).unwrap(),
        AdaBoostConfig::new(20).unwrap(),
    );

    c.bench_function("stack_train_300x20_3class", |b| {
        b.iter(|| cfg.fit(&features, &labels, 3).unwrap());
    });

    let model = cfg.fit(&features, &labels, 3).unwrap();
    c.bench_function("stack_predict_proba_batch_300x20", |b| {
        b.iter(|| model.predict_proba_batch(&features).unwrap());
    });
}

criterion_group!(
    benches,
    bench_forest_train,
    bench_adaboost_train,
    bench_logistic_train,
    bench_stack_train_and_predict
);
criterion_main!(benches);
