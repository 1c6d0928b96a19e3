use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use sylva_local_model::{InputRow, LocalModel, PredictionPolicy};

const ROWS: usize = 1024;

fn iris_model() -> LocalModel {
    let json = include_str!("../tests/fixtures/iris_tree.json");
    LocalModel::from_json_str(json).expect("fixture loads")
}

fn sample_rows() -> Vec<InputRow> {
    (0..ROWS)
        .map(|i| {
            let length = 1.0 + (i % 60) as f64 * 0.1;
            let width = 0.1 + (i % 25) as f64 * 0.1;
            serde_json::from_value(json!({"000002": length, "000003": width}))
                .expect("row is an object")
        })
        .collect()
}

fn bench_single_prediction(c: &mut Criterion) {
    let model = iris_model();
    let row = &sample_rows()[42];
    let policy = PredictionPolicy::default();

    c.bench_function("local_model_predict", |b| {
        b.iter(|| {
            let prediction = model.predict(black_box(row), &policy);
            black_box(prediction).ok();
        });
    });
}

fn bench_batch_prediction(c: &mut Criterion) {
    let model = iris_model();
    let rows = sample_rows();
    let policy = PredictionPolicy::default();

    let mut group = c.benchmark_group("local_model_batch");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.bench_function("sequential", |b| {
        b.iter(|| {
            for row in &rows {
                black_box(model.predict(black_box(row), &policy)).ok();
            }
        });
    });
    group.bench_function("rayon", |b| {
        b.iter(|| black_box(model.predict_batch(black_box(&rows), &policy)));
    });
    group.finish();
}

fn bench_rule_listing(c: &mut Criterion) {
    let model = iris_model();
    c.bench_function("local_model_rules", |b| {
        b.iter(|| black_box(model.rules()));
    });
}

criterion_group!(
    local_model_benches,
    bench_single_prediction,
    bench_batch_prediction,
    bench_rule_listing
);
criterion_main!(local_model_benches);
