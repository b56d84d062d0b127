use churn_insight::config::PipelineConfig;
use churn_insight::explainability::TreeExplainer;
use churn_insight::pipeline::ChurnPipeline;
use churn_insight::training::{GradientBoostingConfig, ModelBankConfig, ModelKind, RandomForestParams};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_churn_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let geographies = ["France", "Germany", "Spain"];
    let genders = ["Male", "Female"];

    let mut geography = Vec::with_capacity(n_rows);
    let mut gender = Vec::with_capacity(n_rows);
    let mut numeric: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); 8];
    let mut exited = Vec::with_capacity(n_rows);

    for _ in 0..n_rows {
        let geo = geographies[rng.gen_range(0..3)];
        geography.push(geo);
        gender.push(genders[rng.gen_range(0..2)]);

        let age = rng.gen_range(18.0..80.0_f64);
        let active = rng.gen_range(0..=1) as f64;
        let row = [
            rng.gen_range(350.0..850.0),
            age,
            rng.gen_range(0.0..10.0),
            rng.gen_range(0.0..220_000.0),
            rng.gen_range(1..=4) as f64,
            rng.gen_range(0..=1) as f64,
            active,
            rng.gen_range(10_000.0..200_000.0),
        ];
        for (column, value) in numeric.iter_mut().zip(row) {
            column.push(value);
        }

        let score = 0.06 * (age - 40.0) - 0.9 * active
            + if geo == "Germany" { 0.8 } else { 0.0 }
            + rng.gen_range(-1.0..1.0);
        exited.push(if score > 0.8 { 1.0 } else { 0.0 });
    }

    let names = [
        "CreditScore",
        "Age",
        "Tenure",
        "Balance",
        "NumOfProducts",
        "HasCrCard",
        "IsActiveMember",
        "EstimatedSalary",
    ];
    let mut columns: Vec<Column> = vec![
        Series::new("Geography".into(), geography).into(),
        Series::new("Gender".into(), gender).into(),
    ];
    for (name, values) in names.iter().zip(numeric) {
        columns.push(Series::new((*name).into(), values).into());
    }
    columns.push(Series::new("Exited".into(), exited).into());

    DataFrame::new(columns).unwrap()
}

fn bench_config() -> PipelineConfig {
    PipelineConfig::default().with_models(
        ModelBankConfig::default()
            .with_random_forest(RandomForestParams {
                n_estimators: 50,
                ..Default::default()
            })
            .with_gradient_boosting(GradientBoostingConfig {
                n_estimators: 50,
                ..Default::default()
            }),
    )
}

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let df = create_churn_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("run", n_rows), &df, |b, df| {
            b.iter(|| {
                // a fresh pipeline per iteration keeps the model cache cold
                let pipeline = ChurnPipeline::new(bench_config()).unwrap();
                pipeline.run(black_box(df)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_cached_run(c: &mut Criterion) {
    let df = create_churn_data(2000);
    let pipeline = ChurnPipeline::new(bench_config()).unwrap();
    pipeline.run(&df).unwrap();

    c.bench_function("pipeline_cached_run", |b| {
        b.iter(|| pipeline.run(black_box(&df)).unwrap())
    });
}

fn bench_tree_shap(c: &mut Criterion) {
    let df = create_churn_data(2000);
    let pipeline = ChurnPipeline::new(bench_config()).unwrap();
    let prepared = pipeline.prepare(&df).unwrap();
    let scaled = pipeline.split_and_scale(&prepared).unwrap();
    let bank = pipeline.train(&scaled).unwrap();

    let mut group = c.benchmark_group("tree_shap");
    for kind in [ModelKind::RandomForest, ModelKind::GradientBoosting] {
        let model = bank.get(kind).unwrap();
        let explainer = TreeExplainer::new(model).unwrap();
        group.bench_function(BenchmarkId::new("explain_50_rows", kind.name()), |b| {
            b.iter(|| {
                explainer
                    .explain(black_box(&scaled.x_test), &prepared.feature_names, 50)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_session_scoring(c: &mut Criterion) {
    let df = create_churn_data(2000);
    let outcome = ChurnPipeline::new(bench_config()).unwrap().run(&df).unwrap();
    let batch = df.slice(0, 500);

    let mut group = c.benchmark_group("session_predict_proba");
    for kind in ModelKind::ALL {
        group.bench_function(kind.name(), |b| {
            b.iter(|| outcome.session.predict_proba(kind, black_box(&batch)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_full_run,
    bench_cached_run,
    bench_tree_shap,
    bench_session_scoring
);
criterion_main!(benches);
