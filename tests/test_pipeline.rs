//! Integration test: full pipeline (prepare → split/scale → train → evaluate → explain)

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use churn_insight::cache::{CacheConfig, DatasetFingerprint, ModelCache};
use churn_insight::evaluation::{Evaluator, Metric};
use churn_insight::pipeline::{ChurnPipeline, PipelineStage};
use churn_insight::preprocessing::StandardScaler;
use churn_insight::training::{LogisticParams, ModelKind};
use churn_insight::ChurnError;
use common::{churn_frame, fast_config, fast_models};
use ndarray::Array1;
use polars::prelude::*;

#[test]
fn test_full_run_reports_every_model_sorted() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let df = churn_frame(1000, 7);
    let pipeline = ChurnPipeline::new(fast_config()).unwrap();
    let outcome = pipeline.run(&df).unwrap();

    let report = &outcome.report;
    assert_eq!(report.len(), 5);
    assert!(report.issues().is_empty(), "unexpected issues: {}", report);

    let names: HashSet<ModelKind> = report.rows().iter().map(|r| r.model).collect();
    assert_eq!(names.len(), 5);

    for row in report.rows() {
        for metric in Metric::ALL {
            let value = row.get(metric).unwrap();
            assert!((0.0..=1.0).contains(&value), "{} {:?} = {}", row.model, metric, value);
        }
    }
    for pair in report.rows().windows(2) {
        assert!(pair[0].accuracy >= pair[1].accuracy);
    }

    // 20% churners, so anything useful beats the majority rate
    let best = report.best_by(Metric::Accuracy).unwrap();
    assert!(best.accuracy > 0.8, "best accuracy {}", best.accuracy);

    assert_eq!(outcome.split.test.len(), 200);
    assert_eq!(outcome.timings.len(), PipelineStage::ALL.len());
    assert!(outcome.attributions.is_ok());
    assert_eq!(outcome.top_features(0).unwrap().len(), 5);
    assert!(outcome.started_at <= chrono::Utc::now());
}

#[test]
fn test_missing_label_aborts_before_training() {
    let df = churn_frame(100, 1).drop("Exited").unwrap();
    let pipeline = ChurnPipeline::new(fast_config()).unwrap();

    let err = pipeline.run(&df).unwrap_err();
    assert!(matches!(&err, ChurnError::MissingColumn(name) if name == "Exited"));
    assert!(err.is_fatal());
    assert!(pipeline.cache().is_empty());
}

#[test]
fn test_single_class_test_partition_keeps_other_metrics() {
    let df = churn_frame(300, 3);
    let pipeline = ChurnPipeline::new(fast_config()).unwrap();
    let prepared = pipeline.prepare(&df).unwrap();
    let scaled = pipeline.split_and_scale(&prepared).unwrap();
    let bank = pipeline.train(&scaled).unwrap();

    let y_test = Array1::zeros(scaled.x_test.nrows());
    let report = Evaluator::new().evaluate(&bank, &scaled.x_test, &y_test).unwrap();

    assert_eq!(report.len(), 5);
    for row in report.rows() {
        assert!(row.roc_auc.is_none());
        assert!((0.0..=1.0).contains(&row.accuracy));
        assert_eq!(row.recall, 0.0);
    }
    assert_eq!(report.issues().len(), 5);
    assert!(report
        .issues()
        .iter()
        .all(|i| matches!(i.error, ChurnError::DegenerateLabels { .. }) && !i.error.is_fatal()));
    assert!(report.to_string().contains("n/a"));
}

#[test]
fn test_repeated_runs_are_identical() {
    let df = churn_frame(400, 11);
    let first = ChurnPipeline::new(fast_config()).unwrap().run(&df).unwrap();
    let second = ChurnPipeline::new(fast_config()).unwrap().run(&df).unwrap();

    assert_eq!(first.split, second.split);
    assert_eq!(first.report.rows(), second.report.rows());

    let a = first.attributions.unwrap();
    let b = second.attributions.unwrap();
    assert_eq!(a.values(), b.values());
}

#[test]
fn test_split_is_disjoint_and_scaler_ignores_test_rows() {
    let df = churn_frame(250, 5);
    let pipeline = ChurnPipeline::new(fast_config().with_test_fraction(0.3)).unwrap();
    let prepared = pipeline.prepare(&df).unwrap();
    let scaled = pipeline.split_and_scale(&prepared).unwrap();

    let train: HashSet<usize> = scaled.indices.train.iter().copied().collect();
    let test: HashSet<usize> = scaled.indices.test.iter().copied().collect();
    assert!(train.is_disjoint(&test));
    assert_eq!(train.len() + test.len(), prepared.x.nrows());
    assert_eq!(test.len(), 75);

    let train_rows = prepared.x.select(ndarray::Axis(0), &scaled.indices.train);
    let mut reference = StandardScaler::new();
    reference.fit(&train_rows).unwrap();
    assert_eq!(reference.means(), scaled.scaler.means());
    assert_eq!(reference.stds(), scaled.scaler.stds());
}

#[test]
fn test_stratified_split_keeps_churn_rate() {
    let df = churn_frame(500, 9);
    let pipeline = ChurnPipeline::new(fast_config().with_stratify(true)).unwrap();
    let prepared = pipeline.prepare(&df).unwrap();
    let scaled = pipeline.split_and_scale(&prepared).unwrap();

    let positives = scaled.y_test.sum();
    assert_eq!(scaled.y_test.len(), 100);
    assert_eq!(positives, 20.0);
}

#[test]
fn test_failing_model_is_reported_not_fatal() {
    let df = churn_frame(200, 2);
    let models = fast_models().with_logistic_regression(LogisticParams {
        learning_rate: f64::INFINITY,
        ..Default::default()
    });
    let pipeline = ChurnPipeline::new(fast_config().with_models(models)).unwrap();
    let outcome = pipeline.run(&df).unwrap();

    assert_eq!(outcome.report.len(), 4);
    assert!(outcome.report.row(ModelKind::LogisticRegression).is_none());
    let issue = &outcome.report.issues()[0];
    assert_eq!(issue.model, ModelKind::LogisticRegression);
    assert!(matches!(
        &issue.error,
        ChurnError::TrainingFailure { model, .. } if model == "Logistic Regression"
    ));
    assert!(matches!(
        outcome.session.predict_proba(ModelKind::LogisticRegression, &df),
        Err(ChurnError::TrainingFailure { .. })
    ));
}

#[test]
fn test_session_reuses_fitted_encoding() {
    let df = churn_frame(300, 4);
    let pipeline = ChurnPipeline::new(fast_config()).unwrap();
    let outcome = pipeline.run(&df).unwrap();
    let session = &outcome.session;

    let full = session.predict_proba(ModelKind::RandomForest, &df).unwrap();

    // a later batch seen in a different order must get the same codes
    let reversed = df.reverse();
    let scores = session.predict_proba(ModelKind::RandomForest, &reversed).unwrap();
    let n = full.len();
    for i in 0..n {
        assert_eq!(scores[i], full[n - 1 - i]);
    }

    let batch = df.slice(10, 5).drop("Exited").unwrap();
    let predictions = session.predict(ModelKind::GradientBoosting, &batch).unwrap();
    assert_eq!(predictions.len(), 5);
    assert!(predictions.iter().all(|&p| p == 0.0 || p == 1.0));
}

#[test]
fn test_session_rejects_unseen_input() {
    let df = churn_frame(150, 6);
    let outcome = ChurnPipeline::new(fast_config()).unwrap().run(&df).unwrap();
    let session = &outcome.session;

    let mut unseen = df.slice(0, 3);
    unseen
        .with_column(Series::new("Geography".into(), ["France", "Italy", "Spain"]))
        .unwrap();
    match session.predict_proba(ModelKind::KNN, &unseen) {
        Err(ChurnError::UnknownCategory { column, value, row }) => {
            assert_eq!(column, "Geography");
            assert_eq!(value, "Italy");
            assert_eq!(row, 1);
        }
        other => panic!("expected UnknownCategory, got {other:?}"),
    }

    let missing = df.slice(0, 3).drop("Age").unwrap();
    assert!(matches!(
        session.predict_proba(ModelKind::KNN, &missing),
        Err(ChurnError::MissingColumn(name)) if name == "Age"
    ));
}

#[test]
fn test_shared_cache_skips_retraining() {
    let df = churn_frame(200, 8);
    let cache = Arc::new(ModelCache::new(CacheConfig::default()));

    let first = ChurnPipeline::new(fast_config())
        .unwrap()
        .with_cache(Arc::clone(&cache));
    first.run(&df).unwrap();
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.stats().misses, 5);

    let second = ChurnPipeline::new(fast_config())
        .unwrap()
        .with_cache(Arc::clone(&cache));
    let outcome = second.run(&df).unwrap();
    assert!(outcome.session.bank().fitted().iter().all(|f| f.from_cache));
    assert_eq!(cache.stats().hits, 5);

    // another seed gives another training partition
    let reseeded = ChurnPipeline::new(fast_config().with_random_seed(99))
        .unwrap()
        .with_cache(Arc::clone(&cache));
    let outcome = reseeded.run(&df).unwrap();
    assert!(outcome.session.bank().fitted().iter().all(|f| !f.from_cache));
    assert_eq!(cache.len(), 10);

    let prepared = second.prepare(&df).unwrap();
    let scaled = second.split_and_scale(&prepared).unwrap();
    let fingerprint = DatasetFingerprint::of(&scaled.x_train, &scaled.y_train);
    assert_eq!(cache.invalidate_dataset(&fingerprint), 5);
    assert_eq!(cache.len(), 5);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_report_exports() {
    let df = churn_frame(200, 12);
    let outcome = ChurnPipeline::new(fast_config()).unwrap().run(&df).unwrap();
    let mut report = outcome.report;

    let frame = report.to_dataframe().unwrap();
    assert_eq!(frame.shape(), (5, 6));

    report.sort_by(Metric::RocAuc);
    let aucs: Vec<f64> = report.rows().iter().filter_map(|r| r.roc_auc).collect();
    assert!(aucs.windows(2).all(|w| w[0] >= w[1]));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.csv");
    report.write_csv(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 6);
    assert!(text.starts_with("model,"));
}
