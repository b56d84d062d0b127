//! Integration test: delimited-text input and configuration files

mod common;

use std::io::Write;

use churn_insight::config::PipelineConfig;
use churn_insight::data::{ChurnSchema, DataLoader};
use churn_insight::pipeline::ChurnPipeline;
use churn_insight::ChurnError;
use common::{churn_csv, fast_config, HEADER};
use polars::prelude::*;

#[test]
fn test_load_generated_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(churn_csv(120, 1).as_bytes()).unwrap();

    let df = DataLoader::default().load_csv(file.path()).unwrap();
    assert_eq!(df.height(), 120);
    assert_eq!(df.width(), 14);
    assert_eq!(df.column("Surname").unwrap().dtype(), &DataType::String);
    assert_eq!(df.column("Gender").unwrap().dtype(), &DataType::String);
    assert_eq!(df.column("Balance").unwrap().dtype(), &DataType::Float64);

    let exited = df.column("Exited").unwrap().as_materialized_series().sum::<f64>().unwrap();
    assert_eq!(exited, 24.0);
}

#[test]
fn test_malformed_row_is_reported() {
    let mut text = churn_csv(10, 2);
    text.push_str("11,15600010,Hill,600,France,Male,forty,3,0,1,1,1,50000,0\n");

    match DataLoader::default().load_from_str(&text) {
        Err(ChurnError::Parse { row, column, .. }) => {
            assert_eq!(row, 10);
            assert_eq!(column.as_deref(), Some("Age"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }

    let short = format!("{}\n1,15600000,Hill,600,France\n", HEADER);
    let err = DataLoader::default().load_from_str(&short).unwrap_err();
    assert!(matches!(err, ChurnError::Parse { row: 0, column: None, .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_run_csv_without_identifiers() {
    let text = churn_csv(150, 3);
    let stripped: String = text
        .lines()
        .map(|line| line.splitn(4, ',').nth(3).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn.csv");
    std::fs::write(&path, stripped).unwrap();

    let outcome = ChurnPipeline::new(fast_config()).unwrap().run_csv(&path).unwrap();
    assert_eq!(outcome.report.len(), 5);
    assert_eq!(outcome.session.feature_names().len(), 10);
    assert_eq!(outcome.session.feature_names()[0], "CreditScore");
}

#[test]
fn test_non_binary_label_is_fatal() {
    let text = format!(
        "{}\n1,15600000,Hill,600,France,Male,40,3,0,1,1,1,50000,0\n\
         2,15600001,Chu,640,Spain,Female,52,1,0,2,0,1,90000,2\n",
        HEADER
    );
    let df = DataLoader::default().load_from_str(&text).unwrap();
    let err = ChurnPipeline::new(fast_config()).unwrap().run(&df).unwrap_err();
    assert!(matches!(err, ChurnError::NonBinaryLabel { row: 1, value } if value == 2.0));
}

#[test]
fn test_too_few_rows() {
    let text = format!("{}\n1,15600000,Hill,600,France,Male,40,3,0,1,1,1,50000,0\n", HEADER);
    let df = DataLoader::default().load_from_str(&text).unwrap();
    let err = ChurnPipeline::new(fast_config()).unwrap().run(&df).unwrap_err();
    assert!(matches!(err, ChurnError::InsufficientData(_)));
}

#[test]
fn test_custom_schema_from_config_file() {
    let text = churn_csv(120, 4).replacen("Exited", "Churned", 1);
    let json = r#"{
        "test_fraction": 0.25,
        "schema": { "label_column": "Churned" },
        "models": {
            "enabled": ["RandomForest", "GradientBoosting"],
            "random_forest": { "n_estimators": 10 },
            "gradient_boosting": { "n_estimators": 10 }
        }
    }"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = PipelineConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.schema, ChurnSchema::default().with_label("Churned"));

    let pipeline = ChurnPipeline::new(config).unwrap();
    let df = DataLoader::new(pipeline.config().schema.clone())
        .load_from_str(&text)
        .unwrap();
    let outcome = pipeline.run(&df).unwrap();
    assert_eq!(outcome.report.len(), 2);
    assert_eq!(outcome.split.test.len(), 30);
}

#[test]
fn test_invalid_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"test_fraction": 1.5}"#).unwrap();
    assert!(matches!(
        PipelineConfig::from_json_file(file.path()),
        Err(ChurnError::InvalidParameter { .. })
    ));

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    broken.write_all(b"{ not json").unwrap();
    assert!(matches!(
        PipelineConfig::from_json_file(broken.path()),
        Err(ChurnError::SerializationError(_))
    ));
}
