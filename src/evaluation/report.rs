//! Metric report over the model bank

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use super::metrics::{roc_auc, ConfusionCounts};
use crate::error::{ChurnError, Result};
use crate::training::{ModelKind, TrainedBank, TrainedModel};

/// Metric columns of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Accuracy,
    F1,
    Precision,
    Recall,
    RocAuc,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Accuracy,
        Metric::F1,
        Metric::Precision,
        Metric::Recall,
        Metric::RocAuc,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::F1 => "f1",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::RocAuc => "roc_auc",
        }
    }
}

/// Test-partition metrics for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub model: ModelKind,
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    /// `None` when the test labels hold a single class
    pub roc_auc: Option<f64>,
}

impl MetricRow {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Accuracy => Some(self.accuracy),
            Metric::F1 => Some(self.f1),
            Metric::Precision => Some(self.precision),
            Metric::Recall => Some(self.recall),
            Metric::RocAuc => self.roc_auc,
        }
    }
}

/// A model excluded from, or degraded in, the report
#[derive(Debug)]
pub struct ModelIssue {
    pub model: ModelKind,
    pub error: ChurnError,
}

/// Per-model metrics, sorted by accuracy descending unless re-sorted
#[derive(Debug, Default)]
pub struct MetricReport {
    rows: Vec<MetricRow>,
    issues: Vec<ModelIssue>,
}

impl MetricReport {
    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn issues(&self) -> &[ModelIssue] {
        &self.issues
    }

    pub fn row(&self, model: ModelKind) -> Option<&MetricRow> {
        self.rows.iter().find(|r| r.model == model)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Model with the highest value of `metric`
    pub fn best_by(&self, metric: Metric) -> Option<&MetricRow> {
        self.rows
            .iter()
            .filter(|r| r.get(metric).is_some())
            .fold(None, |best: Option<&MetricRow>, r| match best {
                Some(b) if b.get(metric) >= r.get(metric) => Some(b),
                _ => Some(r),
            })
    }

    /// Stable sort, descending by `metric`; unavailable values go last
    pub fn sort_by(&mut self, metric: Metric) {
        self.rows.sort_by(|a, b| match (a.get(metric), b.get(metric)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }

    /// One row per model: `model` then the metric columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let names: Vec<&str> = self.rows.iter().map(|r| r.model.name()).collect();
        let mut columns: Vec<Column> = vec![Series::new("model".into(), names).into()];
        for metric in Metric::ALL {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.get(metric)).collect();
            columns.push(Series::new(metric.column_name().into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<22}", "model")?;
        for metric in Metric::ALL {
            write!(f, "{:>10}", metric.column_name())?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write!(f, "{:<22}", row.model.name())?;
            for metric in Metric::ALL {
                match row.get(metric) {
                    Some(v) => write!(f, "{:>10.4}", v)?,
                    None => write!(f, "{:>10}", "n/a")?,
                }
            }
            writeln!(f)?;
        }
        for issue in &self.issues {
            writeln!(f, "! {}: {}", issue.model.name(), issue.error)?;
        }
        Ok(())
    }
}

/// Scores fitted models on the held-out partition
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Metrics for one model.
    ///
    /// The second value is `DegenerateLabels` when ROC-AUC is undefined.
    pub fn evaluate_model(
        &self,
        model: &TrainedModel,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<(MetricRow, Option<ChurnError>)> {
        let y_pred = model.predict(x_test)?;
        let scores = model.predict_proba(x_test)?;
        let counts = ConfusionCounts::from_labels(y_test, &y_pred)?;
        let auc = roc_auc(y_test, &scores)?;

        let kind = model.kind();
        let degenerate = auc.is_none().then(|| ChurnError::DegenerateLabels {
            model: kind.name().to_string(),
        });
        let row = MetricRow {
            model: kind,
            accuracy: counts.accuracy(),
            f1: counts.f1(),
            precision: counts.precision(),
            recall: counts.recall(),
            roc_auc: auc,
        };
        Ok((row, degenerate))
    }

    /// Build the report for every fitted model in the bank.
    ///
    /// Training failures from the bank and per-model scoring failures become
    /// issues; rows are sorted by accuracy descending, ties keeping bank order.
    pub fn evaluate(
        &self,
        bank: &TrainedBank,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<MetricReport> {
        if x_test.nrows() != y_test.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", x_test.nrows()),
                actual: format!("y length = {}", y_test.len()),
            });
        }
        if y_test.is_empty() {
            return Err(ChurnError::InsufficientData("test partition is empty".to_string()));
        }

        let mut report = MetricReport::default();
        for failure in bank.failures() {
            let error = match &failure.error {
                ChurnError::TrainingFailure { model, reason } => {
                    ChurnError::training(model.clone(), reason.clone())
                }
                other => ChurnError::training(failure.kind.name(), other.to_string()),
            };
            report.issues.push(ModelIssue {
                model: failure.kind,
                error,
            });
        }

        for fitted in bank.fitted() {
            match self.evaluate_model(&fitted.model, x_test, y_test) {
                Ok((row, degenerate)) => {
                    info!(
                        model = %row.model,
                        accuracy = row.accuracy,
                        f1 = row.f1,
                        precision = row.precision,
                        recall = row.recall,
                        roc_auc = ?row.roc_auc,
                        "Model evaluated"
                    );
                    if let Some(error) = degenerate {
                        warn!(model = %row.model, "ROC-AUC unavailable: single-class test partition");
                        report.issues.push(ModelIssue {
                            model: row.model,
                            error,
                        });
                    }
                    report.rows.push(row);
                }
                Err(err) => {
                    warn!(model = %fitted.kind, error = %err, "Model could not be scored");
                    report.issues.push(ModelIssue {
                        model: fitted.kind,
                        error: err,
                    });
                }
            }
        }

        report.sort_by(Metric::Accuracy);
        Ok(report)
    }
}
