//! Model evaluation on the held-out partition
//!
//! Accuracy, F1, precision and recall use the hard labels; ROC-AUC uses the
//! positive-class scores and is unavailable for single-class test labels.

mod metrics;
mod report;

pub use metrics::{roc_auc, ConfusionCounts};
pub use report::{Evaluator, Metric, MetricReport, MetricRow, ModelIssue};
