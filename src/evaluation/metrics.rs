//! Binary classification metrics
//!
//! The positive class is 1 throughout. Labels and predictions are read as
//! positive when `>= 0.5`.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// Confusion matrix counts for the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;

        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t >= 0.5, p >= 0.5) {
                (true, true) => counts.tp += 1,
                (false, true) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (true, false) => counts.fn_ += 1,
            }
        }
        Ok(counts)
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// `tp / (tp + fp)`, 0 when nothing was predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// `tp / (tp + fn)`, 0 when there are no positives
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

fn check_lengths(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ChurnError::ShapeError {
            expected: format!("{} predictions", expected),
            actual: format!("{} predictions", actual),
        });
    }
    Ok(())
}

/// Area under the ROC curve from positive-class scores.
///
/// Computed as the Mann-Whitney statistic with average ranks for tied
/// scores. `None` when `y_true` holds a single class.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<Option<f64>> {
    check_lengths(y_true.len(), scores.len())?;
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ChurnError::InvalidInput("non-finite score passed to ROC-AUC".to_string()));
    }

    let n_pos = y_true.iter().filter(|&&t| t >= 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(None);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based average rank for each run of tied scores
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            if y_true[idx] >= 0.5 {
                positive_rank_sum += avg_rank;
            }
        }
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(Some(u / (n_pos * n_neg as f64)))
}
