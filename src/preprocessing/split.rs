//! Seeded train/test partitioning

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Feature matrices and labels of both partitions, column order preserved
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub indices: SplitIndices,
}

impl DataSplit {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }
}

/// Fixed-fraction random partition, reproducible for a given seed and row order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTestSplitter {
    test_fraction: f64,
    seed: u64,
    stratify: bool,
}

impl Default for TrainTestSplitter {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: false,
        }
    }
}

impl TrainTestSplitter {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
            stratify: false,
        }
    }

    /// Keep class proportions in both partitions
    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    /// Number of test rows for `n_rows` rows: `ceil(n * fraction)`, kept
    /// within `[1, n - 1]` so neither partition is empty.
    pub fn test_size(&self, n_rows: usize) -> usize {
        // tolerance keeps 0.2 * 100 at 20 rather than 21
        let raw = (n_rows as f64 * self.test_fraction - 1e-9).ceil() as usize;
        raw.clamp(1, n_rows.saturating_sub(1).max(1))
    }

    /// Partition row indices. `labels` drive stratification only.
    pub fn split_indices(&self, labels: &Array1<f64>) -> Result<SplitIndices> {
        let n_rows = labels.len();
        if n_rows < 2 {
            return Err(ChurnError::InsufficientData(format!(
                "{} row(s), at least 2 are needed to split",
                n_rows
            )));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ChurnError::InvalidParameter {
                name: "test_fraction".to_string(),
                value: self.test_fraction.to_string(),
                reason: "must lie in (0, 1)".to_string(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n_test = self.test_size(n_rows);

        let indices = if self.stratify {
            self.stratified(labels, n_test, &mut rng)
        } else {
            let mut indices: Vec<usize> = (0..n_rows).collect();
            indices.shuffle(&mut rng);
            let train = indices.split_off(n_test);
            SplitIndices {
                train,
                test: indices,
            }
        };

        debug!(
            train = indices.train.len(),
            test = indices.test.len(),
            stratify = self.stratify,
            "Split rows"
        );
        Ok(indices)
    }

    /// Partition a feature matrix and its labels
    pub fn split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<DataSplit> {
        if x.nrows() != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let indices = self.split_indices(y)?;

        Ok(DataSplit {
            x_train: x.select(Axis(0), &indices.train),
            x_test: x.select(Axis(0), &indices.test),
            y_train: y.select(Axis(0), &indices.train),
            y_test: y.select(Axis(0), &indices.test),
            indices,
        })
    }

    fn stratified(&self, labels: &Array1<f64>, n_test: usize, rng: &mut ChaCha8Rng) -> SplitIndices {
        let n_rows = labels.len();
        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &value) in labels.iter().enumerate() {
            by_class.entry(value.round() as i64).or_default().push(idx);
        }

        let mut train = Vec::with_capacity(n_rows - n_test);
        let mut test = Vec::with_capacity(n_test);
        let mut remaining = n_test;
        let n_classes = by_class.len();

        for (i, members) in by_class.values_mut().enumerate() {
            members.shuffle(rng);
            let take = if i + 1 == n_classes {
                remaining.min(members.len())
            } else {
                let share = (members.len() as f64 * n_test as f64 / n_rows as f64).round() as usize;
                share.min(remaining).min(members.len())
            };
            remaining -= take;
            test.extend_from_slice(&members[..take]);
            train.extend_from_slice(&members[take..]);
        }

        // rounding can leave the last class short
        if remaining > 0 {
            let moved = remaining.min(train.len().saturating_sub(1));
            let tail = train.split_off(train.len() - moved);
            test.extend(tail);
        }

        train.shuffle(rng);
        test.shuffle(rng);
        SplitIndices { train, test }
    }
}
