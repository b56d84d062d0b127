//! K-Nearest Neighbors classifier
//!
//! The positive-class score is the (optionally distance-weighted) share of
//! positive labels among the k nearest training rows.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{ChurnError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(ChurnError::InsufficientData("empty training set".to_string()));
        }
        if self.config.n_neighbors == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let DistanceMetric::Minkowski(p) = self.config.metric {
            if !(p >= 1.0) {
                return Err(ChurnError::InvalidParameter {
                    name: "metric".to_string(),
                    value: format!("Minkowski({})", p),
                    reason: "p must be at least 1".to_string(),
                });
            }
        }

        self.x_train = Some(x.as_standard_layout().to_owned());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Positive-class vote share per row (parallelized over rows)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(ChurnError::ModelNotFitted),
        };
        if x.ncols() != x_train.ncols() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let k = self.config.n_neighbors.min(x_train.nrows());
        let metric = self.config.metric;
        let weights = self.config.weights;

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                positive_share(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }

    /// Predict class labels by (weighted) majority vote
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.1)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let diffs = a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs());
    match metric {
        DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => diffs.sum(),
        DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
    }
}

fn positive_share(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let mut positive = 0.0;
    let mut total = 0.0;
    for &(dist, label) in neighbors {
        let weight = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / (dist + 1e-10),
        };
        positive += weight * label;
        total += weight;
    }
    if total > 0.0 {
        positive / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [3.0, 3.0],
            [3.2, 3.1],
            [3.1, 2.9],
            [2.8, 3.2],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();

        assert_eq!(knn.predict(&x).unwrap(), y);
        let proba = knn.predict_proba(&array![[0.1, 0.1], [3.0, 3.1]]).unwrap();
        assert_eq!(proba[0], 0.0);
        assert_eq!(proba[1], 1.0);
    }

    #[test]
    fn test_distance_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Euclidean) - 5.0).abs() < 1e-12);
        assert!((compute_distance(a.view(), b.view(), DistanceMetric::Manhattan) - 7.0).abs() < 1e-12);
        assert!(
            (compute_distance(a.view(), b.view(), DistanceMetric::Minkowski(2.0)) - 5.0).abs() < 1e-9
        );
    }

    #[test]
    fn test_weighted_knn() {
        let x = array![[0.0], [1.0], [1.1]];
        let y = array![1.0, 0.0, 0.0];
        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 3,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();

        // the single close positive outweighs two distant negatives
        let proba = knn.predict_proba(&array![[0.01]]).unwrap();
        assert!(proba[0] > 0.5);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = create_classification_data();
        let mut knn = KNNClassifier::with_k(50);
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (p - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_unfitted() {
        let knn = KNNClassifier::with_k(3);
        assert!(matches!(
            knn.predict(&array![[1.0, 2.0]]),
            Err(ChurnError::ModelNotFitted)
        ));
    }
}
