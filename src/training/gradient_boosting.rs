//! Gradient Boosting implementation
//!
//! Binary log-loss boosting: each round fits a regression tree to the
//! residuals `y - p` on a row/column subsample and adds it to the log-odds
//! with shrinkage.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::ModelKind;
use super::decision_tree::DecisionTree;
use crate::error::{ChurnError, Result};

const PROBA_CLAMP: f64 = 1e-6;

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample_bytree: 0.8,
            random_state: Some(42),
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
    n_features: usize,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit binary classification
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(ChurnError::InsufficientData("empty training set".to_string()));
        }
        self.validate_config()?;

        let p = y.mean().unwrap_or(0.5).clamp(PROBA_CLAMP, 1.0 - PROBA_CLAMP);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        self.n_features = n_features;
        self.trees.clear();
        self.col_indices_per_tree.clear();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let mut importances = vec![0.0; n_features];

        for round in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, &lo)| yi - sigmoid(lo))
                .collect();

            let sample_indices = draw_indices(n_samples, self.config.subsample, &mut rng);
            let col_indices = draw_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_sub = x.select(Axis(0), &sample_indices).select(Axis(1), &col_indices);
            let y_sub = residuals.select(Axis(0), &sample_indices);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            // every row moves, sampled or not
            let update = tree.predict_raw(&x.select(Axis(1), &col_indices))?;
            log_odds.scaled_add(self.config.learning_rate, &update);

            if let Some(tree_importance) = tree.feature_importances() {
                for (&col_idx, &imp) in col_indices.iter().zip(tree_importance.iter()) {
                    importances[col_idx] += imp;
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);

            if log_odds.iter().any(|v| !v.is_finite()) {
                return Err(ChurnError::training(
                    ModelKind::GradientBoosting.name(),
                    format!("log-odds diverged at round {}", round),
                ));
            }
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = importances;

        debug!(
            trees = self.trees.len(),
            initial_log_odds = self.initial_log_odds,
            "Fitted gradient boosting"
        );
        Ok(())
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        let invalid = |name: &str, value: f64, reason: &str| ChurnError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if c.n_estimators == 0 {
            return Err(invalid("n_estimators", 0.0, "must be at least 1"));
        }
        if !(c.learning_rate > 0.0) {
            return Err(invalid("learning_rate", c.learning_rate, "must be positive"));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(invalid("subsample", c.subsample, "must lie in (0, 1]"));
        }
        if !(c.colsample_bytree > 0.0 && c.colsample_bytree <= 1.0) {
            return Err(invalid("colsample_bytree", c.colsample_bytree, "must lie in (0, 1]"));
        }
        Ok(())
    }

    /// Raw margin (log-odds) per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ChurnError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let tree_pred = tree.predict_raw(&x.select(Axis(1), col_indices))?;
            log_odds.scaled_add(self.config.learning_rate, &tree_pred);
        }
        Ok(log_odds)
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Class labels at the 0.5 threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Global feature index of each tree-local column, per tree
    pub fn col_indices(&self) -> &[Vec<usize>] {
        &self.col_indices_per_tree
    }

    pub fn initial_log_odds(&self) -> f64 {
        self.initial_log_odds
    }

    pub fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn draw_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let sample_size = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(sample_size);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect())
            .unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 10.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            max_depth: 3,
            learning_rate: 0.3,
            ..Default::default()
        };

        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy > 0.9, "Accuracy too low: {}", accuracy);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_decision_function_matches_proba() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let margin = model.decision_function(&x).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        for (m, p) in margin.iter().zip(proba.iter()) {
            assert!((sigmoid(*m) - p).abs() < 1e-12);
        }
        assert_eq!(model.trees().len(), 5);
        assert_eq!(model.col_indices().len(), 5);
    }

    #[test]
    fn test_single_class_is_finite() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i + j) as f64);
        let y = Array1::zeros(10);
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.initial_log_odds().is_finite());
        assert!(model.predict_proba(&x).unwrap().iter().all(|&p| p < 0.01));
    }

    #[test]
    fn test_invalid_config() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            model.fit(&x, &y),
            Err(ChurnError::InvalidParameter { .. })
        ));
    }
}
