//! Fitted model variants and the classifier trait they share

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::config::ModelKind;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::error::Result;

/// Trait for binary classifiers over 0/1 labels
pub trait BinaryClassifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Positive-class score per row, in [0, 1]
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard 0/1 labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Model-native feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

impl BinaryClassifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict_proba(self, x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        RandomForest::feature_importances(self).cloned()
    }
}

impl BinaryClassifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict_proba(self, x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }
}

impl BinaryClassifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict_proba(self, x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let importances = GradientBoostingClassifier::feature_importances(self);
        (!importances.is_empty()).then(|| Array1::from_vec(importances.to_vec()))
    }
}

impl BinaryClassifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMClassifier::predict_proba(self, x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMClassifier::predict(self, x)
    }
}

impl BinaryClassifier for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KNNClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNClassifier::predict_proba(self, x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNNClassifier::predict(self, x)
    }
}

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
    GradientBoosting(GradientBoostingClassifier),
    SVM(SVMClassifier),
    KNN(KNNClassifier),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            TrainedModel::SVM(_) => ModelKind::SVM,
            TrainedModel::KNN(_) => ModelKind::KNN,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn classifier(&self) -> &dyn BinaryClassifier {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::SVM(m) => m,
            TrainedModel::KNN(m) => m,
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.classifier().predict_proba(x)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.classifier().predict(x)
    }

    /// Impurity-decrease importances for the tree ensembles
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.classifier().feature_importances()
    }
}
