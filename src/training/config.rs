//! Model bank configuration

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::gradient_boosting::GradientBoostingConfig;
use super::knn::KNNConfig;
use super::linear_models::LogisticParams;
use super::random_forest::RandomForestParams;
use super::svm::SVMConfig;
use crate::error::Result;

/// The classifier variants held by the model bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    LogisticRegression,
    GradientBoosting,
    SVM,
    KNN,
}

impl ModelKind {
    /// Canonical training and reporting order
    pub const ALL: [ModelKind; 5] = [
        ModelKind::RandomForest,
        ModelKind::LogisticRegression,
        ModelKind::GradientBoosting,
        ModelKind::SVM,
        ModelKind::KNN,
    ];

    /// Display name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::SVM => "SVM",
            ModelKind::KNN => "KNN",
        }
    }

    /// Whether the fitted model is a tree ensemble
    pub fn is_tree_ensemble(&self) -> bool {
        matches!(self, ModelKind::RandomForest | ModelKind::GradientBoosting)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hyperparameters for every variant plus the list of variants to train
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBankConfig {
    pub random_forest: RandomForestParams,
    pub logistic_regression: LogisticParams,
    pub gradient_boosting: GradientBoostingConfig,
    pub svm: SVMConfig,
    pub knn: KNNConfig,
    /// Variants to train, in report insertion order
    pub enabled: Vec<ModelKind>,
}

impl Default for ModelBankConfig {
    fn default() -> Self {
        Self {
            random_forest: RandomForestParams::default(),
            logistic_regression: LogisticParams::default(),
            gradient_boosting: GradientBoostingConfig::default(),
            svm: SVMConfig::default(),
            knn: KNNConfig::default(),
            enabled: ModelKind::ALL.to_vec(),
        }
    }
}

impl ModelBankConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, kinds: impl IntoIterator<Item = ModelKind>) -> Self {
        self.enabled = kinds.into_iter().collect();
        self
    }

    pub fn with_random_forest(mut self, params: RandomForestParams) -> Self {
        self.random_forest = params;
        self
    }

    pub fn with_logistic_regression(mut self, params: LogisticParams) -> Self {
        self.logistic_regression = params;
        self
    }

    pub fn with_gradient_boosting(mut self, config: GradientBoostingConfig) -> Self {
        self.gradient_boosting = config;
        self
    }

    pub fn with_svm(mut self, config: SVMConfig) -> Self {
        self.svm = config;
        self
    }

    pub fn with_knn(mut self, config: KNNConfig) -> Self {
        self.knn = config;
        self
    }

    /// Propagate one seed to every seeded variant
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_forest.random_state = Some(seed);
        self.gradient_boosting.random_state = Some(seed);
        self.svm.random_state = Some(seed);
        self
    }

    /// Enabled variants with duplicates removed, first occurrence wins
    pub fn enabled_kinds(&self) -> Vec<ModelKind> {
        let mut kinds = Vec::with_capacity(self.enabled.len());
        for &kind in &self.enabled {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// SHA-256 hex digest of one variant's hyperparameters
    pub fn params_digest(&self, kind: ModelKind) -> Result<String> {
        let bytes = match kind {
            ModelKind::RandomForest => serde_json::to_vec(&self.random_forest)?,
            ModelKind::LogisticRegression => serde_json::to_vec(&self.logistic_regression)?,
            ModelKind::GradientBoosting => serde_json::to_vec(&self.gradient_boosting)?,
            ModelKind::SVM => serde_json::to_vec(&self.svm)?,
            ModelKind::KNN => serde_json::to_vec(&self.knn)?,
        };
        let mut hasher = Sha256::new();
        hasher.update(kind.name().as_bytes());
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
