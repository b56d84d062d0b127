//! Model bank: fits every enabled classifier variant on the same training
//! partition, isolating failures per model.

use ndarray::{Array1, Array2};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::config::{ModelBankConfig, ModelKind};
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::LogisticRegression;
use super::models::{BinaryClassifier, TrainedModel};
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::cache::{CacheKey, DatasetFingerprint, ModelCache};
use crate::error::{ChurnError, Result};

/// One successfully fitted variant
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub model: Arc<TrainedModel>,
    /// Wall-clock fit time; zero for cache hits
    pub train_seconds: f64,
    pub from_cache: bool,
}

/// One variant that could not be fitted
#[derive(Debug)]
pub struct ModelFailure {
    pub kind: ModelKind,
    pub error: ChurnError,
}

/// Outcome of a bank run: fitted models in insertion order plus failures
#[derive(Debug, Default)]
pub struct TrainedBank {
    fitted: Vec<FittedModel>,
    failures: Vec<ModelFailure>,
}

impl TrainedBank {
    pub fn fitted(&self) -> &[FittedModel] {
        &self.fitted
    }

    pub fn failures(&self) -> &[ModelFailure] {
        &self.failures
    }

    pub fn get(&self, kind: ModelKind) -> Option<&Arc<TrainedModel>> {
        self.fitted.iter().find(|f| f.kind == kind).map(|f| &f.model)
    }

    pub fn failure(&self, kind: ModelKind) -> Option<&ChurnError> {
        self.failures.iter().find(|f| f.kind == kind).map(|f| &f.error)
    }

    /// Fitted model of a variant, or the reason it is unavailable
    pub fn require(&self, kind: ModelKind) -> Result<&Arc<TrainedModel>> {
        if let Some(model) = self.get(kind) {
            return Ok(model);
        }
        match self.failure(kind) {
            Some(ChurnError::TrainingFailure { model, reason }) => {
                Err(ChurnError::training(model.clone(), reason.clone()))
            }
            Some(other) => Err(ChurnError::training(kind.name(), other.to_string())),
            None => Err(ChurnError::InvalidInput(format!(
                "{} is not enabled in the model bank",
                kind.name()
            ))),
        }
    }

    pub fn kinds(&self) -> Vec<ModelKind> {
        self.fitted.iter().map(|f| f.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.fitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fitted.is_empty()
    }
}

/// Trains the configured classifier variants
pub struct ModelBank {
    config: ModelBankConfig,
    cache: Option<Arc<ModelCache>>,
}

impl ModelBank {
    pub fn new(config: ModelBankConfig) -> Self {
        Self { config, cache: None }
    }

    /// Reuse fitted models from a shared cache
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ModelBankConfig {
        &self.config
    }

    /// Fit every enabled variant on the scaled training partition.
    ///
    /// Shape problems fail the call. A variant that fails to fit is recorded
    /// as a [`ModelFailure`] and the remaining variants still train.
    pub fn train(&self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> Result<TrainedBank> {
        if x_train.nrows() != y_train.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", x_train.nrows()),
                actual: format!("y length = {}", y_train.len()),
            });
        }
        if x_train.nrows() == 0 || x_train.ncols() == 0 {
            return Err(ChurnError::InsufficientData(
                "training partition has no rows or no features".to_string(),
            ));
        }

        let single_class = {
            let positives = y_train.iter().filter(|&&v| v >= 0.5).count();
            positives == 0 || positives == y_train.len()
        };
        let fingerprint = self
            .cache
            .as_ref()
            .map(|_| DatasetFingerprint::of(x_train, y_train));

        let mut bank = TrainedBank::default();
        for kind in self.config.enabled_kinds() {
            if single_class {
                warn!(model = %kind, "Skipping fit: training labels contain a single class");
                bank.failures.push(ModelFailure {
                    kind,
                    error: ChurnError::training(kind.name(), "training labels contain a single class"),
                });
                continue;
            }

            let start = Instant::now();
            let outcome = match (&self.cache, fingerprint) {
                (Some(cache), Some(dataset)) => self.config.params_digest(kind).and_then(|digest| {
                    let key = CacheKey {
                        dataset,
                        kind,
                        params_digest: digest,
                    };
                    cache.get_or_train(key, || self.fit_one(kind, x_train, y_train))
                }),
                _ => self
                    .fit_one(kind, x_train, y_train)
                    .map(|model| (Arc::new(model), false)),
            };

            match outcome {
                Ok((model, from_cache)) => {
                    let train_seconds = if from_cache { 0.0 } else { start.elapsed().as_secs_f64() };
                    info!(model = %kind, train_seconds, from_cache, "Model trained");
                    bank.fitted.push(FittedModel {
                        kind,
                        model,
                        train_seconds,
                        from_cache,
                    });
                }
                Err(err) => {
                    let reason = match err {
                        ChurnError::TrainingFailure { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    let error = ChurnError::training(kind.name(), reason);
                    warn!(model = %kind, error = %error, "Model failed to train");
                    bank.failures.push(ModelFailure { kind, error });
                }
            }
        }

        info!(
            fitted = bank.fitted.len(),
            failed = bank.failures.len(),
            "Model bank finished"
        );
        Ok(bank)
    }

    /// Fit a single variant without consulting the cache
    pub fn fit_one(&self, kind: ModelKind, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainedModel> {
        let model = match kind {
            ModelKind::RandomForest => {
                TrainedModel::RandomForest(fit(RandomForest::new(self.config.random_forest.clone()), x, y)?)
            }
            ModelKind::LogisticRegression => TrainedModel::LogisticRegression(fit(
                LogisticRegression::new(self.config.logistic_regression.clone()),
                x,
                y,
            )?),
            ModelKind::GradientBoosting => TrainedModel::GradientBoosting(fit(
                GradientBoostingClassifier::new(self.config.gradient_boosting.clone()),
                x,
                y,
            )?),
            ModelKind::SVM => TrainedModel::SVM(fit(SVMClassifier::new(self.config.svm.clone()), x, y)?),
            ModelKind::KNN => TrainedModel::KNN(fit(KNNClassifier::new(self.config.knn.clone()), x, y)?),
        };
        Ok(model)
    }
}

fn fit<M: BinaryClassifier>(mut model: M, x: &Array2<f64>, y: &Array1<f64>) -> Result<M> {
    model.fit(x, y)?;
    Ok(model)
}
