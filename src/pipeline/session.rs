//! Fitted preprocessing plus trained models, reused for later input

use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ChurnError, Result};
use crate::explainability::{AttributionSet, TreeExplainer};
use crate::preprocessing::{CategoryEncoder, FeaturePreparer, StandardScaler};
use crate::training::{ModelKind, TrainedBank, TrainedModel};

/// Everything fitted during one run.
///
/// New rows go through the same identifier removal, the same category codes,
/// the same feature order and the same train-partition scaling as the rows
/// the models were trained on. Nothing is refitted.
#[derive(Debug)]
pub struct ChurnSession {
    preparer: FeaturePreparer,
    encoder: CategoryEncoder,
    scaler: StandardScaler,
    feature_names: Vec<String>,
    bank: TrainedBank,
}

impl ChurnSession {
    pub(crate) fn new(
        preparer: FeaturePreparer,
        encoder: CategoryEncoder,
        scaler: StandardScaler,
        feature_names: Vec<String>,
        bank: TrainedBank,
    ) -> Self {
        Self {
            preparer,
            encoder,
            scaler,
            feature_names,
            bank,
        }
    }

    /// Feature order shared by training, scoring and explanation
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn encoder(&self) -> &CategoryEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn bank(&self) -> &TrainedBank {
        &self.bank
    }

    /// Variants available for scoring, in training order
    pub fn models(&self) -> Vec<ModelKind> {
        self.bank.kinds()
    }

    pub fn model(&self, kind: ModelKind) -> Result<&Arc<TrainedModel>> {
        self.bank.require(kind)
    }

    /// Encode and scale raw rows into the training feature space.
    ///
    /// A label column, if present, is ignored. Fails with `MissingColumn`
    /// for an absent feature and `UnknownCategory` for a category the
    /// encoder never saw.
    pub fn transform(&self, raw: &DataFrame) -> Result<Array2<f64>> {
        if raw.height() == 0 {
            return Err(ChurnError::InsufficientData("no rows to score".to_string()));
        }
        let x = self
            .preparer
            .transform_features(raw, &self.encoder, &self.feature_names)?;
        let scaled = self.scaler.transform(&x)?;
        debug!(rows = scaled.nrows(), "Transformed rows for scoring");
        Ok(scaled)
    }

    /// Positive-class score per raw row
    pub fn predict_proba(&self, kind: ModelKind, raw: &DataFrame) -> Result<Array1<f64>> {
        let model = self.model(kind)?;
        let x = self.transform(raw)?;
        model.predict_proba(&x)
    }

    /// Hard 0/1 prediction per raw row
    pub fn predict(&self, kind: ModelKind, raw: &DataFrame) -> Result<Array1<f64>> {
        let model = self.model(kind)?;
        let x = self.transform(raw)?;
        model.predict(&x)
    }

    /// Impurity-decrease importances of a tree ensemble, largest first
    pub fn native_importances(&self, kind: ModelKind) -> Result<Vec<(String, f64)>> {
        let model = self.model(kind)?;
        let importances = model
            .feature_importances()
            .ok_or_else(|| ChurnError::UnsupportedModel(kind.name().to_string()))?;
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    /// TreeSHAP attributions for the first `max_rows` raw rows
    pub fn explain(&self, kind: ModelKind, raw: &DataFrame, max_rows: usize) -> Result<AttributionSet> {
        let model = self.model(kind)?;
        let explainer = TreeExplainer::new(model)?;
        let x = self.transform(raw)?;
        explainer.explain(&x, &self.feature_names, max_rows)
    }
}
