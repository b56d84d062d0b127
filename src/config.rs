//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CacheConfig;
use crate::data::ChurnSchema;
use crate::error::{ChurnError, Result};
use crate::explainability::MAX_ATTRIBUTION_ROWS;
use crate::training::{ModelBankConfig, ModelKind};

/// Recognised options of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Share of rows held out for testing, in (0, 1)
    pub test_fraction: f64,
    /// Seed for the split and every seeded model
    pub random_seed: u64,
    /// Keep class proportions in both partitions
    pub stratify: bool,
    /// Rows explained per attribution call, capped to the test partition
    pub attribution_sample_size: usize,
    /// Features listed per explained row
    pub top_features: usize,
    /// Variant handed to the explainer by [`crate::pipeline::ChurnPipeline::run`]
    pub explained_model: ModelKind,
    pub schema: ChurnSchema,
    pub models: ModelBankConfig,
    pub cache: CacheConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            random_seed: 42,
            stratify: false,
            attribution_sample_size: MAX_ATTRIBUTION_ROWS,
            top_features: 5,
            explained_model: ModelKind::GradientBoosting,
            schema: ChurnSchema::default(),
            models: ModelBankConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Set the split seed and reseed every seeded model
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self.models = self.models.with_random_seed(seed);
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn with_attribution_sample_size(mut self, rows: usize) -> Self {
        self.attribution_sample_size = rows;
        self
    }

    pub fn with_top_features(mut self, k: usize) -> Self {
        self.top_features = k;
        self
    }

    pub fn with_explained_model(mut self, kind: ModelKind) -> Self {
        self.explained_model = kind;
        self
    }

    pub fn with_schema(mut self, schema: ChurnSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_models(mut self, models: ModelBankConfig) -> Self {
        self.models = models;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Parse a (possibly partial) JSON document and validate it.
    ///
    /// Seeded models without their own `random_state` follow `random_seed`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        let mut config: Self = serde_json::from_value(document.clone())?;

        let seed = Some(config.random_seed);
        let unset = |model: &str| {
            document
                .pointer(&format!("/models/{model}/random_state"))
                .map_or(true, serde_json::Value::is_null)
        };
        if unset("random_forest") {
            config.models.random_forest.random_state = seed;
        }
        if unset("gradient_boosting") {
            config.models.gradient_boosting.random_state = seed;
        }
        if unset("svm") {
            config.models.svm.random_state = seed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no run can use
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid("test_fraction", self.test_fraction, "must lie in (0, 1)"));
        }
        if self.attribution_sample_size == 0 || self.attribution_sample_size > MAX_ATTRIBUTION_ROWS {
            return Err(invalid(
                "attribution_sample_size",
                self.attribution_sample_size,
                &format!("must lie in 1..={}", MAX_ATTRIBUTION_ROWS),
            ));
        }
        if self.top_features == 0 {
            return Err(invalid("top_features", 0, "must be at least 1"));
        }
        if self.schema.label_column.trim().is_empty() {
            return Err(invalid("schema.label_column", "\"\"", "must name a column"));
        }
        let label = &self.schema.label_column;
        if self.schema.identifier_columns.contains(label)
            || self.schema.categorical_columns.contains(label)
        {
            return Err(invalid(
                "schema.label_column",
                label,
                "is also listed as an identifier or categorical column",
            ));
        }
        if self.models.enabled_kinds().is_empty() {
            return Err(invalid("models.enabled", "[]", "at least one model must be enabled"));
        }
        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", 0, "must be at least 1"));
        }
        self.validate_models()
    }

    fn validate_models(&self) -> Result<()> {
        let m = &self.models;
        if m.random_forest.n_estimators == 0 {
            return Err(invalid("models.random_forest.n_estimators", 0, "must be at least 1"));
        }
        if m.gradient_boosting.n_estimators == 0 {
            return Err(invalid("models.gradient_boosting.n_estimators", 0, "must be at least 1"));
        }
        if !(m.gradient_boosting.learning_rate > 0.0) {
            return Err(invalid(
                "models.gradient_boosting.learning_rate",
                m.gradient_boosting.learning_rate,
                "must be positive",
            ));
        }
        if !(m.svm.c > 0.0) {
            return Err(invalid("models.svm.c", m.svm.c, "must be positive"));
        }
        if m.knn.n_neighbors == 0 {
            return Err(invalid("models.knn.n_neighbors", 0, "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> ChurnError {
    ChurnError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
