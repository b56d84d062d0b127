//! End-to-end churn pipeline: prepare, split, scale, train, evaluate, explain

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::session::ChurnSession;
use super::stage::{PipelineStage, StageTimings};
use crate::cache::ModelCache;
use crate::config::PipelineConfig;
use crate::data::DataLoader;
use crate::error::{ChurnError, Result};
use crate::evaluation::{Evaluator, MetricReport};
use crate::explainability::{AttributionSet, TreeExplainer};
use crate::preprocessing::{
    CategoryEncoder, DataSplit, FeaturePreparer, SplitIndices, StandardScaler, TrainTestSplitter,
};
use crate::training::{ModelBank, ModelKind, TrainedBank};

/// Encoded features and labels of the full input
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    pub encoder: CategoryEncoder,
    /// Identifier columns that were present and removed
    pub dropped_columns: Vec<String>,
}

/// Both partitions scaled with parameters fitted on the training rows only
#[derive(Debug, Clone)]
pub struct ScaledSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub indices: SplitIndices,
    pub scaler: StandardScaler,
}

/// Result of [`ChurnPipeline::run`]
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: MetricReport,
    /// Attribution failures leave the report intact
    pub attributions: Result<AttributionSet>,
    pub timings: StageTimings,
    pub session: ChurnSession,
    pub split: SplitIndices,
    pub started_at: DateTime<Utc>,
    top_features: usize,
}

impl PipelineOutcome {
    /// Largest signed contributions for one explained row
    pub fn top_features(&self, row: usize) -> Result<Vec<(String, f64)>> {
        match &self.attributions {
            Ok(set) => set.top_features(row, self.top_features),
            Err(err) => Err(ChurnError::InvalidInput(format!(
                "no attributions available: {}",
                err
            ))),
        }
    }
}

/// Orchestrates one dataset through every stage.
///
/// Each call owns its encoded data, split and trained models. Only the
/// model cache is shared, and only between pipelines handed the same
/// [`Arc<ModelCache>`].
pub struct ChurnPipeline {
    config: PipelineConfig,
    cache: Arc<ModelCache>,
}

impl ChurnPipeline {
    /// Validate the configuration and create a private model cache
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(ModelCache::new(config.cache.clone()));
        Ok(Self { config, cache })
    }

    /// Share a model cache with other pipelines
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Read a delimited file typed by the configured schema
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        DataLoader::new(self.config.schema.clone()).load_csv(path)
    }

    /// Drop identifiers, encode categoricals and separate the label.
    ///
    /// A missing label column fails here, before any model is touched.
    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedData> {
        let label = &self.config.schema.label_column;
        if df.column(label).is_err() {
            return Err(ChurnError::MissingColumn(label.clone()));
        }

        let preparer = FeaturePreparer::new(self.config.schema.clone());
        let (dataset, encoder) = preparer.prepare(df)?;
        let (x, y, feature_names) = dataset.features_and_labels()?;

        Ok(PreparedData {
            x,
            y,
            feature_names,
            encoder,
            dropped_columns: dataset.dropped_columns().to_vec(),
        })
    }

    /// Seeded partition of the prepared rows
    pub fn split(&self, prepared: &PreparedData) -> Result<DataSplit> {
        let split = TrainTestSplitter::new(self.config.test_fraction, self.config.random_seed)
            .with_stratify(self.config.stratify)
            .split(&prepared.x, &prepared.y)?;
        info!(
            train = split.n_train(),
            test = split.n_test(),
            stratify = self.config.stratify,
            "Split dataset"
        );
        Ok(split)
    }

    /// Fit the scaler on the training partition and apply it to both
    pub fn scale(&self, split: DataSplit) -> Result<ScaledSplit> {
        let mut scaler = StandardScaler::new();
        scaler.fit(&split.x_train)?;
        let x_train = scaler.transform(&split.x_train)?;
        let x_test = scaler.transform(&split.x_test)?;

        Ok(ScaledSplit {
            x_train,
            x_test,
            y_train: split.y_train,
            y_test: split.y_test,
            indices: split.indices,
            scaler,
        })
    }

    pub fn split_and_scale(&self, prepared: &PreparedData) -> Result<ScaledSplit> {
        let split = self.split(prepared)?;
        self.scale(split)
    }

    /// Fit every enabled variant through the shared cache
    pub fn train(&self, scaled: &ScaledSplit) -> Result<TrainedBank> {
        ModelBank::new(self.config.models.clone())
            .with_cache(Arc::clone(&self.cache))
            .train(&scaled.x_train, &scaled.y_train)
    }

    pub fn evaluate(&self, bank: &TrainedBank, scaled: &ScaledSplit) -> Result<MetricReport> {
        Evaluator::new().evaluate(bank, &scaled.x_test, &scaled.y_test)
    }

    /// Attributions for the first `attribution_sample_size` test rows
    pub fn explain(
        &self,
        bank: &TrainedBank,
        kind: ModelKind,
        scaled: &ScaledSplit,
        feature_names: &[String],
    ) -> Result<AttributionSet> {
        if !kind.is_tree_ensemble() {
            return Err(ChurnError::UnsupportedModel(kind.name().to_string()));
        }
        let model = bank.require(kind)?;
        TreeExplainer::new(model)?.explain(
            &scaled.x_test,
            feature_names,
            self.config.attribution_sample_size,
        )
    }

    /// Run every stage on an in-memory table.
    ///
    /// Parse, column and split errors abort the run. Per-model failures end
    /// up in the report and a failed attribution is returned next to it.
    pub fn run(&self, df: &DataFrame) -> Result<PipelineOutcome> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut timings = StageTimings::new();

        let prepared = timings.time(PipelineStage::Prepare, || self.prepare(df))?;
        let split = timings.time(PipelineStage::Split, || self.split(&prepared))?;
        let scaled = timings.time(PipelineStage::Scale, || self.scale(split))?;
        let bank = timings.time(PipelineStage::Train, || self.train(&scaled))?;
        let report = timings.time(PipelineStage::Evaluate, || self.evaluate(&bank, &scaled))?;

        let explain_start = Instant::now();
        let attributions = self.explain(
            &bank,
            self.config.explained_model,
            &scaled,
            &prepared.feature_names,
        );
        match &attributions {
            Ok(set) => {
                timings.record(PipelineStage::Explain, explain_start.elapsed());
                info!(model = %set.model(), rows = set.n_rows(), "Explained test rows");
            }
            Err(err) => {
                warn!(model = %self.config.explained_model, error = %err, "Attribution failed");
            }
        }

        let session = ChurnSession::new(
            FeaturePreparer::new(self.config.schema.clone()),
            prepared.encoder,
            scaled.scaler,
            prepared.feature_names,
            bank,
        );

        info!(
            models = report.len(),
            issues = report.issues().len(),
            elapsed_seconds = start.elapsed().as_secs_f64(),
            "Pipeline finished"
        );

        Ok(PipelineOutcome {
            report,
            attributions,
            timings,
            session,
            split: scaled.indices,
            started_at,
            top_features: self.config.top_features,
        })
    }

    /// Load a delimited file and run every stage on it
    pub fn run_csv(&self, path: impl AsRef<Path>) -> Result<PipelineOutcome> {
        let df = self.load_csv(path)?;
        self.run(&df)
    }
}
