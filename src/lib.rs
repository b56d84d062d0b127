//! Churn Insight - bank customer churn modelling and explanation
//!
//! This crate takes a tabular churn dataset through a fixed sequence of
//! stages and reports on the result:
//! - Feature preparation: identifier removal and categorical encoding
//! - Seeded train/test split and train-only z-score scaling
//! - A bank of five classifiers trained with per-model failure isolation
//! - Held-out evaluation (accuracy, F1, precision, recall, ROC-AUC)
//! - Exact TreeSHAP attributions for the tree ensembles
//!
//! # Modules
//!
//! ## Pipeline
//! - [`pipeline`] - Stage orchestration, timings, reusable fitted session
//! - [`config`] - Serde-backed run configuration with validation
//!
//! ## Data
//! - [`data`] - Column roles and delimited-text loading
//! - [`preprocessing`] - Encoding, splitting, scaling
//!
//! ## Models
//! - [`training`] - Classifiers and the model bank
//! - [`cache`] - Fitted-model cache with LRU eviction and TTL
//!
//! ## Reporting
//! - [`evaluation`] - Binary metrics and the sortable report
//! - [`explainability`] - TreeSHAP attributions and feature rankings
//!
//! # Example
//!
//! ```no_run
//! use churn_insight::prelude::*;
//!
//! let pipeline = ChurnPipeline::new(PipelineConfig::default())?;
//! let outcome = pipeline.run_csv("Churn_Modelling.csv")?;
//! println!("{}", outcome.report);
//! for (feature, contribution) in outcome.top_features(0)? {
//!     println!("{feature}: {contribution:+.4}");
//! }
//! # Ok::<(), churn_insight::ChurnError>(())
//! ```

// Core error handling
pub mod error;
pub mod config;

// Data
pub mod data;
pub mod preprocessing;

// Models
pub mod training;
pub mod cache;

// Reporting
pub mod evaluation;
pub mod explainability;

// Orchestration
pub mod pipeline;

pub use error::{ChurnError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ChurnError, Result};

    // Configuration
    pub use crate::config::PipelineConfig;

    // Data
    pub use crate::data::{ChurnSchema, DataLoader};

    // Preprocessing
    pub use crate::preprocessing::{CategoryEncoder, FeaturePreparer, StandardScaler, TrainTestSplitter};

    // Training
    pub use crate::training::{ModelBank, ModelBankConfig, ModelKind, TrainedBank, TrainedModel};

    // Caching
    pub use crate::cache::{CacheConfig, CacheStats, ModelCache};

    // Evaluation
    pub use crate::evaluation::{Evaluator, Metric, MetricReport, MetricRow};

    // Explainability
    pub use crate::explainability::{AttributionSet, OutputSpace, TreeExplainer};

    // Pipeline
    pub use crate::pipeline::{ChurnPipeline, ChurnSession, PipelineOutcome, PipelineStage};
}
