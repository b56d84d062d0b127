//! Error types for the churn pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Main error type for the churn pipeline
#[derive(Error, Debug)]
pub enum ChurnError {
    /// Malformed input record. `row` is the zero-based data row (header excluded).
    #[error("Parse error at row {row}{}: {message}", .column.as_ref().map(|c| format!(", column '{}'", c)).unwrap_or_default())]
    Parse {
        row: usize,
        column: Option<String>,
        message: String,
    },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Training failed for {model}: {reason}")]
    TrainingFailure { model: String, reason: String },

    #[error("Degenerate labels for {model}: test partition contains a single class, ROC-AUC is undefined")]
    DegenerateLabels { model: String },

    #[error("Attribution is not supported for model {0}: only tree ensembles expose a TreeSHAP path")]
    UnsupportedModel(String),

    #[error("Unknown category '{value}' in column '{column}' at row {row}")]
    UnknownCategory {
        column: String,
        value: String,
        row: usize,
    },

    #[error("Label at row {row} is {value}, expected 0 or 1")]
    NonBinaryLabel { row: usize, value: f64 },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChurnError {
    /// Whether the error aborts the whole pipeline.
    ///
    /// Input and schema problems leave no usable dataset. Per-model failures
    /// (training, metrics, attribution) are isolated and reported next to the
    /// results of the other models.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ChurnError::TrainingFailure { .. }
                | ChurnError::DegenerateLabels { .. }
                | ChurnError::UnsupportedModel(_)
        )
    }

    pub(crate) fn training(model: impl Into<String>, reason: impl Into<String>) -> Self {
        ChurnError::TrainingFailure {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for ChurnError {
    fn from(err: polars::error::PolarsError) -> Self {
        ChurnError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        ChurnError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for ChurnError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => ChurnError::DataError(err.to_string()),
            _ => ChurnError::Parse {
                row: err
                    .position()
                    .map(|p| (p.record() as usize).saturating_sub(1))
                    .unwrap_or(0),
                column: None,
                message: err.to_string(),
            },
        }
    }
}

impl From<ndarray::ShapeError> for ChurnError {
    fn from(err: ndarray::ShapeError) -> Self {
        ChurnError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
