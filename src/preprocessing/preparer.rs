//! Feature preparation: identifier removal, categorical encoding and
//! separation of the label from the feature matrix

use super::CategoryEncoder;
use crate::data::{ChurnSchema, ColumnRole};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Table with identifiers dropped and categoricals replaced by integer codes
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    frame: DataFrame,
    label_column: String,
    dropped_columns: Vec<String>,
    encoded_columns: Vec<String>,
}

impl EncodedDataset {
    /// Encoded table, label column included
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Identifier columns that were present and removed
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    /// Categorical columns that were present and encoded
    pub fn encoded_columns(&self) -> &[String] {
        &self.encoded_columns
    }

    /// Feature column names in frame order, label excluded
    pub fn feature_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != self.label_column)
            .map(|name| name.to_string())
            .collect()
    }

    /// Split into a feature matrix, a 0/1 label vector and the feature order.
    ///
    /// Fails with `MissingColumn` when the label is absent and with
    /// `NonBinaryLabel` when any label is not exactly 0 or 1.
    pub fn features_and_labels(&self) -> Result<(Array2<f64>, Array1<f64>, Vec<String>)> {
        let label = self
            .frame
            .column(&self.label_column)
            .map_err(|_| ChurnError::MissingColumn(self.label_column.clone()))?;
        let labels = label_vector(label.as_materialized_series())?;

        let feature_names = self.feature_names();
        if feature_names.is_empty() {
            return Err(ChurnError::InsufficientData(
                "no feature columns remain after preparation".to_string(),
            ));
        }
        let x = feature_matrix(&self.frame, &feature_names)?;

        Ok((x, labels, feature_names))
    }
}

/// Turns a raw table into an [`EncodedDataset`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturePreparer {
    schema: ChurnSchema,
}

impl FeaturePreparer {
    pub fn new(schema: ChurnSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ChurnSchema {
        &self.schema
    }

    /// Drop identifiers, then fit a fresh encoder on the full input and
    /// encode every categorical column present. Row count is preserved.
    pub fn prepare(&self, df: &DataFrame) -> Result<(EncodedDataset, CategoryEncoder)> {
        let (frame, dropped_columns) = self.drop_identifiers(df)?;

        let encoded_columns: Vec<String> = self
            .schema
            .categorical_columns
            .iter()
            .filter(|c| frame.column(c).is_ok())
            .cloned()
            .collect();
        let columns: Vec<&str> = encoded_columns.iter().map(|s| s.as_str()).collect();

        let mut encoder = CategoryEncoder::new();
        let frame = encoder.fit_transform(&frame, &columns)?;

        info!(
            rows = frame.height(),
            dropped = dropped_columns.len(),
            encoded = encoded_columns.len(),
            "Prepared features"
        );

        Ok((
            EncodedDataset {
                frame,
                label_column: self.schema.label_column.clone(),
                dropped_columns,
                encoded_columns,
            },
            encoder,
        ))
    }

    /// Prepare later input with an already fitted encoder. The result must
    /// carry every feature column of the training data, in any order.
    pub fn transform_features(
        &self,
        df: &DataFrame,
        encoder: &CategoryEncoder,
        feature_names: &[String],
    ) -> Result<Array2<f64>> {
        let (frame, _) = self.drop_identifiers(df)?;
        let frame = encoder.transform(&frame)?;
        feature_matrix(&frame, feature_names)
    }

    fn drop_identifiers(&self, df: &DataFrame) -> Result<(DataFrame, Vec<String>)> {
        let mut frame = df.clone();
        let mut dropped = Vec::new();
        for name in df.get_column_names() {
            if self.schema.role_of(name.as_str()) == ColumnRole::Identifier {
                frame = frame.drop(name.as_str())?;
                dropped.push(name.to_string());
            }
        }
        if !dropped.is_empty() {
            debug!(columns = ?dropped, "Dropped identifier columns");
        }
        Ok((frame, dropped))
    }
}

/// Collect named columns into a row-major f64 matrix
fn feature_matrix(df: &DataFrame, feature_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut x = Array2::zeros((n_rows, feature_names.len()));

    for (j, name) in feature_names.iter().enumerate() {
        let column = df
            .column(name)
            .map_err(|_| ChurnError::MissingColumn(name.clone()))?;
        let series = column.as_materialized_series();
        if matches!(series.dtype(), DataType::String) {
            return Err(ChurnError::DataError(format!(
                "column '{}' holds text but is neither categorical nor an identifier",
                name
            )));
        }
        let series = series.cast(&DataType::Float64)?;
        let ca = series.f64()?;

        for (i, value) in ca.into_iter().enumerate() {
            match value {
                Some(v) if v.is_finite() => x[[i, j]] = v,
                _ => {
                    return Err(ChurnError::Parse {
                        row: i,
                        column: Some(name.clone()),
                        message: "missing or non-finite numeric value".to_string(),
                    })
                }
            }
        }
    }

    Ok(x)
}

fn label_vector(series: &Series) -> Result<Array1<f64>> {
    if matches!(series.dtype(), DataType::String) {
        return Err(ChurnError::DataError(format!(
            "label column '{}' must be numeric",
            series.name()
        )));
    }
    let series = series.cast(&DataType::Float64)?;
    let ca = series.f64()?;

    ca.into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v == 0.0 || v == 1.0 => Ok(v),
            Some(v) => Err(ChurnError::NonBinaryLabel { row, value: v }),
            None => Err(ChurnError::NonBinaryLabel {
                row,
                value: f64::NAN,
            }),
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}
