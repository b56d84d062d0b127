//! Categorical label encoding
//!
//! Codes are assigned in order of first observation. The encoder is fitted
//! once and then reused for every later input; values outside the fitted
//! vocabulary are rejected rather than re-coded.

use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Vocabulary of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    column: String,
    categories: Vec<String>,
    codes: HashMap<String, usize>,
}

impl CategoryMapping {
    fn from_series(column: &str, series: &Series) -> Result<Self> {
        let ca = series
            .str()
            .map_err(|e| ChurnError::DataError(format!("column '{}': {}", column, e)))?;

        let mut categories = Vec::new();
        let mut codes = HashMap::new();
        for (row, value) in ca.into_iter().enumerate() {
            let value = value.ok_or_else(|| ChurnError::Parse {
                row,
                column: Some(column.to_string()),
                message: "missing category value".to_string(),
            })?;
            if !codes.contains_key(value) {
                codes.insert(value.to_string(), categories.len());
                categories.push(value.to_string());
            }
        }

        Ok(Self {
            column: column.to_string(),
            categories,
            codes,
        })
    }

    /// Column this mapping encodes
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Categories in code order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Code of a category, if it was seen during fit
    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.codes.get(value).copied()
    }

    fn encode_series(&self, series: &Series) -> Result<Series> {
        let ca = series
            .str()
            .map_err(|e| ChurnError::DataError(format!("column '{}': {}", self.column, e)))?;

        let encoded = ca
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let value = value.unwrap_or("");
                self.code_of(value)
                    .map(|code| code as f64)
                    .ok_or_else(|| ChurnError::UnknownCategory {
                        column: self.column.clone(),
                        value: value.to_string(),
                        row,
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Series::new(self.column.as_str().into(), encoded))
    }
}

/// Label encoder over a fixed set of categorical columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryEncoder {
    mappings: Vec<CategoryMapping>,
    is_fitted: bool,
}

impl CategoryEncoder {
    /// Create an unfitted encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the vocabulary of each column from the full frame
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut mappings = Vec::with_capacity(columns.len());
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| ChurnError::MissingColumn(col_name.to_string()))?;
            mappings.push(CategoryMapping::from_series(
                col_name,
                column.as_materialized_series(),
            )?);
        }

        self.mappings = mappings;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted column with its Float64 codes
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .mappings
            .iter()
            .map(|mapping| {
                let column = df
                    .column(mapping.column())
                    .map_err(|_| ChurnError::MissingColumn(mapping.column().to_string()))?;
                mapping.encode_series(column.as_materialized_series())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for encoded in replacements {
            result.with_column(encoded)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Whether `fit` has run
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted mappings in column order
    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.mappings
    }

    /// Mapping for one column
    pub fn mapping(&self, column: &str) -> Option<&CategoryMapping> {
        self.mappings.iter().find(|m| m.column() == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df! {
            "Geography" => ["Spain", "France", "Spain", "Germany"],
            "Age" => [30.0, 41.0, 25.0, 52.0],
        }
        .unwrap()
    }

    #[test]
    fn test_codes_follow_first_observation() {
        let mut encoder = CategoryEncoder::new();
        let out = encoder.fit_transform(&sample(), &["Geography"]).unwrap();

        let codes: Vec<f64> = out
            .column("Geography")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(codes, vec![0.0, 1.0, 0.0, 2.0]);

        let mapping = encoder.mapping("Geography").unwrap();
        assert_eq!(mapping.categories(), &["Spain", "France", "Germany"]);
    }

    #[test]
    fn test_transform_reuses_fitted_vocabulary() {
        let mut encoder = CategoryEncoder::new();
        encoder.fit(&sample(), &["Geography"]).unwrap();

        let later = df! {
            "Geography" => ["Germany", "France"],
            "Age" => [33.0, 60.0],
        }
        .unwrap();
        let out = encoder.transform(&later).unwrap();
        let codes: Vec<f64> = out
            .column("Geography")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(codes, vec![2.0, 1.0]);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut encoder = CategoryEncoder::new();
        encoder.fit(&sample(), &["Geography"]).unwrap();

        let later = df! {
            "Geography" => ["France", "Italy"],
            "Age" => [33.0, 60.0],
        }
        .unwrap();
        match encoder.transform(&later).unwrap_err() {
            ChurnError::UnknownCategory { column, value, row } => {
                assert_eq!(column, "Geography");
                assert_eq!(value, "Italy");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let encoder = CategoryEncoder::new();
        assert!(matches!(
            encoder.transform(&sample()),
            Err(ChurnError::ModelNotFitted)
        ));
    }
}
