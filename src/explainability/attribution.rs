//! Attribution results: per-row explanations and their global summary

use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::error::{ChurnError, Result};
use crate::training::ModelKind;

/// Space in which attributions add up to the model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSpace {
    /// Mean of tree leaf positive-class fractions
    Probability,
    /// Raw boosting margin
    LogOdds,
}

impl fmt::Display for OutputSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSpace::Probability => f.write_str("probability"),
            OutputSpace::LogOdds => f.write_str("log-odds"),
        }
    }
}

/// Feature contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature_index: usize,
    pub feature_name: String,
    /// Feature value for this row (scaled space)
    pub feature_value: f64,
    /// Signed SHAP value
    pub contribution: f64,
}

/// Explanation for a single row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowExplanation {
    pub row_index: usize,
    pub base_value: f64,
    /// Model output for this row
    pub output: f64,
    /// In feature order
    pub contributions: Vec<FeatureContribution>,
}

impl RowExplanation {
    pub fn sum_contributions(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    /// By absolute contribution, descending; ties keep feature order
    pub fn sorted_contributions(&self) -> Vec<&FeatureContribution> {
        let mut sorted: Vec<&FeatureContribution> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }

    pub fn top_k(&self, k: usize) -> Vec<&FeatureContribution> {
        self.sorted_contributions().into_iter().take(k).collect()
    }

    /// Ranked `feature, value, contribution` table
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let sorted = self.sorted_contributions();
        let names: Vec<&str> = sorted.iter().map(|c| c.feature_name.as_str()).collect();
        let values: Vec<f64> = sorted.iter().map(|c| c.feature_value).collect();
        let contributions: Vec<f64> = sorted.iter().map(|c| c.contribution).collect();
        Ok(DataFrame::new(vec![
            Series::new("feature".into(), names).into(),
            Series::new("value".into(), values).into(),
            Series::new("contribution".into(), contributions).into(),
        ])?)
    }
}

/// SHAP values for a bounded sample of rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionSet {
    model: ModelKind,
    output_space: OutputSpace,
    feature_names: Vec<String>,
    base_value: f64,
    /// rows x features
    values: Array2<f64>,
    outputs: Array1<f64>,
    data: Array2<f64>,
}

impl AttributionSet {
    pub(crate) fn new(
        model: ModelKind,
        output_space: OutputSpace,
        feature_names: Vec<String>,
        base_value: f64,
        values: Array2<f64>,
        outputs: Array1<f64>,
        data: Array2<f64>,
    ) -> Self {
        Self {
            model,
            output_space,
            feature_names,
            base_value,
            values,
            outputs,
            data,
        }
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn output_space(&self) -> OutputSpace {
        self.output_space
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Expected model output over the training covers
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Model output per explained row, in [`Self::output_space`]
    pub fn outputs(&self) -> &Array1<f64> {
        &self.outputs
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.n_rows() {
            return Err(ChurnError::InvalidInput(format!(
                "row {} is outside the {} explained rows",
                row,
                self.n_rows()
            )));
        }
        Ok(())
    }

    pub fn row(&self, row: usize) -> Result<RowExplanation> {
        self.check_row(row)?;
        let contributions = self
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, name)| FeatureContribution {
                feature_index: j,
                feature_name: name.clone(),
                feature_value: self.data[[row, j]],
                contribution: self.values[[row, j]],
            })
            .collect();
        Ok(RowExplanation {
            row_index: row,
            base_value: self.base_value,
            output: self.outputs[row],
            contributions,
        })
    }

    /// The `k` largest contributions for one row as `(feature, signed value)`
    pub fn top_features(&self, row: usize, k: usize) -> Result<Vec<(String, f64)>> {
        Ok(self
            .row(row)?
            .top_k(k)
            .into_iter()
            .map(|c| (c.feature_name.clone(), c.contribution))
            .collect())
    }

    /// Mean absolute attribution per feature, largest first
    pub fn global_importance(&self) -> Vec<(String, f64)> {
        let mean_abs = self
            .values
            .mapv(f64::abs)
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.feature_names.len()));
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(mean_abs.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// `feature, mean_abs_attribution` ranked table
    pub fn importance_frame(&self) -> Result<DataFrame> {
        let ranked = self.global_importance();
        let names: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
        let scores: Vec<f64> = ranked.iter().map(|(_, s)| *s).collect();
        Ok(DataFrame::new(vec![
            Series::new("feature".into(), names).into(),
            Series::new("mean_abs_attribution".into(), scores).into(),
        ])?)
    }

    pub fn write_importance_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.importance_frame()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }

    /// Largest gap between `base + sum(phi)` and the model output
    pub fn max_completeness_error(&self) -> f64 {
        self.values
            .outer_iter()
            .zip(self.outputs.iter())
            .map(|(phi, out)| (self.base_value + phi.sum() - out).abs())
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for AttributionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} attributions over {} rows ({}, base {:.4})",
            self.model.name(),
            self.n_rows(),
            self.output_space,
            self.base_value
        )?;
        for (name, score) in self.global_importance() {
            writeln!(f, "{:<22}{:>12.6}", name, score)?;
        }
        Ok(())
    }
}
