//! Z-score feature scaling

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column `(x - mean) / std` with population standard deviation.
///
/// Parameters are fitted on one matrix (the training partition) and then
/// applied unchanged to any other. Zero-variance columns scale to 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Option<Array1<f64>>,
    stds: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute column means and standard deviations
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(ChurnError::InsufficientData(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let mut means = Array1::zeros(x.ncols());
        let mut stds = Array1::zeros(x.ncols());
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let mean = column.iter().sum::<f64>() / n_rows as f64;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
            means[j] = mean;
            stds[j] = var.sqrt();
        }

        self.means = Some(means);
        self.stds = Some(stds);
        Ok(self)
    }

    /// Apply the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, stds) = match (&self.means, &self.stds) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(ChurnError::ModelNotFitted),
        };
        if x.ncols() != means.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} columns", means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (means[j], stds[j]);
            if std > f64::EPSILON {
                column.mapv_inplace(|v| (v - mean) / std);
            } else {
                column.fill(0.0);
            }
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn is_fitted(&self) -> bool {
        self.means.is_some()
    }

    pub fn means(&self) -> Option<&Array1<f64>> {
        self.means.as_ref()
    }

    pub fn stds(&self) -> Option<&Array1<f64>> {
        self.stds.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaling() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for j in 0..2 {
            let col = scaled.column(j);
            let mean: f64 = col.iter().sum::<f64>() / 3.0;
            let var: f64 = col.iter().map(|v| v * v).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_variance_column_scales_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaled = StandardScaler::new().fit_transform(&x).unwrap();
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_test_partition_uses_train_parameters() {
        let train = array![[0.0], [2.0]];
        let test = array![[4.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();

        let scaled = scaler.transform(&test).unwrap();
        assert_eq!(scaler.means().unwrap()[0], 1.0);
        assert_eq!(scaler.stds().unwrap()[0], 1.0);
        assert_eq!(scaled[[0, 0]], 3.0);
    }

    #[test]
    fn test_shape_mismatch_and_unfitted() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(ChurnError::ModelNotFitted)
        ));

        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(ChurnError::ShapeError { .. })
        ));
    }
}
