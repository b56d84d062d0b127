//! Support Vector Machine classifier
//!
//! Binary soft-margin SVM trained with simplified SMO (Sequential Minimal
//! Optimization) over a precomputed kernel matrix. The positive-class score
//! is the logistic function of the decision value.

use super::config::ModelKind;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Passes without any alpha change before SMO stops
const MAX_QUIET_PASSES: usize = 5;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF { gamma: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: 0.1 }
    }
}

impl KernelType {
    fn apply(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::Polynomial { degree, gamma, coef0 } => {
                (gamma * a.dot(&b) + coef0).powi(*degree as i32)
            }
            KernelType::RBF { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of SMO passes
    pub max_iter: usize,
    /// Random seed for second-multiplier selection
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 200,
            random_state: Some(42),
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i per support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(ChurnError::InvalidInput(format!(
                "{} samples exceed the kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if !(self.config.c > 0.0) {
            return Err(ChurnError::InvalidParameter {
                name: "c".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let y_signed: Array1<f64> = y.mapv(|v| if v >= 0.5 { 1.0 } else { -1.0 });
        let n_pos = y_signed.iter().filter(|&&v| v > 0.0).count();
        if n_pos == 0 || n_pos == n {
            return Err(ChurnError::training(ModelKind::SVM.name(), "training labels contain a single class"));
        }

        let (alphas, bias) = self.smo_train(x, &y_signed);

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();
        if support.is_empty() {
            return Err(ChurnError::training(ModelKind::SVM.name(), "no support vectors found"));
        }
        if !bias.is_finite() || alphas.iter().any(|a| !a.is_finite()) {
            return Err(ChurnError::training(ModelKind::SVM.name(), "dual coefficients are not finite"));
        }

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (k, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            dual_coef[k] = alphas[idx] * y_signed[idx];
        }

        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.bias = bias;
        Ok(())
    }

    /// Simplified SMO; returns the multipliers and bias
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        let k = self.compute_kernel_matrix(x);
        let mut alphas: Array1<f64> = Array1::zeros(n);
        // alpha_i * y_i, kept in step with alphas
        let mut ay: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let mut quiet_passes = 0;
        let mut total_iter = 0;

        while quiet_passes < MAX_QUIET_PASSES && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = k.row(i).dot(&ay) + bias - y[i];

                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let mut j = rng.gen_range(0..n - 1);
                    if j >= i {
                        j += 1;
                    }
                    let e_j = k.row(j).dot(&ay) + bias - y[j];

                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                    } else {
                        ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                    };
                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alpha_j - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }
                    let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);

                    let b1 = bias
                        - e_i
                        - y[i] * (alpha_i - alpha_i_old) * k[[i, i]]
                        - y[j] * (alpha_j - alpha_j_old) * k[[i, j]];
                    let b2 = bias
                        - e_j
                        - y[i] * (alpha_i - alpha_i_old) * k[[i, j]]
                        - y[j] * (alpha_j - alpha_j_old) * k[[j, j]];

                    bias = if alpha_i > 0.0 && alpha_i < c {
                        b1
                    } else if alpha_j > 0.0 && alpha_j < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    alphas[i] = alpha_i;
                    alphas[j] = alpha_j;
                    ay[i] = alpha_i * y[i];
                    ay[j] = alpha_j * y[j];
                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                quiet_passes += 1;
            } else {
                quiet_passes = 0;
            }
        }

        if quiet_passes < MAX_QUIET_PASSES {
            warn!(
                max_iter = self.config.max_iter,
                "SVM reached the pass limit before the multipliers settled"
            );
        }

        (alphas, bias)
    }

    /// Compute kernel matrix, upper-triangle rows in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let kernel = &self.config.kernel;

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| kernel.apply(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Signed distance-like decision value per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(ChurnError::ModelNotFitted),
        };
        if x.ncols() != sv.ncols() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let kernel = &self.config.kernel;
        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &c)| c * kernel.apply(sample, s))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }

    /// Logistic of the decision value
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|d| 1.0 / (1.0 + (-d).exp())))
    }

    /// Class labels from the sign of the decision value
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|d| if d >= 0.0 { 1.0 } else { 0.0 }))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_linear_separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, 5.0, 5.0, 5.5, 5.2, 6.0, 6.0, 5.2,
                5.8, 4.8, 5.5,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        (x, y)
    }

    #[test]
    fn test_svm_classifier_linear() {
        let (x, y) = create_linear_separable_data();
        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::Linear,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = y.iter().zip(predictions.iter()).filter(|(a, b)| a == b).count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.8, "Accuracy {} should be > 0.8", accuracy);
        assert!(svm.n_support_vectors() > 0);
    }

    #[test]
    fn test_svm_classifier_rbf_scores() {
        let (x, y) = create_linear_separable_data();
        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::RBF { gamma: 0.5 },
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        let proba = svm.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 10);
        assert!(proba.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_single_class_is_training_failure() {
        let (x, _) = create_linear_separable_data();
        let y = Array1::ones(10);
        let mut svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(
            svm.fit(&x, &y),
            Err(ChurnError::TrainingFailure { .. })
        ));
    }

    #[test]
    fn test_unfitted() {
        let svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(
            svm.decision_function(&Array2::zeros((1, 2))),
            Err(ChurnError::ModelNotFitted)
        ));
    }
}
