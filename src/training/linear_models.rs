//! Logistic regression fitted by batch gradient descent

use super::config::ModelKind;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Logistic regression hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    /// L2 regularization strength
    pub alpha: f64,
    /// Maximum gradient steps
    pub max_iter: usize,
    /// Gradient-norm convergence tolerance
    pub tol: f64,
    /// Step size
    pub learning_rate: f64,
    pub fit_intercept: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            fit_intercept: true,
        }
    }
}

/// Binary logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticParams,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
    converged: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticParams::default())
    }
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
            converged: false,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.params.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.params.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.params.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit the model using gradient descent.
    ///
    /// Reaching `max_iter` keeps the last iterate and logs a warning;
    /// non-finite parameters fail the fit.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ChurnError::InsufficientData("empty training set".to_string()));
        }

        let mut weights: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;
        let lr = self.params.learning_rate;
        let alpha = self.params.alpha;

        self.converged = false;
        self.n_iter = 0;
        for iter in 0..self.params.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = if self.params.fit_intercept {
                errors.mean().unwrap_or(0.0)
            } else {
                0.0
            };

            self.n_iter = iter + 1;
            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !grad_norm.is_finite() {
                return Err(ChurnError::training(
                    ModelKind::LogisticRegression.name(),
                    format!("gradient became non-finite at iteration {}", iter),
                ));
            }
            if grad_norm < self.params.tol {
                self.converged = true;
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        if weights.iter().any(|w: &f64| !w.is_finite()) || !bias.is_finite() {
            return Err(ChurnError::training(
                ModelKind::LogisticRegression.name(),
                "coefficients are not finite",
            ));
        }
        if !self.converged {
            warn!(
                max_iter = self.params.max_iter,
                "Logistic regression reached the iteration cap before converging"
            );
        }

        self.coefficients = Some(weights);
        self.intercept = bias;

        Ok(self)
    }

    /// Linear score `x . w + b`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Self::sigmoid(&self.decision_function(x)?))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Whether the last fit met the tolerance before `max_iter`
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}
