//! Multinomial logistic regression with L2 regularization.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::EnsembleError;
use crate::predict::{ClassDistribution, Classifier, softmax};
use crate::validate::validate_training;

/// Sufficient decrease constant for the backtracking line search.
const ARMIJO_C: f64 = 1e-4;
/// Step shrink factor per backtracking iteration.
const BACKTRACK: f64 = 0.5;
/// Line search gives up below this step size.
const MIN_STEP: f64 = 1e-12;

/// Configuration for multinomial logistic regression.
///
/// The objective is mean cross-entropy plus `‖W‖² / (2·C·n)`; intercepts are
/// not penalized.
///
/// # Defaults
///
/// | Parameter           | Default |
/// |---------------------|---------|
/// | `c`                 | 1.0     |
/// | `max_iter`          | 500     |
/// | `tol`               | 1e-4    |
/// | `suppress_warnings` | `false` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    c: f64,
    max_iter: usize,
    tol: f64,
    suppress_warnings: bool,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegressionConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 500,
            tol: 1e-4,
            suppress_warnings: false,
        }
    }

    /// Set the inverse regularization strength.
    #[must_use]
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance on the largest gradient component.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Log non-convergence at `debug` instead of `warn`.
    #[must_use]
    pub fn with_suppress_warnings(mut self, suppress_warnings: bool) -> Self {
        self.suppress_warnings = suppress_warnings;
        self
    }

    /// Return the inverse regularization strength.
    #[must_use]
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Return the iteration cap.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Return the convergence tolerance.
    #[must_use]
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Fit by full-batch gradient descent with backtracking line search.
    ///
    /// Hitting `max_iter` before the gradient falls below `tol` is not an
    /// error: the model is returned with `converged() == false` and a warning
    /// is logged.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::TooFewClasses`] | `n_classes < 2` |
    /// | [`EnsembleError::InvalidRegularization`] | `c` not positive and finite |
    /// | [`EnsembleError::InvalidMaxIter`] | `max_iter` is zero |
    /// | Data errors | see [`crate::DecisionTreeConfig::fit`] |
    #[instrument(skip_all, fields(n_samples = features.len(), n_classes = n_classes))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<LogisticRegression, EnsembleError> {
        if n_classes < 2 {
            return Err(EnsembleError::TooFewClasses { n_classes });
        }
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(EnsembleError::InvalidRegularization { c: self.c });
        }
        if self.max_iter == 0 {
            return Err(EnsembleError::InvalidMaxIter {
                max_iter: self.max_iter,
            });
        }
        let n_features = validate_training(features, labels, n_classes)?;

        let objective = Objective {
            features,
            labels,
            n_classes,
            n_features,
            l2: 1.0 / (self.c * features.len() as f64),
        };

        // Parameters: K rows of d weights, then K intercepts.
        let n_params = n_classes * (n_features + 1);
        let mut params = vec![0.0; n_params];
        let mut grad = vec![0.0; n_params];
        let mut loss = objective.evaluate(&params, Some(&mut grad));
        let mut step = 1.0_f64;
        let mut converged = false;
        let mut n_iter = 0;

        let mut candidate = vec![0.0; n_params];
        while n_iter < self.max_iter {
            let grad_max = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if grad_max <= self.tol {
                converged = true;
                break;
            }
            n_iter += 1;

            let grad_sq: f64 = grad.iter().map(|g| g * g).sum();
            step = (step * 2.0).min(1e6);
            let mut accepted = false;
            while step >= MIN_STEP {
                for ((c, p), g) in candidate.iter_mut().zip(&params).zip(&grad) {
                    *c = p - step * g;
                }
                let candidate_loss = objective.evaluate(&candidate, None);
                if candidate_loss <= loss - ARMIJO_C * step * grad_sq {
                    accepted = true;
                    break;
                }
                step *= BACKTRACK;
            }
            if !accepted {
                debug!(n_iter, loss, "line search stalled");
                break;
            }
            std::mem::swap(&mut params, &mut candidate);
            loss = objective.evaluate(&params, Some(&mut grad));
        }

        if !converged {
            // Tolerance may be met exactly on the final update.
            converged = grad.iter().all(|g| g.abs() <= self.tol);
        }
        if !converged {
            if self.suppress_warnings {
                debug!(n_iter, loss, "logistic regression did not converge");
            } else {
                warn!(
                    n_iter,
                    loss,
                    max_iter = self.max_iter,
                    "logistic regression did not converge; consider raising max_iter"
                );
            }
        }
        info!(n_iter, loss, converged, "logistic regression trained");

        let intercepts = params.split_off(n_classes * n_features);
        Ok(LogisticRegression {
            weights: params,
            intercepts,
            n_features,
            n_classes,
            n_iter,
            converged,
        })
    }
}

/// Regularized cross-entropy over one training set.
struct Objective<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    n_features: usize,
    l2: f64,
}

impl Objective<'_> {
    /// Return the loss at `params`, writing the gradient when requested.
    fn evaluate(&self, params: &[f64], mut grad: Option<&mut [f64]>) -> f64 {
        let d = self.n_features;
        let k = self.n_classes;
        let (weights, intercepts) = params.split_at(k * d);
        if let Some(g) = grad.as_deref_mut() {
            g.iter_mut().for_each(|v| *v = 0.0);
        }

        let mut loss = 0.0;
        let mut scores = vec![0.0; k];
        for (row, &label) in self.features.iter().zip(self.labels) {
            for (class, score) in scores.iter_mut().enumerate() {
                *score = intercepts[class] + dot(&weights[class * d..(class + 1) * d], row);
            }
            softmax(&mut scores);
            loss -= scores[label].max(f64::MIN_POSITIVE).ln();

            if let Some(g) = grad.as_deref_mut() {
                let (gw, gb) = g.split_at_mut(k * d);
                for (class, p) in scores.iter().enumerate() {
                    let diff = p - if class == label { 1.0 } else { 0.0 };
                    for (gj, xj) in gw[class * d..(class + 1) * d].iter_mut().zip(row) {
                        *gj += diff * xj;
                    }
                    gb[class] += diff;
                }
            }
        }

        let n = self.features.len() as f64;
        let penalty: f64 = weights.iter().map(|w| w * w).sum::<f64>() * self.l2 / 2.0;
        if let Some(g) = grad {
            let (gw, gb) = g.split_at_mut(k * d);
            for (gj, wj) in gw.iter_mut().zip(weights) {
                *gj = *gj / n + self.l2 * wj;
            }
            gb.iter_mut().for_each(|v| *v /= n);
        }
        loss / n + penalty
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// A fitted multinomial logistic regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Row-major `n_classes × n_features`.
    weights: Vec<f64>,
    intercepts: Vec<f64>,
    n_features: usize,
    n_classes: usize,
    n_iter: usize,
    converged: bool,
}

impl LogisticRegression {
    /// Return the coefficient row of one class.
    #[must_use]
    pub fn coefficients(&self, class: usize) -> &[f64] {
        &self.weights[class * self.n_features..(class + 1) * self.n_features]
    }

    /// Return the per-class intercepts.
    #[must_use]
    pub fn intercepts(&self) -> &[f64] {
        &self.intercepts
    }

    /// Return the number of gradient steps taken.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Return whether the gradient tolerance was reached.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }
}

impl Classifier for LogisticRegression {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, EnsembleError> {
        if sample.len() != self.n_features {
            return Err(EnsembleError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut scores: Vec<f64> = (0..self.n_classes)
            .map(|class| self.intercepts[class] + dot(self.coefficients(class), sample))
            .collect();
        softmax(&mut scores);
        Ok(ClassDistribution::new(scores))
    }
}
