//! Shared prediction interface for fitted classifiers.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::EnsembleError;

/// Class probability distribution from a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    /// Wrap a probability vector indexed by class.
    #[must_use]
    pub fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Return the predicted class (argmax; the lowest index wins ties).
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        let mut best = 0;
        for (i, p) in self.probs.iter().enumerate() {
            if *p > self.probs[best] {
                best = i;
            }
        }
        best
    }

    /// Return the probability of one class.
    #[must_use]
    pub fn probability(&self, class: usize) -> f64 {
        self.probs.get(class).copied().unwrap_or(0.0)
    }

    /// Return the top-k classes sorted by descending probability.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        indexed
    }

    /// Return the probability distribution as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    /// Consume the distribution and return the probabilities.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.probs
    }
}

/// A fitted probabilistic classifier over dense feature rows.
pub trait Classifier: Sync {
    /// Number of classes the model predicts.
    fn n_classes(&self) -> usize;

    /// Number of features expected per sample.
    fn n_features(&self) -> usize;

    /// Class probabilities for one sample.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features()`.
    fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, EnsembleError>;

    /// Predicted class for one sample.
    ///
    /// # Errors
    ///
    /// See [`Classifier::predict_proba`].
    fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        Ok(self.predict_proba(sample)?.predicted_class())
    }

    /// Class probabilities for a batch, computed in parallel.
    ///
    /// # Errors
    ///
    /// See [`Classifier::predict_proba`].
    fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<ClassDistribution>, EnsembleError> {
        features
            .par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    /// Predicted classes for a batch, computed in parallel.
    ///
    /// # Errors
    ///
    /// See [`Classifier::predict_proba`].
    fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, EnsembleError> {
        features
            .par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }
}

/// Numerically stable softmax in place.
pub(crate) fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_lowest_index_on_tie() {
        let d = ClassDistribution::new(vec![0.4, 0.4, 0.2]);
        assert_eq!(d.predicted_class(), 0);
    }

    #[test]
    fn top_k_descending() {
        let d = ClassDistribution::new(vec![0.2, 0.5, 0.3]);
        assert_eq!(d.top_k(2), vec![(1, 0.5), (2, 0.3)]);
        assert_eq!(d.top_k(10).len(), 3);
    }

    #[test]
    fn softmax_is_stable() {
        let mut s = vec![1000.0, 1000.0];
        softmax(&mut s);
        assert!((s[0] - 0.5).abs() < 1e-12);
        let mut s = vec![0.0, (2.0_f64).ln()];
        softmax(&mut s);
        assert!((s[1] - 2.0 / 3.0).abs() < 1e-12);
    }
}
