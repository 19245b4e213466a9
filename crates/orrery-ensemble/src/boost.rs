//! Multiclass AdaBoost (SAMME) over weighted decision stumps.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::EnsembleError;
use crate::predict::{ClassDistribution, Classifier, softmax};
use crate::tree::{DecisionTree, DecisionTreeConfig};
use crate::validate::{to_columns, validate_training};

/// Configuration for SAMME boosting.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `learning_rate` | 1.0     |
/// | `max_depth`     | 1       |
/// | `seed`          | 42      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostConfig {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    seed: u64,
}

impl AdaBoostConfig {
    /// Create a config with `n_estimators` boosting rounds.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::InvalidEstimatorCount`] if `n_estimators` is zero.
    pub fn new(n_estimators: usize) -> Result<Self, EnsembleError> {
        if n_estimators == 0 {
            return Err(EnsembleError::InvalidEstimatorCount { n_estimators });
        }
        Ok(Self {
            n_estimators,
            learning_rate: 1.0,
            max_depth: 1,
            seed: 42,
        })
    }

    /// Set the shrinkage applied to every estimator weight.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the depth of each weak learner.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the maximum number of boosting rounds.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Return the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the weak learner depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fit a boosted ensemble.
    ///
    /// Each round fits a stump on the current sample weights, scores it by
    /// weighted error and up-weights the samples it misclassified. Boosting
    /// stops early on a perfect learner (kept with weight 1) or on a learner
    /// no better than chance (discarded, unless it is the first).
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::TooFewClasses`] | `n_classes < 2` |
    /// | [`EnsembleError::InvalidLearningRate`] | learning rate not positive and finite |
    /// | [`EnsembleError::InvalidMaxDepth`] | `max_depth` is zero |
    /// | Data errors | see [`DecisionTreeConfig::fit_weighted`] |
    #[instrument(skip_all, fields(n_estimators = self.n_estimators, n_samples = features.len()))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<AdaBoost, EnsembleError> {
        if n_classes < 2 {
            return Err(EnsembleError::TooFewClasses { n_classes });
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(EnsembleError::InvalidLearningRate {
                learning_rate: self.learning_rate,
            });
        }
        let n_features = validate_training(features, labels, n_classes)?;
        let stump = DecisionTreeConfig::new().with_max_depth(Some(self.max_depth));
        let max_features = stump.validate(n_features)?;

        let n_samples = features.len();
        let columns = to_columns(features, n_features);
        let indices: Vec<usize> = (0..n_samples).collect();
        let mut weights = vec![1.0 / n_samples as f64; n_samples];
        let chance_error = 1.0 - 1.0 / n_classes as f64;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut estimators = Vec::new();
        let mut estimator_weights = Vec::new();
        let mut estimator_errors = Vec::new();

        for round in 0..self.n_estimators {
            let tree = stump.clone().with_seed(rng.r#gen()).grow(
                &columns,
                labels,
                &weights,
                &indices,
                n_classes,
                max_features,
            );

            let mut incorrect = vec![false; n_samples];
            for (i, row) in features.iter().enumerate() {
                incorrect[i] = tree.predict(row)? != labels[i];
            }
            let total: f64 = weights.iter().sum();
            let error: f64 = weights
                .iter()
                .zip(&incorrect)
                .filter(|(_, miss)| **miss)
                .map(|(w, _)| w)
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                debug!(round, "perfect weak learner, stopping");
                estimators.push(tree);
                estimator_weights.push(1.0);
                estimator_errors.push(0.0);
                break;
            }
            if error >= chance_error {
                debug!(round, error, "weak learner no better than chance, stopping");
                if estimators.is_empty() {
                    estimators.push(tree);
                    estimator_weights.push(1.0);
                    estimator_errors.push(error);
                }
                break;
            }

            let alpha =
                self.learning_rate * (((1.0 - error) / error).ln() + ((n_classes - 1) as f64).ln());
            estimators.push(tree);
            estimator_weights.push(alpha);
            estimator_errors.push(error);

            if round + 1 == self.n_estimators {
                break;
            }
            for (w, miss) in weights.iter_mut().zip(&incorrect) {
                if *miss && *w > 0.0 {
                    *w *= alpha.exp();
                }
            }
            let sum: f64 = weights.iter().sum();
            if !(sum.is_finite() && sum > 0.0) {
                debug!(round, "sample weights degenerated, stopping");
                break;
            }
            weights.iter_mut().for_each(|w| *w /= sum);
        }

        info!(n_rounds = estimators.len(), "adaboost trained");

        Ok(AdaBoost {
            estimators,
            estimator_weights,
            estimator_errors,
            n_features,
            n_classes,
        })
    }
}

/// A fitted SAMME ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoost {
    estimators: Vec<DecisionTree>,
    estimator_weights: Vec<f64>,
    estimator_errors: Vec<f64>,
    n_features: usize,
    n_classes: usize,
}

impl AdaBoost {
    /// Return the number of fitted rounds.
    #[must_use]
    pub fn n_rounds(&self) -> usize {
        self.estimators.len()
    }

    /// Return the weight of each round's learner.
    #[must_use]
    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }

    /// Return the weighted training error of each round's learner.
    #[must_use]
    pub fn estimator_errors(&self) -> &[f64] {
        &self.estimator_errors
    }
}

impl Classifier for AdaBoost {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    /// Softmax of the normalized weighted vote divided by `K - 1`.
    fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, EnsembleError> {
        if sample.len() != self.n_features {
            return Err(EnsembleError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut votes = vec![0.0; self.n_classes];
        for (tree, alpha) in self.estimators.iter().zip(&self.estimator_weights) {
            votes[tree.predict(sample)?] += alpha;
        }
        let total: f64 = self.estimator_weights.iter().sum();
        let scale = total * (self.n_classes - 1) as f64;
        votes.iter_mut().for_each(|v| *v /= scale);
        softmax(&mut votes);
        Ok(ClassDistribution::new(votes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_needs_several_stumps() {
        // Class 1 sits in the middle: no single stump separates it.
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..30).map(|i| usize::from((10..20).contains(&i))).collect();
        let model = AdaBoostConfig::new(50).unwrap().fit(&features, &labels, 2).unwrap();
        assert!(model.n_rounds() > 1);
        let predictions = model.predict_batch(&features).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(correct >= 27, "only {correct} of 30 correct");
    }

    #[test]
    fn perfect_stump_stops_early() {
        let features = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        let model = AdaBoostConfig::new(20).unwrap().fit(&features, &[0, 0, 1, 1], 2).unwrap();
        assert_eq!(model.n_rounds(), 1);
        assert_eq!(model.estimator_weights(), &[1.0]);
        assert_eq!(model.predict(&[0.5]).unwrap(), 0);
        assert_eq!(model.predict(&[10.5]).unwrap(), 1);
    }

    #[test]
    fn probabilities_cover_every_class() {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..30).map(|i| i / 10).collect();
        let model = AdaBoostConfig::new(10).unwrap().fit(&features, &labels, 3).unwrap();
        let d = model.predict_proba(&[15.0]).unwrap();
        assert_eq!(d.as_slice().len(), 3);
        assert!((d.as_slice().iter().sum::<f64>() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn single_class_rejected() {
        let features = vec![vec![0.0], vec![1.0]];
        assert!(matches!(
            AdaBoostConfig::new(5).unwrap().fit(&features, &[0, 0], 1),
            Err(EnsembleError::TooFewClasses { n_classes: 1 })
        ));
    }

    #[test]
    fn bad_learning_rate_rejected() {
        let features = vec![vec![0.0], vec![1.0]];
        let err = AdaBoostConfig::new(5)
            .unwrap()
            .with_learning_rate(0.0)
            .fit(&features, &[0, 1], 2)
            .unwrap_err();
        assert!(matches!(err, EnsembleError::InvalidLearningRate { .. }));
    }
}
