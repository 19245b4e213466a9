//! Stacked generalization over a random forest and an AdaBoost ensemble.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::EnsembleError;
use crate::boost::{AdaBoost, AdaBoostConfig};
use crate::folds::{StratifiedKFold, gather_labels, gather_rows};
use crate::forest::{RandomForest, RandomForestConfig};
use crate::logistic::{LogisticRegression, LogisticRegressionConfig};
use crate::predict::{ClassDistribution, Classifier};
use crate::validate::validate_training;

/// Configuration for the stacked ensemble.
///
/// # Defaults
///
/// | Parameter     | Default                              |
/// |---------------|--------------------------------------|
/// | `meta`        | [`LogisticRegressionConfig::new`]    |
/// | `n_folds`     | 5                                    |
/// | `passthrough` | `true`                               |
/// | `seed`        | 42                                   |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackingConfig {
    forest: RandomForestConfig,
    boost: AdaBoostConfig,
    meta: LogisticRegressionConfig,
    n_folds: usize,
    passthrough: bool,
    seed: u64,
}

impl StackingConfig {
    /// Create a config from the two base learner configs.
    #[must_use]
    pub fn new(forest: RandomForestConfig, boost: AdaBoostConfig) -> Self {
        Self {
            forest,
            boost,
            meta: LogisticRegressionConfig::new(),
            n_folds: 5,
            passthrough: true,
            seed: 42,
        }
    }

    /// Set the meta learner config.
    #[must_use]
    pub fn with_meta(mut self, meta: LogisticRegressionConfig) -> Self {
        self.meta = meta;
        self
    }

    /// Set the number of folds for out-of-fold base predictions.
    #[must_use]
    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    /// Append the original features to the meta learner's inputs.
    #[must_use]
    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Set the seed for the out-of-fold split.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the forest config.
    #[must_use]
    pub fn forest(&self) -> &RandomForestConfig {
        &self.forest
    }

    /// Return the boosting config.
    #[must_use]
    pub fn boost(&self) -> &AdaBoostConfig {
        &self.boost
    }

    /// Return the meta learner config.
    #[must_use]
    pub fn meta(&self) -> &LogisticRegressionConfig {
        &self.meta
    }

    /// Return the number of out-of-fold splits.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Return whether original features reach the meta learner.
    #[must_use]
    pub fn passthrough(&self) -> bool {
        self.passthrough
    }

    /// Fit the stack.
    ///
    /// 1. Split the rows into stratified folds. For each fold (in parallel),
    ///    fit both base learners on the other folds and record their class
    ///    probabilities for the held-out rows.
    /// 2. Fit the meta learner on `[forest proba, boost proba, features?]`.
    /// 3. Refit both base learners on every row.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::TooFewClasses`] | `n_classes < 2` |
    /// | [`EnsembleError::InvalidFoldCount`] | `n_folds < 2` |
    /// | Data errors | see [`RandomForestConfig::fit`] |
    /// | Learner errors | from any base or meta learner |
    #[instrument(skip_all, fields(n_samples = features.len(), n_folds = self.n_folds))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<StackingClassifier, EnsembleError> {
        if n_classes < 2 {
            return Err(EnsembleError::TooFewClasses { n_classes });
        }
        let n_features = validate_training(features, labels, n_classes)?;
        let folds = StratifiedKFold::new(self.n_folds)?
            .with_seed(self.seed)
            .split(labels, n_classes);

        let fold_outputs: Vec<Vec<(usize, Vec<f64>)>> = folds
            .par_iter()
            .enumerate()
            .map(|(fold, (train, test))| -> Result<Vec<(usize, Vec<f64>)>, EnsembleError> {
                if test.is_empty() {
                    return Ok(Vec::new());
                }
                let train_x = gather_rows(features, train);
                let train_y = gather_labels(labels, train);
                let (forest, boost) = rayon::join(
                    || self.forest.fit(&train_x, &train_y, n_classes),
                    || self.boost.fit(&train_x, &train_y, n_classes),
                );
                let (forest, boost) = (forest?, boost?);
                debug!(fold, n_train = train.len(), n_test = test.len(), "stacking fold fitted");
                test.iter()
                    .map(|&i| -> Result<(usize, Vec<f64>), EnsembleError> {
                        let mut row = forest.predict_proba(&features[i])?.into_vec();
                        row.extend(boost.predict_proba(&features[i])?.into_vec());
                        Ok((i, row))
                    })
                    .collect()
            })
            .collect::<Result<_, EnsembleError>>()?;

        let mut meta_rows = vec![Vec::new(); features.len()];
        for (i, row) in fold_outputs.into_iter().flatten() {
            meta_rows[i] = row;
        }
        if self.passthrough {
            for (row, x) in meta_rows.iter_mut().zip(features) {
                row.extend_from_slice(x);
            }
        }

        let ((forest, boost), meta) = rayon::join(
            || {
                rayon::join(
                    || self.forest.fit(features, labels, n_classes),
                    || self.boost.fit(features, labels, n_classes),
                )
            },
            || self.meta.fit(&meta_rows, labels, n_classes),
        );

        info!(n_features, n_classes, "stacked ensemble trained");

        Ok(StackingClassifier {
            forest: forest?,
            boost: boost?,
            meta: meta?,
            n_features,
            n_classes,
            passthrough: self.passthrough,
        })
    }
}

/// A fitted stacked ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingClassifier {
    forest: RandomForest,
    boost: AdaBoost,
    meta: LogisticRegression,
    n_features: usize,
    n_classes: usize,
    passthrough: bool,
}

impl StackingClassifier {
    /// Return the forest base learner.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Return the boosting base learner.
    #[must_use]
    pub fn boost(&self) -> &AdaBoost {
        &self.boost
    }

    /// Return the meta learner.
    #[must_use]
    pub fn meta(&self) -> &LogisticRegression {
        &self.meta
    }

    /// Build the meta learner's input row for one sample.
    fn meta_row(&self, sample: &[f64]) -> Result<Vec<f64>, EnsembleError> {
        let mut row = self.forest.predict_proba(sample)?.into_vec();
        row.extend(self.boost.predict_proba(sample)?.into_vec());
        if self.passthrough {
            row.extend_from_slice(sample);
        }
        Ok(row)
    }
}

impl Classifier for StackingClassifier {
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
        self.meta.predict_proba(&self.meta_row(sample)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StackingConfig {
        StackingConfig::new(
            RandomForestConfig::new(10).unwrap(),
            AdaBoostConfig::new(10).unwrap(),
        )
        .with_n_folds(3)
    }

    fn three_bands() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features: Vec<Vec<f64>> = (0..45)
            .map(|i| vec![(i / 15) as f64 * 3.0 + (i % 15) as f64 * 0.1, (i % 4) as f64])
            .collect();
        let labels = (0..45).map(|i| i / 15).collect();
        (features, labels)
    }

    #[test]
    fn learns_three_bands() {
        let (features, labels) = three_bands();
        let model = config().fit(&features, &labels, 3).unwrap();
        let predictions = model.predict_batch(&features).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        assert!(correct >= 43, "only {correct} of 45 correct");
    }

    #[test]
    fn meta_width_follows_passthrough() {
        let (features, labels) = three_bands();
        let with = config().fit(&features, &labels, 3).unwrap();
        assert_eq!(with.meta().n_features(), 3 + 3 + 2);
        let without = config()
            .with_passthrough(false)
            .fit(&features, &labels, 3)
            .unwrap();
        assert_eq!(without.meta().n_features(), 6);
    }

    #[test]
    fn deterministic() {
        let (features, labels) = three_bands();
        let a = config().fit(&features, &labels, 3).unwrap();
        let b = config().fit(&features, &labels, 3).unwrap();
        assert_eq!(
            a.predict_proba_batch(&features).unwrap(),
            b.predict_proba_batch(&features).unwrap()
        );
    }

    #[test]
    fn prediction_width_checked() {
        let (features, labels) = three_bands();
        let model = config().fit(&features, &labels, 3).unwrap();
        assert!(matches!(
            model.predict(&[1.0]),
            Err(EnsembleError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
    }
}
