use std::path::{Path, PathBuf};

use orrery_ensemble::{AdaBoostConfig, LogisticRegressionConfig, RandomForestConfig, StackingConfig};
use orrery_features::FeatureEngineer;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Run configuration. Stored in the artifact envelope.
///
/// # Defaults
///
/// | Parameter           | Default         |
/// |---------------------|-----------------|
/// | `target`            | `"disposition"` |
/// | `suppress_warnings` | `false`         |
/// | `random_seed`       | 42              |
/// | `cv_folds`          | 5               |
/// | `test_fraction`     | 0.2             |
/// | `artifact_path`     | `None`          |
/// | `n_trees`           | 100             |
/// | `n_estimators`      | 100             |
/// | `meta_max_iter`     | 500             |
/// | `stack_folds`       | 5               |
/// | `missing_threshold` | 0.95            |
/// | `reference_year`    | 2025            |
/// | `fill_value`        | `"Unknown"`     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    target: String,
    suppress_warnings: bool,
    random_seed: u64,
    cv_folds: usize,
    test_fraction: f64,
    artifact_path: Option<PathBuf>,
    n_trees: usize,
    n_estimators: usize,
    meta_max_iter: usize,
    stack_folds: usize,
    missing_threshold: f64,
    reference_year: i32,
    fill_value: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: "disposition".to_string(),
            suppress_warnings: false,
            random_seed: 42,
            cv_folds: 5,
            test_fraction: 0.2,
            artifact_path: None,
            n_trees: 100,
            n_estimators: 100,
            meta_max_iter: 500,
            stack_folds: 5,
            missing_threshold: 0.95,
            reference_year: 2025,
            fill_value: orrery_features::DEFAULT_FILL_VALUE.to_string(),
        }
    }

    /// Set the target column name.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Downgrade convergence and degraded-metric warnings to debug events.
    #[must_use]
    pub fn with_suppress_warnings(mut self, suppress_warnings: bool) -> Self {
        self.suppress_warnings = suppress_warnings;
        self
    }

    /// Set the master seed for splitting and every learner.
    #[must_use]
    pub fn with_random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    /// Set the number of diagnostic cross-validation folds.
    #[must_use]
    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    /// Set the held-out fraction.
    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set where [`crate::run`] saves the artifact.
    #[must_use]
    pub fn with_artifact_path(mut self, artifact_path: Option<PathBuf>) -> Self {
        self.artifact_path = artifact_path;
        self
    }

    /// Set the number of random forest trees.
    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    /// Set the number of boosting rounds.
    #[must_use]
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the meta learner's iteration cap.
    #[must_use]
    pub fn with_meta_max_iter(mut self, meta_max_iter: usize) -> Self {
        self.meta_max_iter = meta_max_iter;
        self
    }

    /// Set the number of folds for out-of-fold stacking inputs.
    #[must_use]
    pub fn with_stack_folds(mut self, stack_folds: usize) -> Self {
        self.stack_folds = stack_folds;
        self
    }

    /// Set the missing fraction above which a column is dropped.
    #[must_use]
    pub fn with_missing_threshold(mut self, missing_threshold: f64) -> Self {
        self.missing_threshold = missing_threshold;
        self
    }

    /// Set the year `discovery_age` counts from.
    #[must_use]
    pub fn with_reference_year(mut self, reference_year: i32) -> Self {
        self.reference_year = reference_year;
        self
    }

    /// Set the categorical fill value.
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: impl Into<String>) -> Self {
        self.fill_value = fill_value.into();
        self
    }

    /// Return the target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Return whether warnings are downgraded.
    #[must_use]
    pub fn suppress_warnings(&self) -> bool {
        self.suppress_warnings
    }

    /// Return the master seed.
    #[must_use]
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Return the diagnostic fold count.
    #[must_use]
    pub fn cv_folds(&self) -> usize {
        self.cv_folds
    }

    /// Return the held-out fraction.
    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Return the artifact destination, if set.
    #[must_use]
    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// Return the categorical fill value.
    #[must_use]
    pub fn fill_value(&self) -> &str {
        &self.fill_value
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |field: &'static str, reason: String| {
            Err(PipelineError::InvalidConfig { field, reason })
        };
        if self.target.is_empty() {
            return invalid("target", "must not be empty".into());
        }
        if self.cv_folds < 2 {
            return invalid("cv_folds", format!("must be at least 2, got {}", self.cv_folds));
        }
        if self.stack_folds < 2 {
            return invalid("stack_folds", format!("must be at least 2, got {}", self.stack_folds));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return invalid("test_fraction", format!("must be in (0, 1), got {}", self.test_fraction));
        }
        if self.n_trees == 0 {
            return invalid("n_trees", "must be at least 1".into());
        }
        if self.n_estimators == 0 {
            return invalid("n_estimators", "must be at least 1".into());
        }
        if self.meta_max_iter == 0 {
            return invalid("meta_max_iter", "must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            return invalid(
                "missing_threshold",
                format!("must be in [0, 1], got {}", self.missing_threshold),
            );
        }
        Ok(())
    }

    /// Build the feature engineer for these settings.
    #[must_use]
    pub fn feature_engineer(&self) -> FeatureEngineer {
        FeatureEngineer::new()
            .with_missing_threshold(self.missing_threshold)
            .with_reference_year(self.reference_year)
    }

    /// Build the stacked ensemble config, seeding every learner from
    /// `random_seed`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for zero ensemble sizes.
    pub fn stacking(&self) -> Result<StackingConfig, PipelineError> {
        let forest = RandomForestConfig::new(self.n_trees)
            .map_err(|e| PipelineError::InvalidConfig {
                field: "n_trees",
                reason: e.to_string(),
            })?
            .with_seed(self.random_seed);
        let boost = AdaBoostConfig::new(self.n_estimators)
            .map_err(|e| PipelineError::InvalidConfig {
                field: "n_estimators",
                reason: e.to_string(),
            })?
            .with_seed(self.random_seed);
        let meta = LogisticRegressionConfig::new()
            .with_max_iter(self.meta_max_iter)
            .with_suppress_warnings(self.suppress_warnings);
        Ok(StackingConfig::new(forest, boost)
            .with_meta(meta)
            .with_n_folds(self.stack_folds)
            .with_seed(self.random_seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PipelineConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.target(), "disposition");
        assert_eq!(config.cv_folds(), 5);
    }

    #[test]
    fn bad_fraction_names_field() {
        let err = PipelineConfig::new().with_test_fraction(1.0).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { field: "test_fraction", .. }));
    }

    #[test]
    fn single_fold_rejected() {
        let err = PipelineConfig::new().with_cv_folds(1).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { field: "cv_folds", .. }));
    }

    #[test]
    fn stacking_carries_sizes() {
        let stack = PipelineConfig::new()
            .with_n_trees(7)
            .with_n_estimators(3)
            .with_meta_max_iter(50)
            .stacking()
            .unwrap();
        assert_eq!(stack.forest().n_trees(), 7);
        assert_eq!(stack.boost().n_estimators(), 3);
        assert_eq!(stack.meta().max_iter(), 50);
        assert!(stack.passthrough());
    }
}
