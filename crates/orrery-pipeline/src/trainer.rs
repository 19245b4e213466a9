//! Stratified split, diagnostic cross-validation and the final fit.

use orrery_features::{ColumnRoles, DroppedColumn, EngineeredData, Preprocessor};
use orrery_io::Table;
use tracing::{info, instrument};

use crate::cv::{CvSummary, cross_validate};
use crate::error::Stage;
use crate::split::stratified_split;
use crate::{ClassLabels, PipelineConfig, PipelineError, TrainedPipeline};

/// Held-out partition kept raw so evaluation goes through the same
/// derivation and preprocessing path as prediction.
#[derive(Debug, Clone)]
pub struct HeldOut {
    /// Feature table rows not seen in training.
    pub features: Table,
    /// Their target labels.
    pub labels: Vec<String>,
}

impl HeldOut {
    /// Number of held-out rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Return `true` when no rows were held out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Everything produced by [`Trainer::train`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The fitted pipeline.
    pub pipeline: TrainedPipeline,
    /// The held-out partition for evaluation.
    pub held_out: HeldOut,
    /// Diagnostic cross-validation on the training partition.
    pub cv: CvSummary,
    /// Columns removed during feature engineering.
    pub dropped: Vec<DroppedColumn>,
    /// Names of the derived feature columns.
    pub engineered: Vec<String>,
}

/// Fits the stacked ensemble pipeline from engineered data.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: PipelineConfig,
}

impl Trainer {
    /// Create a trainer for `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Return the trainer's config.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Split, cross-validate, and fit the final pipeline.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::InvalidConfig`] | a config field is out of range |
    /// | [`PipelineError::InsufficientData`] | fewer than two classes, a class smaller than `cv_folds`, or a training partition smaller than `cv_folds` |
    /// | [`PipelineError::Features`] | preprocessing failed |
    /// | [`PipelineError::Model`] | an ensemble member failed to fit |
    #[instrument(skip_all, fields(n_rows = data.target.len(), cv_folds = self.config.cv_folds()))]
    pub fn train(&self, data: EngineeredData) -> Result<TrainingOutcome, PipelineError> {
        let config = &self.config;
        config.validate()?;

        let classes = ClassLabels::from_observed(&data.target);
        if classes.len() < 2 {
            return Err(PipelineError::InsufficientData {
                reason: format!("need at least 2 classes, found {}", classes.len()),
            });
        }
        let labels = classes.encode(&data.target, Stage::Training)?;
        let n_classes = classes.len();

        let mut counts = vec![0usize; n_classes];
        for &label in &labels {
            counts[label] += 1;
        }
        for (class, &count) in counts.iter().enumerate() {
            if count < config.cv_folds() {
                return Err(PipelineError::InsufficientData {
                    reason: format!(
                        "class \"{}\" has {count} rows, fewer than {} folds",
                        classes.labels()[class],
                        config.cv_folds()
                    ),
                });
            }
        }
        info!(classes = ?classes.labels(), counts = ?counts, "class distribution");

        let split = stratified_split(&labels, n_classes, config.test_fraction(), config.random_seed())?;
        if split.train.len() < config.cv_folds() {
            return Err(PipelineError::InsufficientData {
                reason: format!(
                    "training partition has {} rows, fewer than {} folds",
                    split.train.len(),
                    config.cv_folds()
                ),
            });
        }
        info!(n_train = split.train.len(), n_test = split.test.len(), "stratified split");

        let train_table = data.features.take_rows(&split.train);
        let train_labels: Vec<usize> = split.train.iter().map(|&i| labels[i]).collect();
        let held_out = HeldOut {
            features: data.features.take_rows(&split.test),
            labels: split.test.iter().map(|&i| data.target[i].clone()).collect(),
        };

        let roles = ColumnRoles::infer(&data.features);
        info!(
            n_numeric = roles.numeric().len(),
            n_categorical = roles.categorical().len(),
            "column roles"
        );

        let cv = cross_validate(&train_table, &train_labels, n_classes, &roles, config)?;

        let preprocessor = Preprocessor::new(roles)
            .with_fill_value(config.fill_value())
            .fit(&train_table)
            .map_err(|e| PipelineError::features(Stage::Preprocessing, e))?;
        let x_train = preprocessor
            .transform(&train_table)
            .map_err(|e| PipelineError::features(Stage::Preprocessing, e))?;
        let ensemble = config
            .stacking()?
            .fit(&x_train, &train_labels, n_classes)
            .map_err(|e| PipelineError::model(Stage::Training, e))?;
        info!(
            n_features = preprocessor.n_features_out(),
            dropped = ?data.dropped.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            engineered = ?data.engineered,
            "final pipeline fitted"
        );

        Ok(TrainingOutcome {
            pipeline: TrainedPipeline {
                config: config.clone(),
                derivations: data.derivations,
                preprocessor,
                ensemble,
                classes,
            },
            held_out,
            cv,
            dropped: data.dropped,
            engineered: data.engineered,
        })
    }
}
