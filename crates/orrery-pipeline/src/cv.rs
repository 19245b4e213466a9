//! Diagnostic stratified k-fold cross-validation of the full pipeline.

use orrery_ensemble::{Classifier, ConfusionMatrix, StratifiedKFold};
use orrery_features::{ColumnRoles, Preprocessor};
use orrery_io::Table;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::Stage;
use crate::{PipelineConfig, PipelineError};

/// Results of diagnostic cross-validation on the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    /// Number of folds.
    pub n_folds: usize,
    /// Accuracy for each fold, in fold order.
    pub fold_accuracies: Vec<f64>,
    /// Mean accuracy across folds.
    pub mean_accuracy: f64,
    /// Population standard deviation of fold accuracies.
    pub std_accuracy: f64,
}

impl CvSummary {
    fn from_accuracies(fold_accuracies: Vec<f64>) -> Self {
        let n_folds = fold_accuracies.len();
        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / n_folds as f64;
        let variance = fold_accuracies
            .iter()
            .map(|&a| (a - mean_accuracy).powi(2))
            .sum::<f64>()
            / n_folds as f64;
        Self {
            n_folds,
            fold_accuracies,
            mean_accuracy,
            std_accuracy: variance.sqrt(),
        }
    }
}

/// Cross-validate preprocessing plus the stacked ensemble.
///
/// The preprocessor is refit inside every fold so no statistics leak from
/// the held-out fold. Folds run in parallel; fold `f` seeds its learners
/// with `random_seed + f`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`PipelineError::InvalidConfig`] | `cv_folds` < 2 |
/// | [`PipelineError::Features`] | preprocessing failed in a fold |
/// | [`PipelineError::Model`] | a fold's ensemble failed to fit |
#[instrument(skip_all, fields(n_folds = config.cv_folds(), n_samples = labels.len()))]
pub fn cross_validate(
    table: &Table,
    labels: &[usize],
    n_classes: usize,
    roles: &ColumnRoles,
    config: &PipelineConfig,
) -> Result<CvSummary, PipelineError> {
    let folds = StratifiedKFold::new(config.cv_folds())
        .map_err(|e| PipelineError::InvalidConfig {
            field: "cv_folds",
            reason: e.to_string(),
        })?
        .with_seed(config.random_seed())
        .split(labels, n_classes);

    let fold_accuracies = folds
        .par_iter()
        .enumerate()
        .map(|(fold, (train, test))| -> Result<f64, PipelineError> {
            let train_table = table.take_rows(train);
            let test_table = table.take_rows(test);
            let train_labels: Vec<usize> = train.iter().map(|&i| labels[i]).collect();
            let test_labels: Vec<usize> = test.iter().map(|&i| labels[i]).collect();

            let preprocessor = Preprocessor::new(roles.clone())
                .with_fill_value(config.fill_value())
                .fit(&train_table)
                .map_err(|e| PipelineError::features(Stage::CrossValidation, e))?;
            let x_train = preprocessor
                .transform(&train_table)
                .map_err(|e| PipelineError::features(Stage::CrossValidation, e))?;
            let x_test = preprocessor
                .transform(&test_table)
                .map_err(|e| PipelineError::features(Stage::CrossValidation, e))?;

            let fold_config = config
                .clone()
                .with_random_seed(config.random_seed().wrapping_add(fold as u64));
            let model = fold_config
                .stacking()?
                .fit(&x_train, &train_labels, n_classes)
                .map_err(|e| PipelineError::model(Stage::CrossValidation, e))?;
            let predicted = model
                .predict_batch(&x_test)
                .map_err(|e| PipelineError::model(Stage::CrossValidation, e))?;

            let accuracy = ConfusionMatrix::from_labels(&test_labels, &predicted, n_classes)
                .map_err(|e| PipelineError::model(Stage::CrossValidation, e))?
                .accuracy();
            debug!(fold, n_train = train.len(), n_test = test.len(), accuracy, "fold completed");
            Ok(accuracy)
        })
        .collect::<Result<Vec<f64>, PipelineError>>()?;

    for (fold, accuracy) in fold_accuracies.iter().enumerate() {
        info!(fold, accuracy, "cv fold accuracy");
    }
    let summary = CvSummary::from_accuracies(fold_accuracies);
    info!(
        mean_accuracy = summary.mean_accuracy,
        std_accuracy = summary.std_accuracy,
        "cross-validation complete"
    );
    Ok(summary)
}
