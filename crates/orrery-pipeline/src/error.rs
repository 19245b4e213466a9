use std::fmt;
use std::path::PathBuf;

use orrery_ensemble::EnsembleError;
use orrery_features::FeatureError;
use orrery_io::IoError;
use serde::Serialize;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the input table.
    Load,
    /// Dropping columns, extracting the target, deriving features.
    FeatureEngineering,
    /// Fitting or applying the column preprocessor.
    Preprocessing,
    /// Stratified train/test partitioning.
    Split,
    /// Diagnostic k-fold cross-validation.
    CrossValidation,
    /// Fitting the stacked ensemble.
    Training,
    /// Scoring the held-out partition.
    Evaluation,
    /// Saving or loading the artifact.
    Persistence,
    /// Predicting with a fitted pipeline.
    Prediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::FeatureEngineering => "feature engineering",
            Stage::Preprocessing => "preprocessing",
            Stage::Split => "split",
            Stage::CrossValidation => "cross-validation",
            Stage::Training => "training",
            Stage::Evaluation => "evaluation",
            Stage::Persistence => "persistence",
            Stage::Prediction => "prediction",
        };
        f.write_str(name)
    }
}

/// Failures while saving or loading a pipeline artifact.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Returned when bincode encoding fails.
    #[error("failed to encode artifact")]
    Encode {
        /// The underlying bincode error.
        #[source]
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when bincode decoding fails.
    #[error("failed to decode artifact")]
    Decode {
        /// The underlying bincode error.
        #[source]
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when the artifact cannot be written or moved into place.
    #[error("failed to write artifact {path}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Returned when the artifact file cannot be read.
    #[error("failed to read artifact {path}")]
    Read {
        /// Source path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Returned when the artifact was written by an incompatible format version.
    #[error("artifact format version {found} is not supported (expected {expected})")]
    IncompatibleVersion {
        /// The version this build reads.
        expected: u32,
        /// The version found in the artifact.
        found: u32,
    },

    /// Returned when a decoded artifact's parts disagree on shape.
    #[error("artifact is inconsistent: {reason}")]
    Inconsistent {
        /// Which parts disagree.
        reason: String,
    },
}

/// Errors from the end-to-end training and prediction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Returned when the input file cannot be read or parsed as a table.
    #[error("invalid input data")]
    DataFormat(#[source] IoError),

    /// Returned when the target column is absent or has no labelled rows.
    #[error("target column \"{target}\" is missing or has no labelled rows")]
    MissingTarget {
        /// Name of the requested target column.
        target: String,
    },

    /// Returned when a class is too small for the requested folds or the
    /// training partition is smaller than the fold count.
    #[error("insufficient data: {reason}")]
    InsufficientData {
        /// Which requirement failed.
        reason: String,
    },

    /// Returned when saving or loading the artifact fails.
    #[error("artifact persistence failed")]
    Persistence(#[from] PersistenceError),

    /// Returned when feature engineering or preprocessing fails.
    #[error("{stage} failed")]
    Features {
        /// Stage that raised the error.
        stage: Stage,
        /// The underlying feature error.
        #[source]
        source: FeatureError,
    },

    /// Returned when a learner or metric fails.
    #[error("{stage} failed")]
    Model {
        /// Stage that raised the error.
        stage: Stage,
        /// The underlying ensemble error.
        #[source]
        source: EnsembleError,
    },

    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when a label is not among the learned classes.
    #[error("{stage}: label \"{label}\" is not a learned class")]
    UnknownLabel {
        /// Stage that encoded the label.
        stage: Stage,
        /// The unrecognised label.
        label: String,
    },

    /// Returned when a consumer's label map disagrees with the learned ordering.
    #[error("class order mismatch: model has {learned:?}, consumer expects {expected:?}")]
    ClassOrderMismatch {
        /// Ordering stored with the model.
        learned: Vec<String>,
        /// Ordering the consumer assumed.
        expected: Vec<String>,
    },
}

impl PipelineError {
    /// Attribute a feature error to a stage, lifting target and table errors
    /// to their own variants.
    pub(crate) fn features(stage: Stage, source: FeatureError) -> Self {
        match source {
            FeatureError::MissingTarget { target } => PipelineError::MissingTarget { target },
            FeatureError::Table(io) => PipelineError::DataFormat(io),
            source => PipelineError::Features { stage, source },
        }
    }

    /// Attribute an ensemble error to a stage.
    pub(crate) fn model(stage: Stage, source: EnsembleError) -> Self {
        PipelineError::Model { stage, source }
    }

    /// Return the stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::DataFormat(_) => Stage::Load,
            PipelineError::MissingTarget { .. } => Stage::FeatureEngineering,
            PipelineError::InsufficientData { .. } => Stage::Split,
            PipelineError::Persistence(_) => Stage::Persistence,
            PipelineError::Features { stage, .. }
            | PipelineError::Model { stage, .. }
            | PipelineError::UnknownLabel { stage, .. } => *stage,
            PipelineError::InvalidConfig { .. } => Stage::Load,
            PipelineError::ClassOrderMismatch { .. } => Stage::Prediction,
        }
    }
}

impl From<IoError> for PipelineError {
    fn from(err: IoError) -> Self {
        PipelineError::DataFormat(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_lifted() {
        let err = PipelineError::features(
            Stage::FeatureEngineering,
            FeatureError::MissingTarget {
                target: "disposition".into(),
            },
        );
        assert!(matches!(err, PipelineError::MissingTarget { ref target } if target == "disposition"));
        assert_eq!(err.stage(), Stage::FeatureEngineering);
    }

    #[test]
    fn model_errors_keep_stage() {
        let err = PipelineError::model(Stage::Evaluation, EnsembleError::EmptyDataset);
        assert_eq!(err.stage(), Stage::Evaluation);
        assert_eq!(err.to_string(), "evaluation failed");
    }

    #[test]
    fn unknown_label_keeps_stage() {
        let err = PipelineError::UnknownLabel {
            stage: Stage::Evaluation,
            label: "REFUTED".into(),
        };
        assert_eq!(err.stage(), Stage::Evaluation);
        assert_eq!(err.to_string(), "evaluation: label \"REFUTED\" is not a learned class");
    }

    #[test]
    fn persistence_stage() {
        let err: PipelineError = PersistenceError::IncompatibleVersion {
            expected: 1,
            found: 9,
        }
        .into();
        assert_eq!(err.stage(), Stage::Persistence);
    }
}
