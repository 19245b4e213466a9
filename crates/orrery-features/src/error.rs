use orrery_io::IoError;

/// Errors from feature engineering and preprocessing.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Returned when the target column is absent, was dropped for
    /// missingness, or has no labelled rows.
    #[error("target column \"{target}\" is missing or has no labelled rows")]
    MissingTarget {
        /// Name of the requested target column.
        target: String,
    },

    /// Returned when a column the fitted preprocessor expects is absent.
    #[error("column \"{column}\" required by the preprocessor is missing")]
    MissingColumn {
        /// Name of the absent column.
        column: String,
    },

    /// Returned when the missing-value threshold is outside [0.0, 1.0].
    #[error("missing threshold must be in [0.0, 1.0], got {threshold}")]
    InvalidThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when no feature columns remain after dropping.
    #[error("no feature columns left after dropping identifiers and sparse columns")]
    NoFeatures,

    /// Returned when the preprocessor is fitted on zero rows.
    #[error("cannot fit preprocessor on an empty table")]
    EmptyTable,

    /// Returned when a table operation fails.
    #[error(transparent)]
    Table(#[from] IoError),
}
