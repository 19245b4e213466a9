//! Pipeline serialization via bincode.

use std::path::{Path, PathBuf};

use orrery_ensemble::{Classifier, StackingClassifier};
use orrery_features::{DerivedFeature, FittedPreprocessor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::PersistenceError;
use crate::{ClassLabels, PipelineConfig, PipelineError, TrainedPipeline};

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for a serialized pipeline.
///
/// `format_version` must stay the first field: it is decoded on its own
/// before the rest of the envelope.
#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    classes: ClassLabels,
    input_columns: Vec<String>,
    config: PipelineConfig,
    derivations: Vec<DerivedFeature>,
    preprocessor: FittedPreprocessor,
    ensemble: StackingClassifier,
}

impl TrainedPipeline {
    /// Encode the pipeline into a versioned byte blob.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Encode`] if bincode encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        let envelope = ArtifactEnvelope {
            format_version: FORMAT_VERSION,
            classes: self.classes.clone(),
            input_columns: self.input_columns(),
            config: self.config.clone(),
            derivations: self.derivations.clone(),
            preprocessor: self.preprocessor.clone(),
            ensemble: self.ensemble.clone(),
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|source| PersistenceError::Encode { source })?;
        Ok(bytes)
    }

    /// Decode a pipeline written by [`TrainedPipeline::to_bytes`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PersistenceError::IncompatibleVersion`] | format version mismatch |
    /// | [`PersistenceError::Decode`] | truncated or corrupt bytes |
    /// | [`PersistenceError::Inconsistent`] | parts disagree on shape |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        let found: u32 =
            bincode::deserialize(bytes).map_err(|source| PersistenceError::Decode { source })?;
        if found != FORMAT_VERSION {
            return Err(PersistenceError::IncompatibleVersion {
                expected: FORMAT_VERSION,
                found,
            }
            .into());
        }

        let envelope: ArtifactEnvelope =
            bincode::deserialize(bytes).map_err(|source| PersistenceError::Decode { source })?;

        check_consistency(&envelope)?;

        debug!(
            n_classes = envelope.classes.len(),
            n_input_columns = envelope.input_columns.len(),
            "artifact decoded"
        );

        Ok(TrainedPipeline {
            config: envelope.config,
            derivations: envelope.derivations,
            preprocessor: envelope.preprocessor,
            ensemble: envelope.ensemble,
            classes: envelope.classes,
        })
    }

    /// Save the pipeline to `path`.
    ///
    /// Bytes go to a sibling temporary file first and are renamed into
    /// place, so `path` never holds a partial artifact.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PersistenceError::Encode`] | bincode encoding failed |
    /// | [`PersistenceError::Write`] | file write or rename failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let tmp = temp_sibling(path);

        let write_err = |source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, &bytes).map_err(write_err)?;
        if let Err(source) = std::fs::rename(&tmp, path) {
            // Best effort: the rename error is the one worth reporting.
            let _ = std::fs::remove_file(&tmp);
            return Err(write_err(source).into());
        }

        info!(size_bytes = bytes.len(), n_classes = self.classes.len(), "artifact saved");
        Ok(())
    }

    /// Load a pipeline saved by [`TrainedPipeline::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PersistenceError::Read`] | file read failed |
    /// | Decode errors | see [`TrainedPipeline::from_bytes`] |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| PersistenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let pipeline = Self::from_bytes(&bytes)?;
        info!(size_bytes = bytes.len(), "artifact loaded");
        Ok(pipeline)
    }
}

/// Reject envelopes whose parts were not fitted together.
fn check_consistency(envelope: &ArtifactEnvelope) -> Result<(), PersistenceError> {
    if envelope.classes.len() != envelope.ensemble.n_classes() {
        return Err(PersistenceError::Inconsistent {
            reason: format!(
                "{} class labels for a {}-class ensemble",
                envelope.classes.len(),
                envelope.ensemble.n_classes()
            ),
        });
    }
    if envelope.preprocessor.n_features_out() != envelope.ensemble.n_features() {
        return Err(PersistenceError::Inconsistent {
            reason: format!(
                "preprocessor emits {} features, ensemble expects {}",
                envelope.preprocessor.n_features_out(),
                envelope.ensemble.n_features()
            ),
        });
    }
    let expected: Vec<&str> = envelope.preprocessor.roles().columns().collect();
    if !envelope.input_columns.iter().map(String::as_str).eq(expected.iter().copied()) {
        return Err(PersistenceError::Inconsistent {
            reason: format!(
                "input columns {:?} differ from preprocessor columns {:?}",
                envelope.input_columns, expected
            ),
        });
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_sits_next_to_target() {
        let tmp = temp_sibling(Path::new("/data/out/k2_model.bin"));
        assert_eq!(tmp, Path::new("/data/out/k2_model.bin.tmp"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = TrainedPipeline::from_bytes(&[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Persistence(PersistenceError::Decode { .. })
        ));
    }

    fn fitted_pipeline() -> TrainedPipeline {
        use std::fmt::Write as _;

        let mut csv = String::from("pl_name,disposition,pl_rade,disc_locale\n");
        for i in 0..30 {
            let (label, radius) = if i % 2 == 0 { ("CONFIRMED", 1.0) } else { ("FALSE POSITIVE", 9.0) };
            let locale = if i % 3 == 0 { "Ground" } else { "Space" };
            writeln!(csv, "P-{i},{label},{},{locale}", radius + (i % 5) as f64 * 0.1).unwrap();
        }
        let table = orrery_io::TableReader::in_memory().parse(csv.as_bytes()).unwrap();
        let config = PipelineConfig::new()
            .with_n_trees(5)
            .with_n_estimators(5)
            .with_meta_max_iter(100)
            .with_cv_folds(3)
            .with_stack_folds(3)
            .with_suppress_warnings(true);
        let data = config.feature_engineer().engineer(table, "disposition").unwrap();
        crate::Trainer::new(config).train(data).unwrap().pipeline
    }

    fn envelope_of(pipeline: &TrainedPipeline) -> ArtifactEnvelope {
        bincode::deserialize(&pipeline.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn matching_parts_are_consistent() {
        let pipeline = fitted_pipeline();
        assert!(check_consistency(&envelope_of(&pipeline)).is_ok());
        let loaded = TrainedPipeline::from_bytes(&pipeline.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.input_columns(), pipeline.input_columns());
    }

    #[test]
    fn edited_input_columns_never_load() {
        let mut envelope = envelope_of(&fitted_pipeline());
        envelope.input_columns.reverse();
        envelope.input_columns.push("koi_score".into());
        let bytes = bincode::serialize(&envelope).unwrap();

        let err = TrainedPipeline::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Persistence(PersistenceError::Inconsistent { ref reason })
                if reason.contains("koi_score")
        ));
    }

    #[test]
    fn mislabelled_classes_never_load() {
        let mut envelope = envelope_of(&fitted_pipeline());
        envelope.classes = ClassLabels::from_observed(&["CANDIDATE".to_string()]);
        let bytes = bincode::serialize(&envelope).unwrap();

        let err = TrainedPipeline::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Persistence(PersistenceError::Inconsistent { .. })
        ));
    }

    #[test]
    fn future_version_rejected() {
        let bytes = bincode::serialize(&(FORMAT_VERSION + 1)).unwrap();
        let err = TrainedPipeline::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Persistence(PersistenceError::IncompatibleVersion { found: 2, .. })
        ));
    }
}
