use orrery_ensemble::{ClassDistribution, Classifier, StackingClassifier};
use orrery_features::{DerivedFeature, FittedPreprocessor, derive_features};
use orrery_io::Table;
use tracing::{debug, instrument};

use crate::error::Stage;
use crate::{ClassLabels, PipelineConfig, PipelineError};

/// Derivations, fitted preprocessor, fitted stack and class ordering as one
/// immutable unit. This is what an artifact stores.
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) derivations: Vec<DerivedFeature>,
    pub(crate) preprocessor: FittedPreprocessor,
    pub(crate) ensemble: StackingClassifier,
    pub(crate) classes: ClassLabels,
}

impl TrainedPipeline {
    /// Return the learned class ordering.
    #[must_use]
    pub fn classes(&self) -> &ClassLabels {
        &self.classes
    }

    /// Return the config the pipeline was trained with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Return the derivations replayed before preprocessing.
    #[must_use]
    pub fn derivations(&self) -> &[DerivedFeature] {
        &self.derivations
    }

    /// Return the fitted preprocessor.
    #[must_use]
    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    /// Return the fitted stacked ensemble.
    #[must_use]
    pub fn ensemble(&self) -> &StackingClassifier {
        &self.ensemble
    }

    /// Names of the feature columns a prediction table must supply after
    /// derivation, numeric first.
    #[must_use]
    pub fn input_columns(&self) -> Vec<String> {
        self.preprocessor.roles().columns().map(str::to_string).collect()
    }

    /// Re-derive features and transform a raw table into model inputs.
    ///
    /// Extra columns (identifiers, the target) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Features`] when a required column is absent.
    pub fn prepare(&self, table: &Table) -> Result<Vec<Vec<f64>>, PipelineError> {
        let mut table = table.clone();
        let applied = derive_features(&mut table, &self.derivations)
            .map_err(|e| PipelineError::features(Stage::Prediction, e))?;
        if applied.len() < self.derivations.len() {
            debug!(
                expected = self.derivations.len(),
                applied = applied.len(),
                "some derivations lack prerequisites"
            );
        }
        self.preprocessor
            .transform(&table)
            .map_err(|e| PipelineError::features(Stage::Prediction, e))
    }

    /// Class probabilities for every row of a raw table.
    ///
    /// # Errors
    ///
    /// See [`TrainedPipeline::prepare`]; model errors map to
    /// [`PipelineError::Model`].
    #[instrument(skip_all, fields(n_rows = table.n_rows()))]
    pub fn predict_proba(&self, table: &Table) -> Result<Vec<ClassDistribution>, PipelineError> {
        let inputs = self.prepare(table)?;
        self.ensemble
            .predict_proba_batch(&inputs)
            .map_err(|e| PipelineError::model(Stage::Prediction, e))
    }

    /// Predicted labels for every row of a raw table.
    ///
    /// # Errors
    ///
    /// See [`TrainedPipeline::predict_proba`].
    pub fn predict(&self, table: &Table) -> Result<Vec<String>, PipelineError> {
        Ok(self
            .predict_proba(table)?
            .iter()
            .map(|d| self.label_of(d.predicted_class()))
            .collect())
    }

    pub(crate) fn label_of(&self, class: usize) -> String {
        self.classes.decode(class).unwrap_or_default().to_string()
    }
}
