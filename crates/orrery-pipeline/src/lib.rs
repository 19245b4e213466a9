//! End-to-end exoplanet disposition classifier.
//!
//! [`run`] loads a table, engineers features, trains a stacked ensemble on a
//! stratified training partition, evaluates it on the held-out rows and
//! optionally saves the [`TrainedPipeline`] as a bincode artifact.

mod artifact;
mod config;
mod cv;
mod error;
mod evaluate;
mod labels;
mod model;
mod split;
mod trainer;

use std::path::{Path, PathBuf};

use orrery_features::DroppedColumn;
use orrery_io::TableReader;
use tracing::{info, instrument};

pub use artifact::FORMAT_VERSION;
pub use config::PipelineConfig;
pub use cv::{CvSummary, cross_validate};
pub use error::{PersistenceError, PipelineError, Stage};
pub use evaluate::{AucOmission, ClassReport, EvaluationReport, Evaluator, evaluate};
pub use labels::{ClassLabels, DISPOSITION_LABELS};
pub use model::TrainedPipeline;
pub use split::{SplitIndices, stratified_split};
pub use trainer::{HeldOut, Trainer, TrainingOutcome};

/// Everything produced by [`run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The fitted pipeline.
    pub pipeline: TrainedPipeline,
    /// Held-out evaluation, with the cross-validation summary attached.
    pub report: EvaluationReport,
    /// The held-out partition.
    pub held_out: HeldOut,
    /// Where the artifact was saved, if anywhere.
    pub artifact_path: Option<PathBuf>,
    /// Columns removed during feature engineering.
    pub dropped: Vec<DroppedColumn>,
    /// Names of the derived feature columns.
    pub engineered: Vec<String>,
}

/// Load, engineer, train, evaluate and optionally persist.
///
/// # Errors
///
/// Any [`PipelineError`]; [`PipelineError::stage`] names the failing step.
#[instrument(skip_all, fields(data = %data_path.display(), target = config.target()))]
pub fn run(config: &PipelineConfig, data_path: &Path) -> Result<RunOutcome, PipelineError> {
    config.validate()?;

    let table = TableReader::new(data_path).read()?;
    info!(n_rows = table.n_rows(), n_columns = table.n_columns(), "table loaded");

    let data = config
        .feature_engineer()
        .engineer(table, config.target())
        .map_err(|e| PipelineError::features(Stage::FeatureEngineering, e))?;

    let outcome = Trainer::new(config.clone()).train(data)?;
    let mut report = Evaluator::new()
        .with_suppress_warnings(config.suppress_warnings())
        .evaluate(&outcome.pipeline, &outcome.held_out)?;
    report.cv = Some(outcome.cv);

    let artifact_path = match config.artifact_path() {
        Some(path) => {
            outcome.pipeline.save(path)?;
            Some(path.to_path_buf())
        }
        None => None,
    };

    Ok(RunOutcome {
        pipeline: outcome.pipeline,
        report,
        held_out: outcome.held_out,
        artifact_path,
        dropped: outcome.dropped,
        engineered: outcome.engineered,
    })
}
