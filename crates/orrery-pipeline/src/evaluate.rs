//! Held-out evaluation: accuracy, macro metrics, confusion matrix and
//! one-vs-rest ROC AUC.

use std::collections::BTreeMap;

use orrery_ensemble::{ConfusionMatrix, one_vs_rest_auc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cv::CvSummary;
use crate::error::Stage;
use crate::trainer::HeldOut;
use crate::{PipelineError, TrainedPipeline};

/// Metrics for one class of the held-out partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
    /// Class label.
    pub label: String,
    /// Precision for this class.
    pub precision: f64,
    /// Recall for this class.
    pub recall: f64,
    /// F1 for this class.
    pub f1_score: f64,
    /// Held-out rows of this class.
    pub support: usize,
}

/// A class left out of the AUC map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AucOmission {
    /// Class label.
    pub class: String,
    /// Why the AUC is undefined.
    pub reason: String,
}

/// Held-out evaluation results, serialised as the evaluation JSON.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Macro-averaged precision.
    pub precision: f64,
    /// Macro-averaged recall.
    pub recall: f64,
    /// Macro-averaged F1.
    pub f1_score: f64,
    /// `confusion_matrix[actual][predicted]`, ordered by `classes`.
    pub confusion_matrix: ConfusionMatrix,
    /// One-vs-rest ROC AUC per class label; undefined classes are absent.
    pub auc: BTreeMap<String, f64>,
    /// Learned class ordering.
    pub classes: Vec<String>,
    /// Per-class metrics in class order.
    pub per_class: Vec<ClassReport>,
    /// Classes whose AUC could not be computed.
    pub auc_omissions: Vec<AucOmission>,
    /// Number of held-out rows.
    pub n_test: usize,
    /// Diagnostic cross-validation, when available.
    pub cv: Option<CvSummary>,
    /// Predicted label per held-out row.
    #[serde(skip_serializing)]
    pub predictions: Vec<String>,
}

impl EvaluationReport {
    /// Return `true` when any class is missing from the AUC map.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.auc_omissions.is_empty()
    }
}

/// Scores a trained pipeline on its held-out partition.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    suppress_warnings: bool,
}

impl Evaluator {
    /// Create an evaluator that warns on omitted AUCs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log omitted AUCs at debug instead of warn.
    #[must_use]
    pub fn with_suppress_warnings(mut self, suppress_warnings: bool) -> Self {
        self.suppress_warnings = suppress_warnings;
        self
    }

    /// Predict the held-out rows and compute every metric.
    ///
    /// Undefined per-class AUCs are recorded in
    /// [`EvaluationReport::auc_omissions`] rather than failing.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PipelineError::UnknownLabel`] | a held-out label is not a learned class |
    /// | [`PipelineError::Features`] | preprocessing the held-out rows failed |
    /// | [`PipelineError::Model`] | prediction or the confusion matrix failed |
    #[instrument(skip_all, fields(n_test = held_out.len()))]
    pub fn evaluate(
        &self,
        pipeline: &TrainedPipeline,
        held_out: &HeldOut,
    ) -> Result<EvaluationReport, PipelineError> {
        let classes = pipeline.classes();
        let n_classes = classes.len();
        let actual = classes.encode(&held_out.labels, Stage::Evaluation)?;

        let distributions = pipeline.predict_proba(&held_out.features)?;
        let predicted: Vec<usize> = distributions.iter().map(|d| d.predicted_class()).collect();
        let probas: Vec<Vec<f64>> = distributions.into_iter().map(|d| d.into_vec()).collect();

        let confusion = ConfusionMatrix::from_labels(&actual, &predicted, n_classes)
            .map_err(|e| PipelineError::model(Stage::Evaluation, e))?;
        let macro_avg = confusion.macro_average();
        let per_class = confusion
            .class_metrics()
            .into_iter()
            .map(|m| ClassReport {
                label: pipeline.label_of(m.class),
                precision: m.precision,
                recall: m.recall,
                f1_score: m.f1,
                support: m.support,
            })
            .collect();

        let mut auc = BTreeMap::new();
        let mut auc_omissions = Vec::new();
        for (class, result) in one_vs_rest_auc(&actual, &probas, n_classes).into_iter().enumerate() {
            let label = pipeline.label_of(class);
            match result {
                Ok(value) => {
                    auc.insert(label, value);
                }
                Err(err) => {
                    if self.suppress_warnings {
                        debug!(class = %label, reason = %err, "auc omitted");
                    } else {
                        warn!(class = %label, reason = %err, "auc omitted");
                    }
                    auc_omissions.push(AucOmission {
                        class: label,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let report = EvaluationReport {
            accuracy: confusion.accuracy(),
            precision: macro_avg.precision,
            recall: macro_avg.recall,
            f1_score: macro_avg.f1,
            confusion_matrix: confusion,
            auc,
            classes: classes.labels().to_vec(),
            per_class,
            auc_omissions,
            n_test: held_out.len(),
            cv: None,
            predictions: predicted.iter().map(|&c| pipeline.label_of(c)).collect(),
        };
        info!(
            accuracy = report.accuracy,
            f1_score = report.f1_score,
            degraded = report.is_degraded(),
            "evaluation complete"
        );
        Ok(report)
    }
}

/// Evaluate with warnings enabled.
///
/// # Errors
///
/// See [`Evaluator::evaluate`].
pub fn evaluate(
    pipeline: &TrainedPipeline,
    held_out: &HeldOut,
) -> Result<EvaluationReport, PipelineError> {
    Evaluator::new().evaluate(pipeline, held_out)
}
