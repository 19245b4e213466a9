use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::PipelineError;
use crate::error::Stage;

/// Index-to-label map assumed by the disposition serving endpoint.
pub const DISPOSITION_LABELS: [&str; 3] = ["FALSE POSITIVE", "CANDIDATE", "CONFIRMED"];

/// Learned class ordering: the sorted distinct target labels.
///
/// Class index `i` in every probability vector and confusion matrix row is
/// `labels()[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    /// Learn the ordering from observed labels.
    #[must_use]
    pub fn from_observed(observed: &[String]) -> Self {
        let labels: BTreeSet<&String> = observed.iter().collect();
        Self {
            labels: labels.into_iter().cloned().collect(),
        }
    }

    /// Return the labels in class-index order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Return `true` when no class was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Return the class index of a label.
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|known| known.as_str().cmp(label))
            .ok()
    }

    /// Map labels to class indices.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownLabel`], attributed to `stage`, for the
    /// first label that is not a learned class.
    pub fn encode(&self, labels: &[String], stage: Stage) -> Result<Vec<usize>, PipelineError> {
        labels
            .iter()
            .map(|label| {
                self.index_of(label).ok_or_else(|| PipelineError::UnknownLabel {
                    stage,
                    label: label.clone(),
                })
            })
            .collect()
    }

    /// Return the label of a class index.
    #[must_use]
    pub fn decode(&self, class: usize) -> Option<&str> {
        self.labels.get(class).map(String::as_str)
    }

    /// Check a consumer's positional label map against the learned ordering.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ClassOrderMismatch`] unless `expected` lists
    /// exactly the learned labels in the same order.
    pub fn verify_order(&self, expected: &[&str]) -> Result<(), PipelineError> {
        if self.labels.iter().map(String::as_str).eq(expected.iter().copied()) {
            Ok(())
        } else {
            Err(PipelineError::ClassOrderMismatch {
                learned: self.labels.clone(),
                expected: expected.iter().map(|s| (*s).to_string()).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed() -> Vec<String> {
        ["CONFIRMED", "FALSE POSITIVE", "CANDIDATE", "CONFIRMED"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    #[test]
    fn sorted_and_deduplicated() {
        let classes = ClassLabels::from_observed(&observed());
        assert_eq!(classes.labels(), &["CANDIDATE", "CONFIRMED", "FALSE POSITIVE"]);
        assert_eq!(classes.encode(&observed(), Stage::Training).unwrap(), vec![1, 2, 0, 1]);
        assert_eq!(classes.decode(2), Some("FALSE POSITIVE"));
        assert_eq!(classes.decode(3), None);
    }

    #[test]
    fn unknown_label_rejected() {
        let classes = ClassLabels::from_observed(&observed());
        assert!(matches!(
            classes.encode(&["REFUTED".to_string()], Stage::Evaluation),
            Err(PipelineError::UnknownLabel {
                stage: Stage::Evaluation,
                ..
            })
        ));
    }

    #[test]
    fn serving_map_disagrees_with_sorted_order() {
        let classes = ClassLabels::from_observed(&observed());
        assert!(matches!(
            classes.verify_order(&DISPOSITION_LABELS),
            Err(PipelineError::ClassOrderMismatch { .. })
        ));
        assert!(classes.verify_order(&["CANDIDATE", "CONFIRMED", "FALSE POSITIVE"]).is_ok());
    }
}
