//! ROC curves and area under the curve.

use serde::Serialize;

use crate::EnsembleError;

/// Points of a receiver operating characteristic curve.
///
/// Thresholds are descending; the first is `+inf` so the curve starts at
/// `(0, 0)` and ends at `(1, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// False positive rate at each threshold.
    pub fpr: Vec<f64>,
    /// True positive rate at each threshold.
    pub tpr: Vec<f64>,
    /// Score thresholds; a sample is positive when `score >= threshold`.
    pub thresholds: Vec<f64>,
}

/// Build the ROC curve of binary `positives` against `scores`.
///
/// Tied scores move the curve in a single step.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`EnsembleError::LengthMismatch`] | `scores` and `positives` differ in length |
/// | [`EnsembleError::UndefinedRoc`] | no positive or no negative samples |
pub fn roc_curve(positives: &[bool], scores: &[f64]) -> Result<RocCurve, EnsembleError> {
    if scores.len() != positives.len() {
        return Err(EnsembleError::LengthMismatch {
            n_samples: positives.len(),
            got: scores.len(),
            what: "scores",
        });
    }
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EnsembleError::UndefinedRoc {
            positives: n_pos,
            negatives: n_neg,
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut tp, mut fp) = (0usize, 0usize);
    for (rank, &i) in order.iter().enumerate() {
        if positives[i] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = order
            .get(rank + 1)
            .is_none_or(|&next| scores[next] != scores[i]);
        if last_of_tie {
            curve.fpr.push(fp as f64 / n_neg as f64);
            curve.tpr.push(tp as f64 / n_pos as f64);
            curve.thresholds.push(scores[i]);
        }
    }
    Ok(curve)
}

/// Area under a ROC curve by the trapezoidal rule.
#[must_use]
pub fn auc(curve: &RocCurve) -> f64 {
    curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
        .sum()
}

/// One-vs-rest AUC for every class.
///
/// `probas[i][k]` is the score of sample `i` for class `k`. Entry `k` of the
/// result is an error when class `k` is absent from `labels` or is the only
/// class present.
#[must_use]
pub fn one_vs_rest_auc(
    labels: &[usize],
    probas: &[Vec<f64>],
    n_classes: usize,
) -> Vec<Result<f64, EnsembleError>> {
    (0..n_classes)
        .map(|class| {
            let positives: Vec<bool> = labels.iter().map(|&l| l == class).collect();
            let scores: Vec<f64> = probas
                .iter()
                .map(|p| p.get(class).copied().unwrap_or(0.0))
                .collect();
            roc_curve(&positives, &scores).map(|curve| auc(&curve))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking() {
        let curve = roc_curve(&[false, false, true, true], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_eq!(auc(&curve), 1.0);
        assert_eq!(curve.fpr.first(), Some(&0.0));
        assert_eq!(curve.tpr.last(), Some(&1.0));
    }

    #[test]
    fn inverted_ranking() {
        let curve = roc_curve(&[true, false], &[0.1, 0.9]).unwrap();
        assert_eq!(auc(&curve), 0.0);
    }

    #[test]
    fn all_tied_scores_give_half() {
        let curve = roc_curve(&[true, false, true, false], &[0.5; 4]).unwrap();
        assert_eq!(curve.thresholds.len(), 2);
        assert!((auc(&curve) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn partial_overlap() {
        // Pairs (pos, neg): (0.35, 0.1) ok, (0.35, 0.4) wrong, (0.8, *) ok -> 3/4.
        let curve = roc_curve(&[false, false, true, true], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((auc(&curve) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_class_undefined() {
        assert!(matches!(
            roc_curve(&[true, true], &[0.2, 0.3]),
            Err(EnsembleError::UndefinedRoc { positives: 2, negatives: 0 })
        ));
    }

    #[test]
    fn one_vs_rest_reports_absent_class() {
        let labels = [0, 1, 0, 1];
        let probas = vec![
            vec![0.9, 0.1, 0.0],
            vec![0.2, 0.8, 0.0],
            vec![0.7, 0.2, 0.1],
            vec![0.3, 0.6, 0.1],
        ];
        let aucs = one_vs_rest_auc(&labels, &probas, 3);
        assert_eq!(aucs[0].as_ref().unwrap(), &1.0);
        assert_eq!(aucs[1].as_ref().unwrap(), &1.0);
        assert!(aucs[2].is_err());
    }
}
