//! Confusion matrix with per-class and macro-averaged metrics.

use std::fmt;

use serde::Serialize;

use crate::EnsembleError;

/// Square count matrix; `rows[actual][predicted]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfusionMatrix {
    rows: Vec<Vec<usize>>,
}

/// Precision, recall, F1 and support for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    /// Class index.
    pub class: usize,
    /// TP / (TP + FP); 0.0 when the class was never predicted.
    pub precision: f64,
    /// TP / (TP + FN); 0.0 when the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall; 0.0 when both are zero.
    pub f1: f64,
    /// Number of samples whose true class is this one.
    pub support: usize,
}

/// Unweighted mean of the per-class metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroMetrics {
    /// Mean precision.
    pub precision: f64,
    /// Mean recall.
    pub recall: f64,
    /// Mean F1.
    pub f1: f64,
}

impl ConfusionMatrix {
    /// Count `(actual, predicted)` pairs into an `n_classes` square matrix.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::EmptyDataset`] | no labels |
    /// | [`EnsembleError::LengthMismatch`] | the two slices differ in length |
    /// | [`EnsembleError::LabelOutOfRange`] | a label is `>= n_classes` |
    pub fn from_labels(
        actual: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, EnsembleError> {
        if actual.is_empty() {
            return Err(EnsembleError::EmptyDataset);
        }
        if predicted.len() != actual.len() {
            return Err(EnsembleError::LengthMismatch {
                n_samples: actual.len(),
                got: predicted.len(),
                what: "predictions",
            });
        }
        let mut rows = vec![vec![0usize; n_classes]; n_classes];
        for (sample_index, (&a, &p)) in actual.iter().zip(predicted).enumerate() {
            let label = a.max(p);
            if label >= n_classes {
                return Err(EnsembleError::LabelOutOfRange {
                    label,
                    sample_index,
                    n_classes,
                });
            }
            rows[a][p] += 1;
        }
        Ok(Self { rows })
    }

    /// Fraction of samples on the diagonal.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes()).map(|i| self.rows[i][i]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Per-class precision, recall, F1 and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let n = self.n_classes();
        (0..n)
            .map(|c| {
                let tp = self.rows[c][c];
                let predicted: usize = (0..n).map(|i| self.rows[i][c]).sum();
                let support: usize = self.rows[c].iter().sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Macro averages over every class, including absent ones.
    #[must_use]
    pub fn macro_average(&self) -> MacroMetrics {
        let metrics = self.class_metrics();
        let n = metrics.len().max(1) as f64;
        MacroMetrics {
            precision: metrics.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: metrics.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: metrics.iter().map(|m| m.f1).sum::<f64>() / n,
        }
    }

    /// Return the matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.rows.len()
    }

    /// Return the number of counted samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rows.iter().flatten().sum()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes() {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;
        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for count in row {
                write!(f, " {count:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_errors() {
        let actual = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = [0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&actual, &predicted, 3).unwrap();
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-12);
        for m in cm.class_metrics() {
            assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
            assert_eq!(m.support, 3);
        }
        let avg = cm.macro_average();
        assert!((avg.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn row_sums_are_supports() {
        let actual = [0, 1, 1, 2, 2, 2];
        let predicted = [1, 1, 0, 2, 2, 1];
        let cm = ConfusionMatrix::from_labels(&actual, &predicted, 3).unwrap();
        let sums: Vec<usize> = cm.as_rows().iter().map(|r| r.iter().sum()).collect();
        assert_eq!(sums, vec![1, 2, 3]);
        assert_eq!(cm.total(), 6);
    }

    #[test]
    fn absent_class_pulls_macro_down() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 3).unwrap();
        let metrics = cm.class_metrics();
        assert_eq!(metrics[2].support, 0);
        assert_eq!(metrics[2].f1, 0.0);
        assert!((cm.macro_average().recall - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ConfusionMatrix::from_labels(&[], &[], 2),
            Err(EnsembleError::EmptyDataset)
        ));
        assert!(matches!(
            ConfusionMatrix::from_labels(&[0, 1], &[0], 2),
            Err(EnsembleError::LengthMismatch { .. })
        ));
        assert!(matches!(
            ConfusionMatrix::from_labels(&[0, 1], &[0, 2], 2),
            Err(EnsembleError::LabelOutOfRange { label: 2, sample_index: 1, .. })
        ));
    }

    #[test]
    fn display_and_rows() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[1, 1], 2).unwrap();
        let display = cm.to_string();
        assert!(display.contains("pred_"));
        assert_eq!(cm.as_rows(), &[vec![0, 1], vec![0, 1]]);
    }
}
