use crate::EnsembleError;

/// Check a row-major training set and return its feature count.
///
/// Rejects empty input, zero-width rows, ragged rows, non-finite values,
/// label/sample count mismatches and labels outside `0..n_classes`.
pub(crate) fn validate_training(
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
) -> Result<usize, EnsembleError> {
    let Some(first) = features.first() else {
        return Err(EnsembleError::EmptyDataset);
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(EnsembleError::ZeroFeatures);
    }
    if labels.len() != features.len() {
        return Err(EnsembleError::LengthMismatch {
            n_samples: features.len(),
            got: labels.len(),
            what: "labels",
        });
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(EnsembleError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(EnsembleError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|&(_, &l)| l >= n_classes) {
        return Err(EnsembleError::LabelOutOfRange {
            label,
            sample_index,
            n_classes,
        });
    }

    Ok(n_features)
}

/// Check per-sample weights against the sample count.
pub(crate) fn validate_weights(weights: &[f64], n_samples: usize) -> Result<(), EnsembleError> {
    if weights.len() != n_samples {
        return Err(EnsembleError::LengthMismatch {
            n_samples,
            got: weights.len(),
            what: "weights",
        });
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().all(|w| *w == 0.0) {
        return Err(EnsembleError::InvalidSampleWeights);
    }
    Ok(())
}

/// Transpose row-major samples into column-major feature columns.
pub(crate) fn to_columns(features: &[Vec<f64>], n_features: usize) -> Vec<Vec<f64>> {
    (0..n_features)
        .map(|j| features.iter().map(|row| row[j]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed() {
        let x = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(validate_training(&x, &[0, 1], 2).unwrap(), 2);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            validate_training(&[], &[], 2),
            Err(EnsembleError::EmptyDataset)
        ));
    }

    #[test]
    fn rejects_label_out_of_range() {
        let x = vec![vec![1.0], vec![2.0]];
        assert!(matches!(
            validate_training(&x, &[0, 3], 3),
            Err(EnsembleError::LabelOutOfRange { label: 3, sample_index: 1, .. })
        ));
    }

    #[test]
    fn rejects_nan() {
        let x = vec![vec![1.0, f64::NAN]];
        assert!(matches!(
            validate_training(&x, &[0], 1),
            Err(EnsembleError::NonFiniteValue { sample_index: 0, feature_index: 1 })
        ));
    }

    #[test]
    fn rejects_zero_weights() {
        assert!(matches!(
            validate_weights(&[0.0, 0.0], 2),
            Err(EnsembleError::InvalidSampleWeights)
        ));
        assert!(validate_weights(&[0.5, 0.0], 2).is_ok());
    }

    #[test]
    fn transposes() {
        let x = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert_eq!(to_columns(&x, 2), vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
    }
}
