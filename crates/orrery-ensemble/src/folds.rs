//! Stratified k-fold assignment.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::EnsembleError;

/// Stratified k-fold splitter.
///
/// Construct via [`StratifiedKFold::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    n_folds: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// Create a splitter with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, EnsembleError> {
        if n_folds < 2 {
            return Err(EnsembleError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for within-class shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Assign every sample to a fold in `0..n_folds`.
    ///
    /// Samples are grouped by class and shuffled within each class, then
    /// dealt round-robin. The deal continues across classes so fold sizes
    /// differ by at most one. A class with fewer samples than folds is
    /// logged and leaves some folds without it.
    ///
    /// Labels must be below `n_classes`.
    #[must_use]
    pub fn assign(&self, labels: &[usize], n_classes: usize) -> Vec<usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; n_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        let mut fold_assignments = vec![0usize; labels.len()];
        let mut offset = 0;
        for (class, indices) in class_indices.iter_mut().enumerate() {
            if !indices.is_empty() && indices.len() < self.n_folds {
                warn!(
                    class,
                    count = indices.len(),
                    n_folds = self.n_folds,
                    "class has fewer samples than folds"
                );
            }
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                fold_assignments[idx] = (offset + j) % self.n_folds;
            }
            offset += indices.len();
        }

        fold_assignments
    }

    /// Return `(train, test)` index lists for each fold, in fold order.
    #[must_use]
    pub fn split(&self, labels: &[usize], n_classes: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let assignments = self.assign(labels, n_classes);
        (0..self.n_folds)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| assignments[i] == fold);
                (train, test)
            })
            .collect()
    }
}

/// Gather the rows of `features` named by `indices`.
pub(crate) fn gather_rows(features: &[Vec<f64>], indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().map(|&i| features[i].clone()).collect()
}

/// Gather the labels named by `indices`.
pub(crate) fn gather_labels(labels: &[usize], indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|&i| labels[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fold_sees_every_class() {
        let labels: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let folds = StratifiedKFold::new(5).unwrap().split(&labels, 3);
        assert_eq!(folds.len(), 5);
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 30);
            for class in 0..3 {
                assert_eq!(test.iter().filter(|&&i| labels[i] == class).count(), 2);
            }
        }
    }

    #[test]
    fn fold_sizes_balanced_across_classes() {
        // Each class alone would put its remainder in fold 0.
        let labels = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let assignments = StratifiedKFold::new(2).unwrap().assign(&labels, 3);
        let in_zero = assignments.iter().filter(|&&f| f == 0).count();
        assert!(in_zero == 4 || in_zero == 5);
    }

    #[test]
    fn test_sets_partition_samples() {
        let labels = vec![0, 1, 0, 1, 1, 0, 2, 2, 2, 2];
        let folds = StratifiedKFold::new(3).unwrap().with_seed(7).split(&labels, 3);
        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn deterministic_with_seed() {
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let a = StratifiedKFold::new(4).unwrap().with_seed(3).assign(&labels, 2);
        let b = StratifiedKFold::new(4).unwrap().with_seed(3).assign(&labels, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_fold_count() {
        assert!(StratifiedKFold::new(0).is_err());
        assert!(StratifiedKFold::new(1).is_err());
    }
}
