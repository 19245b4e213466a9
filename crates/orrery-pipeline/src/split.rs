//! Stratified train/test partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::PipelineError;

/// Row indices of the two partitions, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    /// Training rows.
    pub train: Vec<usize>,
    /// Held-out rows.
    pub test: Vec<usize>,
}

/// Partition rows so each class keeps its share of the test set.
///
/// The test set has `ceil(test_fraction * n)` rows. Each class receives
/// the floor of its proportional share; leftover rows go to the classes
/// with the largest fractional remainders (larger class first on ties,
/// then lower class index). No class gives up its last training row.
/// Rows are drawn at random within each class.
///
/// # Errors
///
/// Returns [`PipelineError::InsufficientData`] when the test set would be
/// empty or could not be filled without emptying a class from training.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<SplitIndices, PipelineError> {
    let n = labels.len();
    // Guard against 0.2 * 15 landing a hair above 3.
    let n_test = (test_fraction * n as f64 - 1e-9).ceil().max(0.0) as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::InsufficientData {
            reason: format!("test fraction {test_fraction} of {n} rows leaves an empty partition"),
        });
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }

    let ideal: Vec<f64> = by_class
        .iter()
        .map(|rows| n_test as f64 * rows.len() as f64 / n as f64)
        .collect();
    let caps: Vec<usize> = by_class.iter().map(|rows| rows.len().saturating_sub(1)).collect();
    let mut alloc: Vec<usize> = ideal
        .iter()
        .zip(&caps)
        .map(|(x, &cap)| (x.floor() as usize).min(cap))
        .collect();

    let mut order: Vec<usize> = (0..n_classes).collect();
    order.sort_by(|&a, &b| {
        let ra = ideal[a] - alloc[a] as f64;
        let rb = ideal[b] - alloc[b] as f64;
        rb.total_cmp(&ra)
            .then(by_class[b].len().cmp(&by_class[a].len()))
            .then(a.cmp(&b))
    });
    let mut remaining = n_test - alloc.iter().sum::<usize>();
    while remaining > 0 {
        let before = remaining;
        for &class in &order {
            if remaining == 0 {
                break;
            }
            if alloc[class] < caps[class] {
                alloc[class] += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            return Err(PipelineError::InsufficientData {
                reason: format!("cannot draw {n_test} test rows while keeping every class in training"),
            });
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (rows, &k) in by_class.iter_mut().zip(&alloc) {
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..k]);
        train.extend_from_slice(&rows[k..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    debug!(n_train = train.len(), n_test = test.len(), per_class = ?alloc, "stratified split");
    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(indices: &[usize], labels: &[usize], class: usize) -> usize {
        indices.iter().filter(|&&i| labels[i] == class).count()
    }

    #[test]
    fn ten_rows_five_three_two() {
        let labels = vec![0, 0, 0, 0, 0, 1, 1, 1, 2, 2];
        let split = stratified_split(&labels, 3, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(count(&split.test, &labels, 0), 1);
        assert_eq!(count(&split.test, &labels, 1), 1);
        for class in 0..3 {
            assert!(count(&split.train, &labels, class) >= 1);
        }
    }

    #[test]
    fn proportions_within_one_row() {
        let labels: Vec<usize> = (0..97)
            .map(|i| usize::from(i % 3 != 0) + usize::from(i % 7 == 0))
            .collect();
        let split = stratified_split(&labels, 3, 0.25, 1).unwrap();
        assert_eq!(split.test.len(), 25);
        for class in 0..3 {
            let total = labels.iter().filter(|&&l| l == class).count();
            let expected = 25.0 * total as f64 / 97.0;
            let got = count(&split.test, &labels, class) as f64;
            assert!((got - expected).abs() <= 1.0, "class {class}: {got} vs {expected}");
        }
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let labels: Vec<usize> = (0..40).map(|i| i % 4).collect();
        let split = stratified_split(&labels, 4, 0.3, 9).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn seed_changes_rows_not_counts() {
        let labels: Vec<usize> = (0..50).map(|i| i % 2).collect();
        let a = stratified_split(&labels, 2, 0.2, 1).unwrap();
        let b = stratified_split(&labels, 2, 0.2, 2).unwrap();
        assert_eq!(a.test.len(), b.test.len());
        assert_eq!(a, stratified_split(&labels, 2, 0.2, 1).unwrap());
    }

    #[test]
    fn singleton_classes_cannot_fill_test() {
        let labels = vec![0, 1, 2];
        assert!(matches!(
            stratified_split(&labels, 3, 0.5, 0),
            Err(PipelineError::InsufficientData { .. })
        ));
    }
}
