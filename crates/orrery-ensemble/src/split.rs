use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its per-class weights.
    ///
    /// Returns zero when `total` is zero.
    #[must_use]
    pub fn impurity(&self, class_weights: &[f64], total: f64) -> Impurity {
        if total <= 0.0 {
            return Impurity::new(0.0);
        }
        let value = match self {
            SplitCriterion::Gini => {
                1.0 - class_weights
                    .iter()
                    .map(|&w| {
                        let p = w / total;
                        p * p
                    })
                    .sum::<f64>()
            }
            SplitCriterion::Entropy => -class_weights
                .iter()
                .filter(|&&w| w > 0.0)
                .map(|&w| {
                    let p = w / total;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        // Rounding can leave a pure node at -1e-17.
        Impurity::new(value.max(0.0))
    }
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Inputs shared by every split search in one tree.
pub(crate) struct SplitContext<'a> {
    /// Column-major features: `columns[feature][sample]`.
    pub(crate) columns: &'a [Vec<f64>],
    pub(crate) labels: &'a [usize],
    pub(crate) weights: &'a [f64],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl SplitContext<'_> {
    /// Per-class weight totals over `sample_indices`.
    pub(crate) fn class_weights(&self, sample_indices: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &si in sample_indices {
            totals[self.labels[si]] += self.weights[si];
        }
        totals
    }

    /// Find the best split among a random subset of `max_features` features.
    ///
    /// For each candidate feature, sorts the samples by value and scans
    /// left to right with incremental class-weight updates, scoring each
    /// boundary by weighted impurity decrease. Sample indices may repeat
    /// (bootstrap draws); each occurrence counts once.
    ///
    /// Returns `None` when every candidate feature is constant over the node
    /// or every boundary violates `min_samples_leaf`.
    pub(crate) fn find_best_split(
        &self,
        sample_indices: &[usize],
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_features = self.columns.len();
        let n_samples = sample_indices.len();
        if n_samples < 2 || n_features == 0 {
            return None;
        }

        let parent_weights = self.class_weights(sample_indices);
        let total: f64 = parent_weights.iter().sum();
        let parent_impurity = self.criterion.impurity(&parent_weights, total).value();

        // Partial Fisher-Yates: only the first `take` positions are shuffled.
        let mut feature_order: Vec<usize> = (0..n_features).collect();
        let take = self.max_features.min(n_features);
        for i in 0..take {
            let j = rng.gen_range(i..n_features);
            feature_order.swap(i, j);
        }

        let mut best_decrease = f64::NEG_INFINITY;
        let mut best: Option<(FeatureIndex, f64)> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

        for &feat in &feature_order[..take] {
            let column = &self.columns[feat];
            sorted.clear();
            sorted.extend(sample_indices.iter().map(|&si| (column[si], si)));
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 == sorted[n_samples - 1].0 {
                continue;
            }

            let mut left = vec![0.0; self.n_classes];
            let mut right = parent_weights.clone();
            let mut left_total = 0.0;

            for i in 0..n_samples - 1 {
                let (value, si) = sorted[i];
                let w = self.weights[si];
                left[self.labels[si]] += w;
                right[self.labels[si]] -= w;
                left_total += w;

                let next = sorted[i + 1].0;
                if value == next {
                    continue;
                }
                let n_left = i + 1;
                if n_left < self.min_samples_leaf || n_samples - n_left < self.min_samples_leaf {
                    continue;
                }

                let right_total = total - left_total;
                let decrease = total * parent_impurity
                    - left_total * self.criterion.impurity(&left, left_total).value()
                    - right_total * self.criterion.impurity(&right, right_total).value();

                if decrease > best_decrease {
                    best_decrease = decrease;
                    best = Some((FeatureIndex::new(feat), value + (next - value) / 2.0));
                }
            }
        }

        let (feature, threshold) = best?;
        let column = &self.columns[feature.index()];
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
            .iter()
            .partition(|&&si| column[si] <= threshold);

        Some(SplitResult {
            feature,
            threshold,
            left_indices,
            right_indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn context<'a>(
        columns: &'a [Vec<f64>],
        labels: &'a [usize],
        weights: &'a [f64],
        min_samples_leaf: usize,
    ) -> SplitContext<'a> {
        SplitContext {
            columns,
            labels,
            weights,
            n_classes: 2,
            criterion: SplitCriterion::Gini,
            max_features: columns.len(),
            min_samples_leaf,
        }
    }

    #[test]
    fn gini_three_class_uniform() {
        let imp = SplitCriterion::Gini.impurity(&[1.0, 1.0, 1.0], 3.0);
        assert!((imp.value() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn entropy_binary_balanced() {
        let imp = SplitCriterion::Entropy.impurity(&[0.5, 0.5], 1.0);
        assert!((imp.value() - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn pure_node_has_zero_impurity() {
        assert!(SplitCriterion::Gini.impurity(&[0.0, 2.5], 2.5).is_pure());
    }

    #[test]
    fn separable_feature_is_chosen() {
        let columns = vec![vec![0.0, 0.0, 1.0, 1.0], vec![1.0, 2.0, 10.0, 11.0]];
        let labels = [0, 0, 1, 1];
        let weights = [1.0; 4];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let split = context(&columns, &labels, &weights, 1)
            .find_best_split(&[0, 1, 2, 3], &mut rng)
            .expect("split exists");
        assert_eq!(split.left_indices, vec![0, 1]);
        assert_eq!(split.right_indices, vec![2, 3]);
    }

    #[test]
    fn weights_move_the_boundary() {
        // Unweighted, thresholds 0.5 and 2.5 tie and the first wins.
        let columns = vec![vec![0.0, 1.0, 2.0, 3.0]];
        let labels = [1, 0, 0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let uniform = [1.0; 4];
        let split = context(&columns, &labels, &uniform, 1)
            .find_best_split(&[0, 1, 2, 3], &mut rng)
            .unwrap();
        assert!((split.threshold - 0.5).abs() < 1e-12);

        let heavy_last = [1.0, 1.0, 1.0, 10.0];
        let split = context(&columns, &labels, &heavy_last, 1)
            .find_best_split(&[0, 1, 2, 3], &mut rng)
            .unwrap();
        assert!((split.threshold - 2.5).abs() < 1e-12);
    }

    #[test]
    fn constant_feature_returns_none() {
        let columns = vec![vec![5.0; 4]];
        let labels = [0, 1, 0, 1];
        let weights = [1.0; 4];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(
            context(&columns, &labels, &weights, 1)
                .find_best_split(&[0, 1, 2, 3], &mut rng)
                .is_none()
        );
    }

    #[test]
    fn min_samples_leaf_enforced() {
        let columns = vec![vec![1.0, 10.0]];
        let labels = [0, 1];
        let weights = [1.0; 2];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(
            context(&columns, &labels, &weights, 2)
                .find_best_split(&[0, 1], &mut rng)
                .is_none()
        );
    }

    #[test]
    fn repeated_indices_count_twice() {
        let columns = vec![vec![0.0, 1.0]];
        let labels = [0, 1];
        let weights = [1.0; 2];
        let ctx = context(&columns, &labels, &weights, 1);
        assert_eq!(ctx.class_weights(&[0, 0, 1]), vec![2.0, 1.0]);
    }
}
