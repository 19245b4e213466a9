use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::EnsembleError;
use crate::node::{Node, NodeIndex};
use crate::split::{SplitContext, SplitCriterion};
use crate::validate::{to_columns, validate_training, validate_weights};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth (root is depth 0). `None` grows until
    /// leaves are pure or too small to split.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the number of features considered per split. `None` means all.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for feature sampling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the number of features considered per split, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a tree with uniform sample weights.
    ///
    /// # Errors
    ///
    /// See [`DecisionTreeConfig::fit_weighted`].
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<DecisionTree, EnsembleError> {
        self.fit_weighted(features, labels, &vec![1.0; features.len()], n_classes)
    }

    /// Train a tree on row-major `features` with per-sample weights.
    ///
    /// `labels` must be in `0..n_classes`; leaves always carry `n_classes`
    /// probabilities even if some classes are absent from the training rows.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`EnsembleError::EmptyDataset`] | `features` is empty |
    /// | [`EnsembleError::ZeroFeatures`] | rows have zero columns |
    /// | [`EnsembleError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`EnsembleError::NonFiniteValue`] | any value is NaN or infinite |
    /// | [`EnsembleError::LengthMismatch`] | labels or weights differ in count from rows |
    /// | [`EnsembleError::LabelOutOfRange`] | a label is `>= n_classes` |
    /// | [`EnsembleError::InvalidSampleWeights`] | negative, non-finite, or all-zero weights |
    /// | [`EnsembleError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`EnsembleError::InvalidMinSamplesSplit`] | `min_samples_split` < 2 |
    /// | [`EnsembleError::InvalidMinSamplesLeaf`] | `min_samples_leaf` < 1 |
    /// | [`EnsembleError::InvalidMaxFeatures`] | `max_features` outside [1, n_features] |
    #[instrument(skip_all, fields(n_samples = features.len(), n_classes = n_classes))]
    pub fn fit_weighted(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        weights: &[f64],
        n_classes: usize,
    ) -> Result<DecisionTree, EnsembleError> {
        let n_features = validate_training(features, labels, n_classes)?;
        validate_weights(weights, features.len())?;
        let max_features = self.validate(n_features)?;

        let columns = to_columns(features, n_features);
        let indices: Vec<usize> = (0..features.len()).collect();
        Ok(self.grow(&columns, labels, weights, &indices, n_classes, max_features))
    }

    /// Check the config against the data width and resolve `max_features`.
    pub(crate) fn validate(&self, n_features: usize) -> Result<usize, EnsembleError> {
        if self.max_depth == Some(0) {
            return Err(EnsembleError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(EnsembleError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(EnsembleError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(EnsembleError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(max_features)
    }

    /// Grow a tree over `sample_indices` of pre-validated column-major data.
    pub(crate) fn grow(
        &self,
        columns: &[Vec<f64>],
        labels: &[usize],
        weights: &[f64],
        sample_indices: &[usize],
        n_classes: usize,
        max_features: usize,
    ) -> DecisionTree {
        let ctx = SplitContext {
            columns,
            labels,
            weights,
            n_classes,
            criterion: self.criterion,
            max_features,
            min_samples_leaf: self.min_samples_leaf,
        };
        let mut builder = Builder {
            ctx,
            config: self,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: Vec::new(),
        };
        builder.build(sample_indices, 0);

        debug!(n_nodes = builder.arena.len(), "decision tree built");

        DecisionTree {
            nodes: builder.arena,
            n_features: columns.len(),
            n_classes,
        }
    }
}

struct Builder<'a> {
    ctx: SplitContext<'a>,
    config: &'a DecisionTreeConfig,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl Builder<'_> {
    /// Build the subtree for `sample_indices` and return its arena index.
    fn build(&mut self, sample_indices: &[usize], depth: usize) -> NodeIndex {
        let class_weights = self.ctx.class_weights(sample_indices);
        let weight: f64 = class_weights.iter().sum();
        let impurity = self.ctx.criterion.impurity(&class_weights, weight);

        let stop = impurity.is_pure()
            || sample_indices.len() < self.config.min_samples_split
            || self.config.max_depth.is_some_and(|d| depth >= d);
        let split = if stop {
            None
        } else {
            self.ctx.find_best_split(sample_indices, &mut self.rng)
        };

        let Some(split) = split else {
            let prediction = class_weights
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
                .map_or(0, |(idx, _)| idx);
            let distribution = if weight > 0.0 {
                class_weights.iter().map(|w| w / weight).collect()
            } else {
                vec![1.0 / self.ctx.n_classes as f64; self.ctx.n_classes]
            };
            self.arena.push(Node::Leaf {
                prediction,
                distribution,
                impurity,
                weight,
            });
            return NodeIndex::new(self.arena.len() - 1);
        };

        // Reserve this node's slot so children get later indices.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            prediction: 0,
            distribution: Vec::new(),
            impurity,
            weight,
        });
        let left = self.build(&split.left_indices, depth + 1);
        let right = self.build(&split.right_indices, depth + 1);
        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            weight,
        };
        NodeIndex::new(node_idx)
    }
}

/// A fitted CART decision tree stored as a node arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

impl DecisionTree {
    /// Predict the class of a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, EnsembleError> {
        match self.leaf(sample)? {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("traversal always ends at a leaf"),
        }
    }

    /// Return the leaf class distribution for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`EnsembleError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], EnsembleError> {
        match self.leaf(sample)? {
            Node::Leaf { distribution, .. } => Ok(distribution),
            Node::Split { .. } => unreachable!("traversal always ends at a leaf"),
        }
    }

    /// Return the nodes in arena order; the root is first.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of features the tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth; a single root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    fn leaf(&self, sample: &[f64]) -> Result<&Node, EnsembleError> {
        if sample.len() != self.n_features {
            return Err(EnsembleError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                leaf @ Node::Leaf { .. } => return Ok(leaf),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0], vec![3.0], vec![5.0]];
        let tree = DecisionTreeConfig::new().fit(&features, &[1, 1, 1], 3).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict(&[2.0]).unwrap(), 1);
        assert_eq!(tree.predict_proba(&[2.0]).unwrap(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn linearly_separable() {
        let (features, labels) = two_blobs();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn xor_needs_depth_two() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let labels = [0, 1, 1, 0];
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert!(tree.depth() >= 2);
        for (x, &y) in features.iter().zip(&labels) {
            assert_eq!(tree.predict(x).unwrap(), y);
        }
    }

    #[test]
    fn stump_respects_max_depth() {
        let features = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&features, &[0, 1, 2, 0], 3)
            .unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn weighted_leaf_distribution() {
        let features = vec![vec![0.0], vec![0.0], vec![0.0]];
        let tree = DecisionTreeConfig::new()
            .fit_weighted(&features, &[0, 1, 1], &[2.0, 1.0, 1.0], 2)
            .unwrap();
        // Constant feature: one leaf with weights 2 vs 2.
        assert_eq!(tree.predict_proba(&[0.0]).unwrap(), &[0.5, 0.5]);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels) = two_blobs();
        let a = DecisionTreeConfig::new()
            .with_max_features(Some(1))
            .with_seed(7)
            .fit(&features, &labels, 2)
            .unwrap();
        let b = DecisionTreeConfig::new()
            .with_max_features(Some(1))
            .with_seed(7)
            .fit(&features, &labels, 2)
            .unwrap();
        for x in &features {
            assert_eq!(a.predict(x).unwrap(), b.predict(x).unwrap());
        }
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, labels) = two_blobs();
        let tree = DecisionTreeConfig::new().fit(&features, &labels, 2).unwrap();
        assert!(matches!(
            tree.predict(&[1.0]),
            Err(EnsembleError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let (features, labels) = two_blobs();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&features, &labels, 2)
            .unwrap_err();
        assert!(matches!(err, EnsembleError::InvalidMaxDepth { .. }));

        let err = DecisionTreeConfig::new()
            .with_max_features(Some(3))
            .fit(&features, &labels, 2)
            .unwrap_err();
        assert!(matches!(err, EnsembleError::InvalidMaxFeatures { .. }));
    }
}
