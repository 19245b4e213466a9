//! Classifiers for tabular data: CART trees, random forests, SAMME boosting,
//! multinomial logistic regression and a stacked ensemble of the three.
//!
//! All learners take row-major `&[Vec<f64>]` features with integer labels in
//! `0..n_classes`, are deterministic for a given seed, and implement
//! [`Classifier`] once fitted. [`ConfusionMatrix`] and [`one_vs_rest_auc`]
//! score their predictions.

mod boost;
mod confusion;
mod error;
mod folds;
mod forest;
mod logistic;
mod node;
mod predict;
mod roc;
mod split;
mod stacking;
mod tree;
mod validate;

pub use boost::{AdaBoost, AdaBoostConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix, MacroMetrics};
pub use error::EnsembleError;
pub use folds::StratifiedKFold;
pub use forest::{MaxFeatures, RandomForest, RandomForestConfig};
pub use logistic::{LogisticRegression, LogisticRegressionConfig};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use predict::{ClassDistribution, Classifier};
pub use roc::{RocCurve, auc, one_vs_rest_auc, roc_curve};
pub use split::SplitCriterion;
pub use stacking::{StackingClassifier, StackingConfig};
pub use tree::{DecisionTree, DecisionTreeConfig};
