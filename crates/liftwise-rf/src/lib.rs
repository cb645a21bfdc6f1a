//! Decision tree and random forest classification: train, evaluate, predict.
//!
//! Hand-rolled CART trees with Gini/Entropy criteria and an rpart-style
//! complexity stop, a bagged random forest trained in parallel via rayon,
//! stratified holdout and k-fold evaluation, out-of-bag scoring, feature
//! importance, and versioned model serialization.

mod config;
mod confusion;
mod data;
mod error;
mod eval;
mod fit;
mod forest;
mod holdout;
mod importance;
mod model;
mod node;
mod oob;
mod predict;
mod score;
mod serialize;
mod split;
mod tree;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::RfError;
pub use eval::{CrossValidation, CrossValidationResult};
pub use fit::ForestFit;
pub use forest::RandomForest;
pub use holdout::{HoldoutSplit, Partition};
pub use importance::RankedFeature;
pub use model::{FittedModel, ModelKind, ModelSpec};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use predict::ClassDistribution;
pub use score::{HoldoutScore, score, select_best};
pub use serialize::SavedModel;
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
