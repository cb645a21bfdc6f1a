//! Single CART classification tree: growth rules, fitting, prediction, and a
//! text rendering of the fitted rules.

use std::fmt::Write as _;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    data::{self, argmax},
    node::{Node, NodeIndex},
    split::{SplitCriterion, SplitSearch},
};

/// Growth rules of one tree.
///
/// | Rule                | `new()` | `rpart_defaults()` |
/// |---------------------|---------|--------------------|
/// | `criterion`         | Gini    | Gini               |
/// | `max_depth`         | none    | 30                 |
/// | `min_samples_split` | 2       | 20                 |
/// | `min_samples_leaf`  | 1       | 7                  |
/// | `complexity`        | 0.0     | 0.01               |
///
/// Both consider every predictor at each split, infer the class count from
/// the labels, and seed with 42.
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) complexity: f64,
    pub(crate) n_classes: Option<usize>,
    pub(crate) seed: u64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            complexity: 0.0,
            n_classes: None,
            seed: 42,
        }
    }
}

impl DecisionTreeConfig {
    /// Grow until leaves are pure or cannot be split.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stopping rules of R's `rpart`: `minsplit = 20`,
    /// `minbucket = 7`, `maxdepth = 30`, `cp = 0.01`.
    #[must_use]
    pub fn rpart_defaults() -> Self {
        Self {
            max_depth: Some(30),
            min_samples_split: 20,
            min_samples_leaf: 7,
            complexity: 0.01,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Deepest level a split may sit on (the root is level 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Nodes with fewer rows become leaves.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Smallest child a split may produce.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Predictors drawn per split; `None` tries them all.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Complexity parameter `cp`. A split survives only if its weighted
    /// impurity decrease reaches `cp` times the root's weighted impurity.
    #[must_use]
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity;
        self
    }

    /// Fix the class count instead of inferring `max(label) + 1`. Leaves
    /// then cover classes absent from the training rows.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: Option<usize>) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Seed of the per-split predictor draw.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    #[must_use]
    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fit on row-major `features` with zero-based `labels`.
    ///
    /// # Errors
    ///
    /// Input shape errors ([`RfError::EmptyDataset`], [`RfError::ZeroFeatures`],
    /// [`RfError::LabelCountMismatch`], [`RfError::FeatureCountMismatch`],
    /// [`RfError::NonFiniteValue`], [`RfError::LabelOutOfRange`]) and
    /// out-of-range growth rules ([`RfError::InvalidMaxDepth`],
    /// [`RfError::InvalidMinSamplesSplit`], [`RfError::InvalidMinSamplesLeaf`],
    /// [`RfError::InvalidComplexity`], [`RfError::InvalidMaxFeatures`]).
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, RfError> {
        let shape = data::validate(features, labels, self.n_classes)?;
        let max_features = self.check(shape.n_features)?;

        let columns: Vec<Vec<f64>> = (0..shape.n_features)
            .map(|f| features.iter().map(|row| row[f]).collect())
            .collect();
        let search = SplitSearch {
            n_classes: shape.n_classes,
            criterion: self.criterion,
            max_features,
            min_samples_leaf: self.min_samples_leaf,
        };
        let nodes = self.grow(&columns, labels, search);
        debug!(
            n_nodes = nodes.len(),
            n_classes = shape.n_classes,
            max_features,
            "decision tree grown"
        );

        Ok(DecisionTree {
            nodes,
            n_features: shape.n_features,
            n_classes: shape.n_classes,
        })
    }

    /// Validate the growth rules; yields the per-split predictor count.
    fn check(&self, n_features: usize) -> Result<usize, RfError> {
        if let Some(0) = self.max_depth {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: 0,
            });
        }
        if !(self.complexity >= 0.0 && self.complexity.is_finite()) {
            return Err(RfError::InvalidComplexity {
                complexity: self.complexity,
            });
        }
        match self.max_features.unwrap_or(n_features) {
            m if (1..=n_features).contains(&m) => Ok(m),
            m => Err(RfError::InvalidMaxFeatures {
                max_features: m,
                n_features,
            }),
        }
    }

    /// Depth-first growth over an explicit worklist. Nodes land in the arena
    /// in pre-order, so the root is slot 0 and a left subtree precedes its
    /// right sibling.
    fn grow(&self, columns: &[Vec<f64>], labels: &[usize], search: SplitSearch) -> Vec<Node> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut nodes: Vec<Node> = Vec::new();
        let mut pending = vec![Pending {
            rows: (0..labels.len()).collect(),
            depth: 0,
            parent: None,
        }];
        let mut min_decrease = 0.0;

        while let Some(Pending { rows, depth, parent }) = pending.pop() {
            let slot = nodes.len();
            if let Some((parent, side)) = parent {
                attach(&mut nodes[parent], side, NodeIndex::new(slot));
            }

            let mut class_counts = vec![0usize; search.n_classes];
            for &row in &rows {
                class_counts[labels[row]] += 1;
            }
            let impurity = self.criterion.impurity(&class_counts, rows.len());
            if depth == 0 {
                min_decrease = self.complexity * rows.len() as f64 * impurity.value();
            }

            let splittable = rows.len() >= self.min_samples_split
                && !impurity.is_pure()
                && self.max_depth.is_none_or(|limit| depth < limit);
            let split = splittable
                .then(|| search.best_split(columns, labels, &rows, &mut rng))
                .flatten()
                .filter(|s| s.impurity_decrease >= min_decrease);

            let Some(split) = split else {
                nodes.push(Node::Leaf {
                    prediction: argmax(&class_counts),
                    class_counts,
                    impurity,
                });
                continue;
            };

            nodes.push(Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                // Patched when the children are placed.
                left: NodeIndex::new(slot),
                right: NodeIndex::new(slot),
                impurity,
                n_samples: rows.len(),
                impurity_decrease: split.impurity_decrease,
            });
            pending.push(Pending {
                rows: split.right_indices,
                depth: depth + 1,
                parent: Some((slot, Side::Right)),
            });
            pending.push(Pending {
                rows: split.left_indices,
                depth: depth + 1,
                parent: Some((slot, Side::Left)),
            });
        }
        nodes
    }
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// A node still to be placed.
struct Pending {
    rows: Vec<usize>,
    depth: usize,
    parent: Option<(usize, Side)>,
}

fn attach(parent: &mut Node, side: Side, child: NodeIndex) {
    if let Node::Split { left, right, .. } = parent {
        match side {
            Side::Left => *left = child,
            Side::Right => *right = child,
        }
    }
}

/// A fitted tree: a pre-order node arena rooted at slot 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Majority class of the leaf `sample` falls into.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a row of the wrong width.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        self.leaf_for(sample).map(|(prediction, _)| prediction)
    }

    /// Class frequencies of the leaf `sample` falls into, `n_classes` long.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a row of the wrong width.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, RfError> {
        let (_, counts) = self.leaf_for(sample)?;
        let total = counts.iter().sum::<usize>().max(1) as f64;
        Ok(counts.iter().map(|&c| c as f64 / total).collect())
    }

    /// Mean decrease in impurity per predictor, summing to 1.0 (all zeros
    /// for a single-leaf tree).
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for t in &mut totals {
                *t /= sum;
            }
        }
        totals
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Longest root-to-leaf path in edges.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.walk().map(|(_, depth)| depth).max().unwrap_or(0)
    }

    /// Pre-order `(slot, depth)` of every node.
    fn walk(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut stack = vec![(0usize, 0usize)];
        std::iter::from_fn(move || {
            let (slot, depth) = stack.pop()?;
            if let Some(Node::Split { left, right, .. }) = self.nodes.get(slot) {
                stack.push((right.index(), depth + 1));
                stack.push((left.index(), depth + 1));
            }
            Some((slot, depth))
        })
    }

    /// Indented `rpart`-style rules, one node per line. Leaves end in `*`
    /// and show their class counts; subtrees below `max_depth` collapse to
    /// `...`. Missing names fall back to `x{i}` and the class index.
    #[must_use]
    pub fn render_rules(
        &self,
        feature_names: &[String],
        class_names: &[String],
        max_depth: usize,
    ) -> String {
        let feature = |i: usize| feature_names.get(i).cloned().unwrap_or_else(|| format!("x{i}"));
        let class = |i: usize| class_names.get(i).cloned().unwrap_or_else(|| i.to_string());

        let mut out = String::new();
        let mut stack = vec![(0usize, 0usize, String::from("root"))];
        while let Some((slot, depth, condition)) = stack.pop() {
            let indent = "  ".repeat(depth);
            match &self.nodes[slot] {
                Node::Leaf {
                    prediction,
                    class_counts,
                    ..
                } => {
                    let n: usize = class_counts.iter().sum();
                    let _ = writeln!(
                        out,
                        "{indent}{condition} n={n} -> {} {class_counts:?} *",
                        class(*prediction)
                    );
                }
                Node::Split {
                    feature: f,
                    threshold,
                    left,
                    right,
                    n_samples,
                    ..
                } => {
                    let _ = writeln!(out, "{indent}{condition} n={n_samples}");
                    if depth >= max_depth {
                        let _ = writeln!(out, "{indent}  ...");
                        continue;
                    }
                    let name = feature(f.index());
                    stack.push((right.index(), depth + 1, format!("{name} > {threshold:.4}")));
                    stack.push((left.index(), depth + 1, format!("{name} <= {threshold:.4}")));
                }
            }
        }
        out
    }

    /// Descend to the leaf for `sample`; yields its prediction and counts.
    fn leaf_for(&self, sample: &[f64]) -> Result<(usize, &[usize]), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut slot = 0;
        loop {
            match &self.nodes[slot] {
                Node::Leaf {
                    prediction,
                    class_counts,
                    ..
                } => return Ok((*prediction, class_counts)),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let goes_left = sample[feature.index()] <= *threshold;
                    slot = if goes_left { left.index() } else { right.index() };
                }
            }
        }
    }
}
