//! Random forest hyperparameters.

use crate::error::RfError;
use crate::fit::ForestFit;
use crate::split::SplitCriterion;
use crate::tree::DecisionTreeConfig;

/// How many predictors each split may look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// `ceil(sqrt(p))`, the classification default.
    Sqrt,
    /// `ceil(log2(p))`, at least 1.
    Log2,
    /// `ceil(f * p)` for `f` in (0, 1].
    Fraction(f64),
    Fixed(usize),
    /// Every predictor, which makes the ensemble plain bagging.
    All,
}

impl MaxFeatures {
    /// Concrete per-split count for `n_features` predictors.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidMaxFeatures`] unless the count lies in
    /// `1..=n_features`.
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let p = n_features as f64;
        let count = match self {
            MaxFeatures::Sqrt => p.sqrt().ceil() as usize,
            MaxFeatures::Log2 => p.log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (p * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        if (1..=n_features).contains(&count) {
            Ok(count)
        } else {
            Err(RfError::InvalidMaxFeatures {
                max_features: count,
                n_features,
            })
        }
    }
}

/// Out-of-bag scoring switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    Enabled,
    Disabled,
}

/// Ensemble settings plus the growth rules every member tree follows.
///
/// Defaults: square-root feature sampling, full-size bootstrap, no OOB
/// scoring, and member trees grown until pure (no depth limit, no
/// complexity stop, `min_samples_split = 2`, `min_samples_leaf = 1`).
/// The seed drives both the bootstrap draws and the per-tree seeds.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) growth: DecisionTreeConfig,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] for an empty ensemble.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            growth: DecisionTreeConfig::new(),
            oob_mode: OobMode::Disabled,
            bootstrap_fraction: 1.0,
        })
    }

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Depth cap for every member tree; `None` grows them out.
    #[must_use]
    pub fn with_max_depth(self, max_depth: Option<usize>) -> Self {
        self.map_growth(|g| g.with_max_depth(max_depth))
    }

    #[must_use]
    pub fn with_min_samples_split(self, min_samples_split: usize) -> Self {
        self.map_growth(|g| g.with_min_samples_split(min_samples_split))
    }

    #[must_use]
    pub fn with_min_samples_leaf(self, min_samples_leaf: usize) -> Self {
        self.map_growth(|g| g.with_min_samples_leaf(min_samples_leaf))
    }

    #[must_use]
    pub fn with_criterion(self, criterion: SplitCriterion) -> Self {
        self.map_growth(|g| g.with_criterion(criterion))
    }

    /// Declared class count, shared by every member tree's leaves.
    #[must_use]
    pub fn with_n_classes(self, n_classes: Option<usize>) -> Self {
        self.map_growth(|g| g.with_n_classes(n_classes))
    }

    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        self.map_growth(|g| g.with_seed(seed))
    }

    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Bootstrap size as a share of the training rows, in (0, 1].
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    fn map_growth(mut self, f: impl FnOnce(DecisionTreeConfig) -> DecisionTreeConfig) -> Self {
        self.growth = f(self.growth);
        self
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.growth.max_depth()
    }

    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.growth.criterion()
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.growth.seed()
    }

    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Growth rules applied to each member tree.
    #[must_use]
    pub fn tree_template(&self) -> &DecisionTreeConfig {
        &self.growth
    }

    /// Grow the ensemble on row-major `features` with zero-based `labels`.
    ///
    /// # Errors
    ///
    /// Input validation errors as for [`DecisionTreeConfig::fit`], plus
    /// [`RfError::InvalidMaxFeatures`], [`RfError::InvalidBootstrapFraction`]
    /// and, with OOB scoring on, [`RfError::OobEvaluationFailed`] when no row
    /// was ever left out of a bootstrap.
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<ForestFit, RfError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}
