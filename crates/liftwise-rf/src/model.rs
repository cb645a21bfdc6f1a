//! A single entry point over the two model families the report compares.

use std::fmt;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::instrument;

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::forest::RandomForest;
use crate::importance::{RankedFeature, rank_importances};
use crate::predict::ClassDistribution;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// The two model families the report compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    RandomForest,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::DecisionTree => write!(f, "decision tree"),
            ModelKind::RandomForest => write!(f, "random forest"),
        }
    }
}

/// An unfitted model: the configuration of one family.
#[derive(Debug, Clone)]
pub enum ModelSpec {
    Tree(DecisionTreeConfig),
    Forest(RandomForestConfig),
}

impl ModelSpec {
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Tree(_) => ModelKind::DecisionTree,
            ModelSpec::Forest(_) => ModelKind::RandomForest,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        match self {
            ModelSpec::Tree(c) => c.seed(),
            ModelSpec::Forest(c) => c.seed(),
        }
    }

    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            ModelSpec::Tree(c) => ModelSpec::Tree(c.with_seed(seed)),
            ModelSpec::Forest(c) => ModelSpec::Forest(c.with_seed(seed)),
        }
    }

    /// Fitted models cover `n_classes` classes even if some are absent from
    /// the rows they are fitted on.
    #[must_use]
    pub fn with_n_classes(self, n_classes: Option<usize>) -> Self {
        match self {
            ModelSpec::Tree(c) => ModelSpec::Tree(c.with_n_classes(n_classes)),
            ModelSpec::Forest(c) => ModelSpec::Forest(c.with_n_classes(n_classes)),
        }
    }

    /// # Errors
    ///
    /// Any error of [`DecisionTreeConfig::fit`] or [`RandomForestConfig::fit`].
    #[instrument(skip_all, fields(kind = %self.kind(), n_samples = features.len()))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<FittedModel, RfError> {
        match self {
            ModelSpec::Tree(config) => Ok(FittedModel::Tree(config.fit(features, labels)?)),
            ModelSpec::Forest(config) => Ok(FittedModel::Forest(
                config.fit(features, labels, feature_names)?.forest,
            )),
        }
    }
}

/// A fitted decision tree or random forest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum FittedModel {
    Tree(DecisionTree),
    Forest(RandomForest),
}

impl FittedModel {
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::Tree(_) => ModelKind::DecisionTree,
            FittedModel::Forest(_) => ModelKind::RandomForest,
        }
    }

    /// # Errors
    ///
    /// [`RfError::PredictionFeatureMismatch`] for a row of the wrong width,
    /// here and in the other predict methods.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        match self {
            FittedModel::Tree(t) => t.predict(sample),
            FittedModel::Forest(f) => f.predict(sample),
        }
    }

    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, RfError> {
        match self {
            FittedModel::Tree(t) => Ok(ClassDistribution::new(t.predict_proba(sample)?)),
            FittedModel::Forest(f) => f.predict_proba(sample),
        }
    }

    /// Rows are scored on the rayon pool; output order follows input order.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }

    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f64>],
    ) -> Result<Vec<ClassDistribution>, RfError> {
        features
            .into_par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    /// MDI importances indexed by feature column, summing to 1.0 unless all zero.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        match self {
            FittedModel::Tree(t) => t.feature_importances(),
            FittedModel::Forest(f) => f.feature_importances(),
        }
    }

    /// Importances paired with `names` and ranked, most important first.
    #[must_use]
    pub fn ranked_importances(&self, names: &[String]) -> Vec<RankedFeature> {
        rank_importances(&self.feature_importances(), names)
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            FittedModel::Tree(t) => t.n_features(),
            FittedModel::Forest(f) => f.n_features(),
        }
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        match self {
            FittedModel::Tree(t) => t.n_classes(),
            FittedModel::Forest(f) => f.n_classes(),
        }
    }
}
