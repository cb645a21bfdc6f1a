//! Soft-vote prediction over a fitted forest.

use rayon::prelude::*;

use crate::data::argmax;
use crate::error::RfError;
use crate::forest::RandomForest;

/// Per-class probabilities for one observation, indexed by class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Most probable class. Equal probabilities go to the lower index.
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        argmax(&self.probs)
    }

    /// Probability of `class`, 0.0 for an index outside the distribution.
    #[must_use]
    pub fn probability(&self, class: usize) -> f64 {
        self.probs.get(class).copied().unwrap_or(0.0)
    }

    /// The `k` most probable `(class, probability)` pairs, best first.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        // Stable sort keeps lower class indices ahead on equal probability.
        ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        ranked.into_iter().take(k).collect()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }
}

impl RandomForest {
    /// Class index of one observation.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a row of the wrong width.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        self.predict_proba(sample).map(|d| d.predicted_class())
    }

    /// Mean of the trees' leaf distributions for one observation.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on a row of the wrong width.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let votes = self.trees.iter().try_fold(
            vec![0.0f64; self.n_classes],
            |mut votes, tree| -> Result<Vec<f64>, RfError> {
                for (slot, p) in votes.iter_mut().zip(tree.predict_proba(sample)?) {
                    *slot += p;
                }
                Ok(votes)
            },
        )?;
        let weight = 1.0 / self.trees.len().max(1) as f64;
        Ok(ClassDistribution::new(
            votes.into_iter().map(|v| v * weight).collect(),
        ))
    }

    /// Class indices for many rows, scored on the rayon pool.
    ///
    /// # Errors
    ///
    /// Fails on the first row of the wrong width.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    /// Distributions for many rows, scored on the rayon pool.
    ///
    /// # Errors
    ///
    /// Fails on the first row of the wrong width.
    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<ClassDistribution>, RfError> {
        rows.par_iter().map(|row| self.predict_proba(row)).collect()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Ensemble size.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predictor names in column order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}
