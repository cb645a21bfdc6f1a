//! What forest training returns alongside the forest.

use crate::forest::RandomForest;
use crate::importance::RankedFeature;
use crate::oob::OobScore;

/// A trained forest with its training-time diagnostics.
#[derive(Debug)]
pub struct ForestFit {
    pub forest: RandomForest,
    /// MDI importances ranked most important first.
    pub importances: Vec<RankedFeature>,
    /// Present when trained with [`OobMode::Enabled`](crate::OobMode::Enabled).
    pub oob: Option<OobScore>,
    /// Candidate features tried at each split.
    pub max_features: usize,
    /// Rows drawn into each bootstrap sample.
    pub draw_count: usize,
}

impl ForestFit {
    /// Out-of-bag accuracy, if it was computed.
    #[must_use]
    pub fn oob_accuracy(&self) -> Option<f64> {
        self.oob.as_ref().map(|s| s.accuracy)
    }
}
