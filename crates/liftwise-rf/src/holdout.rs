//! Stratified train/validation partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::data;
use crate::error::RfError;

/// Stratified holdout split configuration.
///
/// Construct via [`HoldoutSplit::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    train_fraction: f64,
    seed: u64,
}

/// Row indices of each partition, both sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

impl Partition {
    /// Gather `rows` into (train, validation) by this partition's indices.
    #[must_use]
    pub fn split_rows<T: Clone>(&self, rows: &[T]) -> (Vec<T>, Vec<T>) {
        (data::gather(rows, &self.train), data::gather(rows, &self.validation))
    }
}

impl HoldoutSplit {
    /// Create a split that places `train_fraction` of each class in the train partition.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTrainFraction`] unless `0.0 < train_fraction < 1.0`.
    pub fn new(train_fraction: f64) -> Result<Self, RfError> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(RfError::InvalidTrainFraction {
                fraction: train_fraction,
            });
        }
        Ok(Self {
            train_fraction,
            seed: 42,
        })
    }

    /// Set the random seed for the per-class shuffle.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the train fraction.
    #[must_use]
    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Partition sample indices by class.
    ///
    /// Each class contributes `ceil(train_fraction * n_class)` shuffled rows
    /// to the train partition, capped so a class with at least two rows
    /// always keeps one for validation.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::EmptyDataset`] when `labels` is empty.
    #[instrument(skip_all, fields(n_samples = labels.len(), train_fraction = self.train_fraction))]
    pub fn partition(&self, labels: &[usize]) -> Result<Partition, RfError> {
        let n_classes = match labels.iter().max() {
            Some(&max) => max + 1,
            None => return Err(RfError::EmptyDataset),
        };

        let mut class_indices = data::rows_by_class(labels, n_classes);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::new();
        let mut validation = Vec::new();

        for (class, indices) in class_indices.iter_mut().enumerate() {
            if indices.is_empty() {
                continue;
            }
            indices.shuffle(&mut rng);
            let n = indices.len();
            let mut n_train = (self.train_fraction * n as f64).ceil() as usize;
            if n >= 2 {
                n_train = n_train.min(n - 1);
            }
            debug!(class, n, n_train, "class partitioned");
            train.extend_from_slice(&indices[..n_train]);
            validation.extend_from_slice(&indices[n_train..]);
        }

        train.sort_unstable();
        validation.sort_unstable();
        Ok(Partition { train, validation })
    }
}
