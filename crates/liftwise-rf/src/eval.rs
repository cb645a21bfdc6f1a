//! Stratified k-fold cross-validation for either model family.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::confusion::ConfusionMatrix;
use crate::data;
use crate::error::RfError;
use crate::importance::{RankedFeature, aggregate_importances};
use crate::model::{ModelKind, ModelSpec};

/// k-fold settings. Folds are stratified: every class is spread as evenly
/// as possible across them.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Outcome of one cross-validation run.
#[derive(Debug)]
pub struct CrossValidationResult {
    pub kind: ModelKind,
    /// Held-out accuracy per fold, in fold order.
    pub fold_accuracies: Vec<f64>,
    pub mean_accuracy: f64,
    /// Population standard deviation over folds.
    pub std_accuracy: f64,
    /// Pooled over every held-out row.
    pub confusion_matrix: ConfusionMatrix,
    /// Fold models' importances, summed then normalized and ranked.
    pub feature_importances: Vec<RankedFeature>,
    pub n_folds: usize,
    pub n_samples: usize,
    pub n_features: usize,
    pub n_classes: usize,
}

impl CrossValidationResult {
    /// `1 - mean_accuracy`, the expected out-of-sample error.
    #[must_use]
    pub fn estimated_error(&self) -> f64 {
        1.0 - self.mean_accuracy
    }
}

/// Held-out predictions of one fold model.
struct FoldOutcome {
    actual: Vec<usize>,
    predicted: Vec<usize>,
    importances: Vec<f64>,
}

impl FoldOutcome {
    fn accuracy(&self) -> f64 {
        let hits = self
            .actual
            .iter()
            .zip(&self.predicted)
            .filter(|(a, p)| a == p)
            .count();
        hits as f64 / self.actual.len().max(1) as f64
    }
}

impl CrossValidation {
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] below two folds.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Seed of the per-class shuffle that deals rows into folds.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Cross-validate `spec` on the given rows.
    ///
    /// Fold `k` refits `spec` with its seed offset by `k` and with the class
    /// count of the whole input, so every fold predicts over the same
    /// classes. Folds run concurrently on the rayon pool; results are
    /// identical to a sequential run.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::TooFewSamplesForSplit`] when a class present in
    /// `labels` has fewer rows than there are folds, and otherwise any
    /// validation or fitting error of the model.
    #[instrument(skip_all, fields(kind = %spec.kind(), n_folds = self.n_folds, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        spec: &ModelSpec,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, RfError> {
        let shape = data::validate(features, labels, None)?;
        let assignment = self.assign_folds(labels, shape.n_classes)?;

        let outcomes: Vec<FoldOutcome> = (0..self.n_folds)
            .into_par_iter()
            .map(|fold| -> Result<FoldOutcome, RfError> {
                let (held_out, kept): (Vec<usize>, Vec<usize>) =
                    (0..shape.n_samples).partition(|&row| assignment[row] == fold);
                let model = spec
                    .clone()
                    .with_seed(spec.seed().wrapping_add(fold as u64))
                    .with_n_classes(Some(shape.n_classes))
                    .fit(
                        &data::gather(features, &kept),
                        &data::gather(labels, &kept),
                        feature_names,
                    )?;
                let outcome = FoldOutcome {
                    predicted: model.predict_batch(&data::gather(features, &held_out))?,
                    actual: data::gather(labels, &held_out),
                    importances: model.feature_importances(),
                };
                debug!(fold, accuracy = outcome.accuracy(), n_held_out = held_out.len(), "fold scored");
                Ok(outcome)
            })
            .collect::<Result<_, _>>()?;

        let fold_accuracies: Vec<f64> = outcomes.iter().map(FoldOutcome::accuracy).collect();
        let k = self.n_folds as f64;
        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / k;
        let variance = fold_accuracies
            .iter()
            .map(|a| (a - mean_accuracy).powi(2))
            .sum::<f64>()
            / k;

        let actual: Vec<usize> = outcomes.iter().flat_map(|o| o.actual.iter().copied()).collect();
        let predicted: Vec<usize> = outcomes.iter().flat_map(|o| o.predicted.iter().copied()).collect();
        let confusion_matrix = ConfusionMatrix::from_labels(&actual, &predicted, shape.n_classes)?;
        let per_fold: Vec<Vec<f64>> = outcomes.into_iter().map(|o| o.importances).collect();

        info!(mean_accuracy, std_accuracy = variance.sqrt(), "cross-validation complete");

        Ok(CrossValidationResult {
            kind: spec.kind(),
            fold_accuracies,
            mean_accuracy,
            std_accuracy: variance.sqrt(),
            confusion_matrix,
            feature_importances: aggregate_importances(&per_fold, feature_names),
            n_folds: self.n_folds,
            n_samples: shape.n_samples,
            n_features: shape.n_features,
            n_classes: shape.n_classes,
        })
    }

    /// Fold number of every row: each class is shuffled, then dealt out
    /// round-robin.
    fn assign_folds(&self, labels: &[usize], n_classes: usize) -> Result<Vec<usize>, RfError> {
        let mut groups = data::rows_by_class(labels, n_classes);
        if let Some((class, rows)) = groups
            .iter()
            .enumerate()
            .find(|(_, rows)| !rows.is_empty() && rows.len() < self.n_folds)
        {
            return Err(RfError::TooFewSamplesForSplit {
                class,
                count: rows.len(),
                required: self.n_folds,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        for rows in &mut groups {
            rows.shuffle(&mut rng);
            for (position, &row) in rows.iter().enumerate() {
                assignment[row] = position % self.n_folds;
            }
        }
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaxFeatures, RandomForestConfig};
    use crate::tree::DecisionTreeConfig;

    /// 30 rows per class, classes 10 apart along the first predictor.
    fn three_bands() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let (features, labels): (Vec<Vec<f64>>, Vec<usize>) = (0..90)
            .map(|i| {
                let class = i / 30;
                (vec![class as f64 * 10.0 + (i % 30) as f64 * 0.1, 0.5], class)
            })
            .unzip();
        (features, labels, vec!["x".to_string(), "y".to_string()])
    }

    fn forest_spec(n_trees: usize) -> ModelSpec {
        ModelSpec::Forest(
            RandomForestConfig::new(n_trees)
                .unwrap()
                .with_max_features(MaxFeatures::All),
        )
    }

    #[test]
    fn forest_folds() {
        let (features, labels, names) = three_bands();
        let result = CrossValidation::new(5)
            .unwrap()
            .evaluate(&forest_spec(20), &features, &labels, &names)
            .unwrap();

        assert!(result.mean_accuracy > 0.8, "mean accuracy {}", result.mean_accuracy);
        assert_eq!(result.fold_accuracies.len(), 5);
        assert_eq!(result.n_samples, 90);
        assert_eq!(result.kind, ModelKind::RandomForest);
        assert!((result.estimated_error() + result.mean_accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tree_folds() {
        let (features, labels, names) = three_bands();
        let result = CrossValidation::new(5)
            .unwrap()
            .evaluate(&ModelSpec::Tree(DecisionTreeConfig::rpart_defaults()), &features, &labels, &names)
            .unwrap();
        assert!(result.mean_accuracy > 0.9, "mean accuracy {}", result.mean_accuracy);
        assert_eq!(result.kind, ModelKind::DecisionTree);
    }

    #[test]
    fn pooled_confusion_counts_every_row_once() {
        let (features, labels, names) = three_bands();
        let result = CrossValidation::new(3)
            .unwrap()
            .evaluate(&forest_spec(10), &features, &labels, &names)
            .unwrap();
        assert_eq!(result.confusion_matrix.n_classes(), 3);
        assert_eq!(result.confusion_matrix.total(), 90);
    }

    #[test]
    fn folds_are_stratified() {
        let (_, labels, _) = three_bands();
        let assignment = CrossValidation::new(3).unwrap().assign_folds(&labels, 3).unwrap();
        for fold in 0..3 {
            for class in 0..3 {
                let n = (0..90)
                    .filter(|&row| labels[row] == class && assignment[row] == fold)
                    .count();
                assert_eq!(n, 10, "fold {fold} class {class}");
            }
        }
    }

    #[test]
    fn repeatable_under_a_seed() {
        let (features, labels, names) = three_bands();
        let cv = CrossValidation::new(3).unwrap().with_seed(5);
        let a = cv.evaluate(&forest_spec(5), &features, &labels, &names).unwrap();
        let b = cv.evaluate(&forest_spec(5), &features, &labels, &names).unwrap();
        assert_eq!(a.fold_accuracies, b.fold_accuracies);
    }

    #[test]
    fn pooled_importances_normalized() {
        let (features, labels, names) = three_bands();
        let result = CrossValidation::new(3)
            .unwrap()
            .evaluate(&forest_spec(10), &features, &labels, &names)
            .unwrap();
        let total: f64 = result.feature_importances.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-10, "total {total}");
    }

    #[test]
    fn fewer_than_two_folds_rejected() {
        assert!(CrossValidation::new(0).is_err());
        assert!(CrossValidation::new(1).is_err());
    }

    #[test]
    fn small_class_rejected() {
        let features = vec![vec![1.0], vec![2.0], vec![10.0], vec![11.0], vec![12.0]];
        let err = CrossValidation::new(5)
            .unwrap()
            .evaluate(&forest_spec(5), &features, &[0, 0, 1, 1, 1], &["x".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::TooFewSamplesForSplit { class: 0, count: 2, required: 5 }
        ));
    }
}
