//! Held-out scoring of a fitted model.

use tracing::{info, instrument};

use crate::confusion::{ClassMetrics, ConfusionMatrix};
use crate::error::RfError;
use crate::model::{FittedModel, ModelKind};

/// Performance of a fitted model on rows it was not trained on.
#[derive(Debug, Clone)]
pub struct HoldoutScore {
    /// Model family that was scored.
    pub kind: ModelKind,
    /// Fraction of rows predicted correctly.
    pub accuracy: f64,
    /// `1 - accuracy`.
    pub out_of_sample_error: f64,
    /// Cohen's kappa of the validation confusion matrix.
    pub kappa: f64,
    /// Validation confusion matrix.
    pub confusion_matrix: ConfusionMatrix,
    /// Per-class precision, recall, specificity and F1.
    pub class_metrics: Vec<ClassMetrics>,
    /// Number of rows scored.
    pub n_samples: usize,
}

/// Predict every row of `features` and compare against `labels`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RfError::EmptyDataset`] | No rows to score |
/// | [`RfError::LabelCountMismatch`] | `features` and `labels` differ in length |
/// | [`RfError::PredictionFeatureMismatch`] | A row has the wrong width |
/// | [`RfError::LabelOutOfRange`] | A label is `>= n_classes` |
#[instrument(skip_all, fields(kind = %model.kind(), n_samples = features.len()))]
pub fn score(
    model: &FittedModel,
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
) -> Result<HoldoutScore, RfError> {
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    if features.len() != labels.len() {
        return Err(RfError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }

    let predictions = model.predict_batch(features)?;
    let confusion_matrix = ConfusionMatrix::from_labels(labels, &predictions, n_classes)?;
    let accuracy = confusion_matrix.accuracy();

    info!(accuracy, kappa = confusion_matrix.kappa(), "holdout scored");

    Ok(HoldoutScore {
        kind: model.kind(),
        accuracy,
        out_of_sample_error: 1.0 - accuracy,
        kappa: confusion_matrix.kappa(),
        class_metrics: confusion_matrix.class_metrics(),
        confusion_matrix,
        n_samples: labels.len(),
    })
}

/// Pick the better of two scores by accuracy; the first argument wins ties.
#[must_use]
pub fn select_best<'a>(first: &'a HoldoutScore, second: &'a HoldoutScore) -> &'a HoldoutScore {
    if second.accuracy > first.accuracy {
        second
    } else {
        first
    }
}
