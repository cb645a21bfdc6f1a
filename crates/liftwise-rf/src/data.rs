//! Shape checks shared by every training entry point.

use crate::error::RfError;

/// Dimensions of a validated training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrainingShape {
    pub(crate) n_samples: usize,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

/// Validate a row-major feature matrix and its labels.
///
/// `declared_classes` fixes the class count; when `None` it is inferred as
/// `max(label) + 1`.
pub(crate) fn validate(
    features: &[Vec<f64>],
    labels: &[usize],
    declared_classes: Option<usize>,
) -> Result<TrainingShape, RfError> {
    if features.is_empty() {
        return Err(RfError::EmptyDataset);
    }
    if features.len() != labels.len() {
        return Err(RfError::LabelCountMismatch {
            n_features_rows: features.len(),
            n_labels: labels.len(),
        });
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    let inferred = labels.iter().max().copied().unwrap_or(0) + 1;
    let n_classes = declared_classes.unwrap_or(inferred);
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= n_classes) {
        return Err(RfError::LabelOutOfRange {
            sample_index,
            label,
            n_classes,
        });
    }

    Ok(TrainingShape {
        n_samples: features.len(),
        n_features,
        n_classes,
    })
}

/// Row indices of each class, in row order. Slot `c` holds class `c`.
pub(crate) fn rows_by_class(labels: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        groups[label].push(row);
    }
    groups
}

/// Clone the listed rows out of `rows`.
pub(crate) fn gather<T: Clone>(rows: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| rows[i].clone()).collect()
}

/// Index of the largest value; earliest index wins ties.
pub(crate) fn argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
