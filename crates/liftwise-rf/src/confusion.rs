//! Confusion counts and the per-class metrics derived from them.

use std::fmt;

use crate::error::RfError;

/// Square table of counts: row = actual class, column = predicted class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    n_classes: usize,
    /// Row-major, `n_classes * n_classes` cells.
    cells: Vec<usize>,
}

/// One-vs-rest metrics for a single class. Ratios with a zero
/// denominator are reported as 0.0.
#[derive(Debug, Clone)]
pub struct ClassMetrics {
    pub class: usize,
    /// TP / (TP + FP)
    pub precision: f64,
    /// TP / (TP + FN), also called sensitivity.
    pub recall: f64,
    /// TN / (TN + FP)
    pub specificity: f64,
    pub f1: f64,
    /// Rows whose actual class is `class`.
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ConfusionMatrix {
    /// Tally paired actual and predicted labels.
    ///
    /// # Errors
    ///
    /// [`RfError::EmptyDataset`] for no pairs,
    /// [`RfError::LabelCountMismatch`] for slices of different length, and
    /// [`RfError::LabelOutOfRange`] for any label not below `n_classes`.
    pub fn from_labels(
        actual: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if actual.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if actual.len() != predicted.len() {
            return Err(RfError::LabelCountMismatch {
                n_features_rows: predicted.len(),
                n_labels: actual.len(),
            });
        }
        let mut cells = vec![0usize; n_classes * n_classes];
        for (sample_index, (&a, &p)) in actual.iter().zip(predicted).enumerate() {
            let label = a.max(p);
            if label >= n_classes {
                return Err(RfError::LabelOutOfRange {
                    sample_index,
                    label,
                    n_classes,
                });
            }
            cells[a * n_classes + p] += 1;
        }
        Ok(Self { n_classes, cells })
    }

    /// Count of rows of class `actual` predicted as `predicted`.
    #[must_use]
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.cells[actual * self.n_classes + predicted]
    }

    fn row(&self, actual: usize) -> &[usize] {
        &self.cells[actual * self.n_classes..(actual + 1) * self.n_classes]
    }

    fn column_total(&self, predicted: usize) -> usize {
        (0..self.n_classes).map(|a| self.get(a, predicted)).sum()
    }

    /// Sum of the diagonal.
    #[must_use]
    pub fn correct(&self) -> usize {
        (0..self.n_classes).map(|c| self.get(c, c)).sum()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.cells.iter().sum()
    }

    /// Trace over total.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Cohen's kappa: agreement beyond what the row and column marginals
    /// would produce by chance. 0.0 when chance agreement is already total.
    #[must_use]
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let expected: f64 = (0..self.n_classes)
            .map(|c| {
                let actual: usize = self.row(c).iter().sum();
                actual as f64 * self.column_total(c) as f64
            })
            .sum::<f64>()
            / (total * total);
        if (1.0 - expected).abs() < f64::EPSILON {
            0.0
        } else {
            (self.accuracy() - expected) / (1.0 - expected)
        }
    }

    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let total = self.total();
        (0..self.n_classes)
            .map(|class| {
                let tp = self.get(class, class);
                let support: usize = self.row(class).iter().sum();
                let called = self.column_total(class);
                let fp = called - tp;
                let tn = total - support - fp;
                let precision = ratio(tp, called);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class,
                    precision,
                    recall,
                    specificity: ratio(tn, tn + fp),
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Nested rows, for serialization and plotting.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<usize>> {
        self.cells
            .chunks(self.n_classes.max(1))
            .map(<[usize]>::to_vec)
            .collect()
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actual\\pred")?;
        for c in 0..self.n_classes {
            write!(f, " {c:>6}")?;
        }
        for a in 0..self.n_classes {
            write!(f, "\n{a:>11}")?;
            for count in self.row(a) {
                write!(f, " {count:>6}")?;
            }
        }
        writeln!(f)
    }
}
