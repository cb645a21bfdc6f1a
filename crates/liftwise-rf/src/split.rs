use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// An empty node is pure.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let proportions = class_counts.iter().filter(|&&c| c > 0).map(|&c| c as f64 / n);
        let value = match self {
            SplitCriterion::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
            SplitCriterion::Entropy => -proportions.map(|p| p * p.ln()).sum::<f64>(),
        };
        Impurity::new(value)
    }
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// Weighted impurity decrease (MDI numerator, scikit-learn convention).
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Parameters of one split search that stay fixed while a tree grows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitSearch {
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl SplitSearch {
    /// Find the best threshold split among `max_features` randomly drawn columns.
    ///
    /// `columns` is column-major: `columns[feature][sample]`. Candidate
    /// thresholds are midpoints between consecutive distinct sorted values.
    /// Returns `None` when every drawn column is constant on these samples or
    /// every boundary would leave fewer than `min_samples_leaf` on a side.
    pub(crate) fn best_split(
        &self,
        columns: &[Vec<f64>],
        labels: &[usize],
        sample_indices: &[usize],
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_features = columns.len();
        let n_samples = sample_indices.len();
        if n_samples < 2 || n_features == 0 {
            return None;
        }

        let mut parent_counts = vec![0usize; self.n_classes];
        for &si in sample_indices {
            parent_counts[labels[si]] += 1;
        }
        let weighted_parent =
            n_samples as f64 * self.criterion.impurity(&parent_counts, n_samples).value();

        // Partial Fisher-Yates over the column order.
        let take = self.max_features.min(n_features);
        let mut order: Vec<usize> = (0..n_features).collect();
        for i in 0..take {
            let j = rng.gen_range(i..n_features);
            order.swap(i, j);
        }

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

        for &feature in &order[..take] {
            let column = &columns[feature];
            sorted.clear();
            sorted.extend(sample_indices.iter().map(|&si| (column[si], labels[si])));
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            if sorted[0].0 == sorted[n_samples - 1].0 {
                continue;
            }

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.clone();

            for i in 0..n_samples - 1 {
                let (value, class) = sorted[i];
                left[class] += 1;
                right[class] -= 1;

                let next = sorted[i + 1].0;
                if value == next {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n_samples - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let decrease = weighted_parent
                    - n_left as f64 * self.criterion.impurity(&left, n_left).value()
                    - n_right as f64 * self.criterion.impurity(&right, n_right).value();

                if best.is_none_or(|(_, _, d)| decrease > d) {
                    best = Some((feature, threshold_between(value, next), decrease));
                }
            }
        }

        let (feature, threshold, impurity_decrease) = best?;
        let column = &columns[feature];
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
            .iter()
            .partition(|&&si| column[si] <= threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return None;
        }

        Some(SplitResult {
            feature: FeatureIndex::new(feature),
            threshold,
            impurity_decrease,
            left_indices,
            right_indices,
        })
    }
}

/// Midpoint of two distinct sorted values, or `low` when the midpoint rounds
/// up to `high` (adjacent floats).
fn threshold_between(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid < high { mid } else { low }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{SplitCriterion, SplitSearch};

    fn search(n_classes: usize, max_features: usize, min_samples_leaf: usize) -> SplitSearch {
        SplitSearch {
            n_classes,
            criterion: SplitCriterion::Gini,
            max_features,
            min_samples_leaf,
        }
    }

    #[test]
    fn gini_values() {
        assert!(SplitCriterion::Gini.impurity(&[10, 0, 0], 10).value().abs() < f64::EPSILON);
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10).value() - 0.5).abs() < f64::EPSILON);
        let five_way = SplitCriterion::Gini.impurity(&[2, 2, 2, 2, 2], 10).value();
        assert!((five_way - 0.8).abs() < 1e-12);
    }

    #[test]
    fn entropy_values() {
        assert!(SplitCriterion::Entropy.impurity(&[7, 0], 7).value().abs() < f64::EPSILON);
        let balanced = SplitCriterion::Entropy.impurity(&[5, 5], 10).value();
        assert!((balanced - 2.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn empty_node_is_pure() {
        assert!(SplitCriterion::Entropy.impurity(&[0, 0], 0).is_pure());
    }

    #[test]
    fn separable_column_split_between_groups() {
        let columns = vec![vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = search(2, 1, 1)
            .best_split(&columns, &labels, &indices, &mut rng)
            .expect("should find a split");
        assert_eq!(split.feature.index(), 0);
        assert!((split.threshold - 6.5).abs() < f64::EPSILON);
        assert_eq!(split.left_indices, vec![0, 1, 2]);
        assert_eq!(split.right_indices, vec![3, 4, 5]);
        // Parent gini 0.5 over 6 samples, both children pure.
        assert!((split.impurity_decrease - 3.0).abs() < 1e-12);
    }

    #[test]
    fn informative_column_beats_noise() {
        let columns = vec![
            vec![5.0, 1.0, 5.0, 1.0, 5.0, 1.0],
            vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let indices: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let split = search(2, 2, 1)
            .best_split(&columns, &labels, &indices, &mut rng)
            .unwrap();
        assert_eq!(split.feature.index(), 1);
    }

    #[test]
    fn threshold_separates_adjacent_floats() {
        let low = f64::from_bits(1.0f64.to_bits() + 1);
        let high = f64::from_bits(low.to_bits() + 1);
        let columns = vec![vec![low, low, high, high]];
        let indices: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = search(2, 1, 1)
            .best_split(&columns, &[0, 0, 1, 1], &indices, &mut rng)
            .unwrap();
        assert_eq!(split.threshold, low);
        assert_eq!(split.left_indices, vec![0, 1]);
        assert_eq!(split.right_indices, vec![2, 3]);
    }

    #[test]
    fn threshold_is_the_midpoint_when_representable() {
        assert_eq!(super::threshold_between(3.0, 10.0), 6.5);
        assert_eq!(super::threshold_between(-2.0, 2.0), 0.0);
    }

    #[test]
    fn constant_column_has_no_split() {
        let columns = vec![vec![5.0; 4]];
        let labels = vec![0, 0, 1, 1];
        let indices: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(search(2, 1, 1).best_split(&columns, &labels, &indices, &mut rng).is_none());
    }

    #[test]
    fn min_samples_leaf_blocks_split() {
        let columns = vec![vec![1.0, 10.0]];
        let labels = vec![0, 1];
        let indices = vec![0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(search(2, 1, 2).best_split(&columns, &labels, &indices, &mut rng).is_none());
    }
}
