//! Turning raw impurity-decrease totals into a normalized ranking.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeature {
    pub name: String,
    /// Share of the total decrease; the ranking sums to 1 unless every
    /// score was zero.
    pub importance: f64,
    /// Starts at 1.
    pub rank: usize,
}

/// Column-wise sum of several importance vectors, then [`rank_importances`].
pub(crate) fn aggregate_importances(per_model: &[Vec<f64>], names: &[String]) -> Vec<RankedFeature> {
    if per_model.is_empty() {
        return Vec::new();
    }
    let totals: Vec<f64> = (0..names.len())
        .map(|column| {
            per_model
                .iter()
                .filter_map(|scores| scores.get(column))
                .sum::<f64>()
        })
        .collect();
    rank_importances(&totals, names)
}

/// Normalize `scores` and order them from most to least important.
/// Equal scores keep column order.
pub(crate) fn rank_importances(scores: &[f64], names: &[String]) -> Vec<RankedFeature> {
    let total: f64 = scores.iter().sum();
    let scale = if total > 0.0 { total.recip() } else { 0.0 };

    let mut order: Vec<usize> = (0..names.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    order
        .into_iter()
        .zip(1..)
        .map(|(column, rank)| RankedFeature {
            name: names[column].clone(),
            importance: scores[column] * scale,
            rank,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["roll_belt", "yaw_belt", "pitch_forearm"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn summed_then_normalized() {
        let ranked = aggregate_importances(&[vec![0.2, 0.0, 0.8], vec![0.6, 0.0, 0.4]], &names());
        assert_eq!(ranked[0].name, "pitch_forearm");
        assert!((ranked[0].importance - 0.6).abs() < 1e-12);
        assert_eq!(ranked[1].name, "roll_belt");
        assert_eq!(ranked.iter().map(|f| f.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_scores_keep_column_order() {
        let ranked = rank_importances(&[0.0, 0.0, 0.0], &names());
        assert!(ranked.iter().all(|f| f.importance == 0.0));
        let order: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["roll_belt", "yaw_belt", "pitch_forearm"]);
    }

    #[test]
    fn nothing_to_aggregate() {
        assert!(aggregate_importances(&[], &names()).is_empty());
    }
}
