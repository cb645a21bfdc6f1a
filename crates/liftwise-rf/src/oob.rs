//! Out-of-bag scoring: each training row is judged only by the trees whose
//! bootstrap left it out.

use crate::confusion::ConfusionMatrix;
use crate::data::argmax;
use crate::error::RfError;
use crate::tree::DecisionTree;

#[derive(Debug, Clone)]
pub struct OobScore {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    /// Rows left out of at least one bootstrap. Only these are scored.
    pub n_oob_samples: usize,
}

/// Vote tally of one training row.
struct Ballot {
    votes: Vec<usize>,
    cast: usize,
}

pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    out_of_bag: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let mut ballots: Vec<Ballot> = (0..features.len())
        .map(|_| Ballot {
            votes: vec![0; n_classes],
            cast: 0,
        })
        .collect();

    for (tree, rows) in trees.iter().zip(out_of_bag) {
        for &row in rows {
            let ballot = &mut ballots[row];
            ballot.votes[tree.predict(&features[row])?] += 1;
            ballot.cast += 1;
        }
    }

    let (actual, predicted): (Vec<usize>, Vec<usize>) = ballots
        .iter()
        .zip(labels)
        .filter(|(ballot, _)| ballot.cast > 0)
        .map(|(ballot, &label)| (label, argmax(&ballot.votes)))
        .unzip();

    if actual.is_empty() {
        return Err(RfError::OobEvaluationFailed {
            reason: "every row was drawn into every bootstrap".to_string(),
        });
    }

    let confusion_matrix = ConfusionMatrix::from_labels(&actual, &predicted, n_classes)?;
    Ok(OobScore {
        accuracy: confusion_matrix.accuracy(),
        n_oob_samples: actual.len(),
        confusion_matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DecisionTreeConfig;

    fn stump() -> DecisionTree {
        let features = vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]];
        DecisionTreeConfig::new().fit(&features, &[0, 0, 1, 1]).unwrap()
    }

    #[test]
    fn in_bag_rows_are_not_scored() {
        let trees = vec![stump(), stump()];
        let features = vec![vec![0.5], vec![10.5], vec![0.2]];
        // Row 2 is mislabelled but in every bag, so it cannot hurt accuracy.
        let score = compute_oob(&trees, &features, &[0, 1, 1], 2, &[vec![0], vec![1]]).unwrap();
        assert_eq!(score.n_oob_samples, 2);
        assert!((score.accuracy - 1.0).abs() < f64::EPSILON);
        assert_eq!(score.confusion_matrix.total(), 2);
    }

    #[test]
    fn no_out_of_bag_rows() {
        let err = compute_oob(&[stump()], &[vec![0.5]], &[0], 2, &[vec![]]).unwrap_err();
        assert!(matches!(err, RfError::OobEvaluationFailed { .. }));
    }
}
