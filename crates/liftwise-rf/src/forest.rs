//! Bagged ensembles of [`DecisionTree`]s, grown on the rayon pool.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::data;
use crate::error::RfError;
use crate::fit::ForestFit;
use crate::importance::rank_importances;
use crate::oob::compute_oob;
use crate::tree::{DecisionTree, DecisionTreeConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) feature_names: Vec<String>,
}

impl RandomForest {
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Per-column impurity decrease over all trees, scaled to sum to 1.
    /// See [`ForestFit::importances`] for the ranked form.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let summed = self.trees.iter().fold(vec![0.0; self.n_features], |mut acc, tree| {
            acc.iter_mut()
                .zip(tree.feature_importances())
                .for_each(|(a, v)| *a += v);
            acc
        });
        let total: f64 = summed.iter().sum();
        if total > 0.0 {
            summed.into_iter().map(|v| v / total).collect()
        } else {
            summed
        }
    }
}

/// A tree plus the training rows its bootstrap missed.
struct GrownTree {
    tree: DecisionTree,
    out_of_bag: Vec<usize>,
}

/// Draw `draw_count` rows with replacement, fit one tree on them.
fn grow_one(
    template: &DecisionTreeConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    draw_count: usize,
    seed: u64,
) -> Result<GrownTree, RfError> {
    let n = features.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut drawn = vec![false; n];
    let bag: Vec<usize> = (0..draw_count)
        .map(|_| {
            let row = rng.gen_range(0..n);
            drawn[row] = true;
            row
        })
        .collect();

    let tree = template
        .clone()
        .with_seed(rng.r#gen())
        .fit(&data::gather(features, &bag), &data::gather(labels, &bag))?;
    let out_of_bag = drawn
        .iter()
        .enumerate()
        .filter_map(|(row, &hit)| (!hit).then_some(row))
        .collect();
    Ok(GrownTree { tree, out_of_bag })
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
) -> Result<ForestFit, RfError> {
    let shape = data::validate(features, labels, config.growth.n_classes)?;
    let max_features = config.max_features.resolve(shape.n_features)?;
    let fraction = config.bootstrap_fraction;
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(RfError::InvalidBootstrapFraction { fraction });
    }
    let draw_count = (shape.n_samples as f64 * fraction).ceil() as usize;
    info!(
        n_features = shape.n_features,
        n_classes = shape.n_classes,
        max_features,
        draw_count,
        "growing random forest"
    );

    // One seed per tree, fixed before any tree is scheduled.
    let mut seeder = ChaCha8Rng::seed_from_u64(config.growth.seed);
    let seeds: Vec<u64> = (0..config.n_trees).map(|_| seeder.r#gen()).collect();
    let template = config
        .growth
        .clone()
        .with_max_features(Some(max_features))
        .with_n_classes(Some(shape.n_classes));

    let grown: Vec<GrownTree> = seeds
        .into_par_iter()
        .map(|seed| grow_one(&template, features, labels, draw_count, seed))
        .collect::<Result<_, _>>()?;

    let n_trees = grown.len() as f64;
    debug!(
        mean_depth = grown.iter().map(|g| g.tree.depth()).sum::<usize>() as f64 / n_trees,
        mean_leaves = grown.iter().map(|g| g.tree.n_leaves()).sum::<usize>() as f64 / n_trees,
        "trees grown"
    );

    let (trees, out_of_bag): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        grown.into_iter().map(|g| (g.tree, g.out_of_bag)).unzip();
    let oob = if config.oob_mode == OobMode::Enabled {
        Some(compute_oob(&trees, features, labels, shape.n_classes, &out_of_bag)?)
    } else {
        None
    };

    let forest = RandomForest {
        trees,
        n_features: shape.n_features,
        n_classes: shape.n_classes,
        feature_names: feature_names.to_vec(),
    };
    let importances = rank_importances(&forest.feature_importances(), feature_names);
    info!(oob_accuracy = oob.as_ref().map(|s| s.accuracy), "random forest ready");

    Ok(ForestFit {
        forest,
        importances,
        oob,
        max_features,
        draw_count,
    })
}
