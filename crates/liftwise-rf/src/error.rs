//! Error type shared by every fitting, scoring and persistence path.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RfError {
    // Hyperparameters
    #[error("a forest needs at least one tree, got n_trees = {n_trees}")]
    InvalidTreeCount { n_trees: usize },

    #[error("max_depth of {max_depth} is below the minimum of 1")]
    InvalidMaxDepth { max_depth: usize },

    #[error("min_samples_split of {min_samples_split} is below the minimum of 2")]
    InvalidMinSamplesSplit { min_samples_split: usize },

    #[error("min_samples_leaf of {min_samples_leaf} is below the minimum of 1")]
    InvalidMinSamplesLeaf { min_samples_leaf: usize },

    /// The resolved per-split feature count, not the strategy that produced it.
    #[error("{max_features} candidate features per split is outside [1, {n_features}]")]
    InvalidMaxFeatures {
        max_features: usize,
        n_features: usize,
    },

    #[error("complexity parameter {complexity} is negative or not finite")]
    InvalidComplexity { complexity: f64 },

    #[error("bootstrap fraction {fraction} is outside (0, 1]")]
    InvalidBootstrapFraction { fraction: f64 },

    #[error("holdout train fraction {fraction} is outside (0, 1)")]
    InvalidTrainFraction { fraction: f64 },

    #[error("cross-validation needs at least 2 folds, got {n_folds}")]
    InvalidFoldCount { n_folds: usize },

    // Training data
    #[error("no observations to train on")]
    EmptyDataset,

    #[error("observations have no predictor columns")]
    ZeroFeatures,

    #[error("{n_features_rows} predictor rows but {n_labels} labels")]
    LabelCountMismatch {
        n_features_rows: usize,
        n_labels: usize,
    },

    #[error("row {sample_index}: label {label} not below the {n_classes} declared classes")]
    LabelOutOfRange {
        sample_index: usize,
        label: usize,
        n_classes: usize,
    },

    #[error("row {sample_index}: {got} predictors, expected {expected}")]
    FeatureCountMismatch {
        expected: usize,
        got: usize,
        sample_index: usize,
    },

    #[error("row {sample_index}: predictor {feature_index} is NaN or infinite")]
    NonFiniteValue {
        sample_index: usize,
        feature_index: usize,
    },

    /// A class too small to land on both sides of a stratified split.
    #[error("class {class} has {count} rows, a stratified split needs {required}")]
    TooFewSamplesForSplit {
        class: usize,
        count: usize,
        required: usize,
    },

    // Scoring
    #[error("row to score has {got} predictors, the model expects {expected}")]
    PredictionFeatureMismatch { expected: usize, got: usize },

    #[error("out-of-bag scoring impossible: {reason}")]
    OobEvaluationFailed { reason: String },

    #[error("{n_names} class names supplied for a model over {n_classes} classes")]
    ClassNameMismatch { n_classes: usize, n_names: usize },

    // Model files
    #[error("could not encode model")]
    SerializeModel { source: Box<bincode::ErrorKind> },

    #[error("could not decode model file {path}")]
    DeserializeModel {
        path: PathBuf,
        source: Box<bincode::ErrorKind>,
    },

    #[error("could not write model file {path}")]
    WriteModel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a liftwise model file")]
    NotAModelFile { path: PathBuf },

    #[error("could not read model file {path}")]
    ReadModel {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file was written by a build with a different model layout.
    #[error("model file {path} has format version {found}, this build reads {expected}")]
    IncompatibleModelVersion {
        expected: u32,
        found: u32,
        path: PathBuf,
    },
}
