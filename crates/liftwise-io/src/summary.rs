//! Plain summary records handed to the writer, plots and report.
//!
//! The binary fills these from model results so this crate stays free of any
//! dependency on `liftwise-rf`.

use serde::Serialize;

use crate::clean::CleanReport;

/// Per-class validation metrics, keyed by class name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetricRow {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
    pub support: usize,
}

/// One ranked predictor importance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceRow {
    pub name: String,
    pub importance: f64,
    /// 1-based, 1 = most important.
    pub rank: usize,
}

/// Cross-validation and validation results of one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Display name, e.g. `"random forest"`.
    pub kind: String,
    pub cv_fold_accuracies: Vec<f64>,
    pub cv_mean_accuracy: f64,
    pub cv_std_accuracy: f64,
    pub validation_accuracy: f64,
    pub out_of_sample_error: f64,
    pub validation_kappa: f64,
    /// Out-of-bag accuracy of the model refit on the train partition, forests only.
    pub oob_accuracy: Option<f64>,
    /// Validation confusion matrix, rows = actual, columns = predicted.
    pub confusion_matrix: Vec<Vec<usize>>,
    pub class_metrics: Vec<ClassMetricRow>,
    pub importances: Vec<ImportanceRow>,
}

/// Everything the evaluation stage produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub training_file: String,
    pub seed: u64,
    pub cleaning: CleanReport,
    pub class_names: Vec<String>,
    /// Cleaned row count per class, in `class_names` order.
    pub class_counts: Vec<usize>,
    pub n_train: usize,
    pub n_validation: usize,
    pub cv_folds: usize,
    pub models: Vec<ModelSummary>,
    /// `kind` of the model chosen for prediction.
    pub chosen_model: String,
}

impl EvaluationSummary {
    /// Return the summary of the chosen model.
    #[must_use]
    pub fn chosen(&self) -> Option<&ModelSummary> {
        self.models.iter().find(|m| m.kind == self.chosen_model)
    }
}

/// A predicted class with its probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub class: String,
    pub probability: f64,
}

/// Prediction for one scoring row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRow {
    /// Problem id of the row.
    pub key: String,
    pub predicted_class: String,
    /// Probability of `predicted_class`.
    pub probability: f64,
    /// Most probable classes first; may be empty.
    pub top_k: Vec<ClassProbability>,
}
