//! Markdown report rendering.

use std::fs;
use std::path::Path;

use tracing::{info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;
use crate::summary::{EvaluationSummary, ModelSummary, PredictionRow};

/// Inputs of one report.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub evaluation: &'a EvaluationSummary,
    pub testing_file: &'a str,
    pub predictions: &'a [PredictionRow],
    /// Image files, linked by file name relative to the report.
    pub importance_plot: Option<&'a Path>,
    pub confusion_plot: Option<&'a Path>,
    /// Text rendering of the fitted decision tree.
    pub tree_rules: Option<&'a str>,
}

/// Renders `{experiment}_report.md`.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    experiment: ExperimentName,
    top_importances: usize,
}

impl ReportWriter {
    #[must_use]
    pub fn new(experiment: ExperimentName) -> Self {
        Self {
            experiment,
            top_importances: 20,
        }
    }

    /// Number of importance rows in the table (default 20).
    #[must_use]
    pub fn with_top_importances(mut self, n: usize) -> Self {
        self.top_importances = n;
        self
    }

    /// Render the report as Markdown.
    #[must_use]
    pub fn render(&self, ctx: &ReportContext<'_>) -> String {
        let eval = ctx.evaluation;
        let mut out = format!("# Lifting technique classification: {}\n\n", self.experiment);
        out.push_str(&format!(
            "Models are trained on `{}` and applied to `{}`. Seed {}.\n\n",
            eval.training_file, ctx.testing_file, eval.seed
        ));

        out.push_str(&data_section(eval));
        out.push_str(&cleaning_section(eval));
        out.push_str(&cv_section(eval));
        out.push_str(&validation_section(eval));

        if let Some(chosen) = eval.chosen() {
            out.push_str(&confusion_section(chosen, &eval.class_names, ctx.confusion_plot));
            out.push_str(&class_metrics_section(chosen));
            out.push_str(&self.importance_section(chosen, ctx.importance_plot));
        }

        if let Some(rules) = ctx.tree_rules {
            out.push_str("## Decision tree\n\n```text\n");
            out.push_str(rules.trim_end());
            out.push_str("\n```\n\n");
        }

        out.push_str(&predictions_section(ctx.predictions));
        out
    }

    /// Render the report and write it to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn write(&self, ctx: &ReportContext<'_>, path: &Path) -> Result<(), IoError> {
        let text = self.render(ctx);
        fs::write(path, &text).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(bytes = text.len(), "report written");
        Ok(())
    }

    fn importance_section(&self, model: &ModelSummary, plot: Option<&Path>) -> String {
        let mut out = format!("## Variable importance ({})\n\n", model.kind);
        out.push_str("| Rank | Predictor | Importance |\n|---:|---|---:|\n");
        let mut rows: Vec<_> = model.importances.iter().collect();
        rows.sort_by_key(|r| r.rank);
        for row in rows.iter().take(self.top_importances) {
            out.push_str(&format!(
                "| {} | `{}` | {:.4} |\n",
                row.rank, row.name, row.importance
            ));
        }
        out.push('\n');
        out.push_str(&image_link("Variable importance", plot));
        out
    }
}

fn pct(x: f64) -> String {
    format!("{:.2}%", 100.0 * x)
}

fn image_link(alt: &str, plot: Option<&Path>) -> String {
    match plot.and_then(Path::file_name) {
        Some(name) => format!("![{alt}]({})\n\n", name.to_string_lossy()),
        None => String::new(),
    }
}

fn data_section(eval: &EvaluationSummary) -> String {
    let c = &eval.cleaning;
    let mut out = String::from("## Data\n\n");
    out.push_str(&format!(
        "- rows read: {}\n- window-boundary rows dropped: {}\n- incomplete rows dropped: {}\n- rows used: {}\n- train / validation partition: {} / {}\n\n",
        c.n_rows_read,
        c.n_boundary_rows_dropped,
        c.n_incomplete_rows_dropped,
        c.n_rows_kept,
        eval.n_train,
        eval.n_validation
    ));
    out.push_str("| Classe | Rows |\n|---|---:|\n");
    for (name, count) in eval.class_names.iter().zip(&eval.class_counts) {
        out.push_str(&format!("| {name} | {count} |\n"));
    }
    out.push('\n');
    out
}

fn cleaning_section(eval: &EvaluationSummary) -> String {
    let c = &eval.cleaning;
    let mut out = String::from("## Cleaning\n\n");
    out.push_str(&format!(
        "- housekeeping columns dropped: {}\n- sensor columns: {}\n- mostly-missing columns dropped: {}\n- near-zero-variance columns dropped: {}\n- predictors kept: {}\n\n",
        c.n_housekeeping_columns_dropped,
        c.n_sensor_columns,
        c.sparse_columns_dropped.len(),
        c.near_zero_variance_dropped.len(),
        c.n_predictors
    ));
    if !c.predictors_by_location.is_empty() {
        out.push_str("| Sensor | Predictors |\n|---|---:|\n");
        for (location, n) in &c.predictors_by_location {
            out.push_str(&format!("| {location} | {n} |\n"));
        }
        out.push('\n');
    }
    out
}

fn cv_section(eval: &EvaluationSummary) -> String {
    let mut out = format!(
        "## Cross-validation\n\n{}-fold stratified cross-validation on the training partition.\n\n",
        eval.cv_folds
    );
    out.push_str("| Model | Mean accuracy | Std | Estimated error | Fold accuracies |\n");
    out.push_str("|---|---:|---:|---:|---|\n");
    for m in &eval.models {
        let folds: Vec<String> = m.cv_fold_accuracies.iter().map(|a| format!("{a:.3}")).collect();
        out.push_str(&format!(
            "| {} | {} | {:.4} | {} | {} |\n",
            m.kind,
            pct(m.cv_mean_accuracy),
            m.cv_std_accuracy,
            pct(1.0 - m.cv_mean_accuracy),
            folds.join(", ")
        ));
    }
    out.push('\n');
    out
}

fn validation_section(eval: &EvaluationSummary) -> String {
    let mut out = format!(
        "## Validation\n\nBoth models refit on the training partition and scored on the {} held-out rows.\n\n",
        eval.n_validation
    );
    out.push_str(
        "| Model | Accuracy | Out-of-sample error | Kappa | OOB accuracy |\n|---|---:|---:|---:|---:|\n",
    );
    for m in &eval.models {
        let oob = m.oob_accuracy.map_or_else(|| "n/a".to_string(), pct);
        out.push_str(&format!(
            "| {} | {} | {} | {:.3} | {oob} |\n",
            m.kind,
            pct(m.validation_accuracy),
            pct(m.out_of_sample_error),
            m.validation_kappa
        ));
    }
    out.push_str(&format!(
        "\nChosen model: **{}**.\n\n",
        eval.chosen_model
    ));
    out
}

fn confusion_section(model: &ModelSummary, class_names: &[String], plot: Option<&Path>) -> String {
    let mut out = format!(
        "## Confusion matrix ({})\n\nRows are actual classes, columns predicted.\n\n| |",
        model.kind
    );
    for name in class_names {
        out.push_str(&format!(" {name} |"));
    }
    out.push_str("\n|---|");
    out.push_str(&"---:|".repeat(class_names.len()));
    out.push('\n');
    for (name, row) in class_names.iter().zip(&model.confusion_matrix) {
        out.push_str(&format!("| **{name}** |"));
        for count in row {
            out.push_str(&format!(" {count} |"));
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&image_link("Confusion matrix", plot));
    out
}

fn class_metrics_section(model: &ModelSummary) -> String {
    let mut out = String::from(
        "## Per-class metrics\n\n| Classe | Precision | Recall | Specificity | F1 | Support |\n|---|---:|---:|---:|---:|---:|\n",
    );
    for m in &model.class_metrics {
        out.push_str(&format!(
            "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {} |\n",
            m.class, m.precision, m.recall, m.specificity, m.f1, m.support
        ));
    }
    out.push('\n');
    out
}

fn predictions_section(predictions: &[PredictionRow]) -> String {
    let mut out = String::from("## Test-set predictions\n\n");
    if predictions.is_empty() {
        out.push_str("No test rows were scored.\n");
        return out;
    }
    out.push_str("| Problem id | Predicted | Probability |\n|---|---|---:|\n");
    for p in predictions {
        out.push_str(&format!(
            "| {} | {} | {:.3} |\n",
            p.key, p.predicted_class, p.probability
        ));
    }
    out
}
