//! Where a run's files go, and the two JSON artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;
use crate::summary::{EvaluationSummary, PredictionRow};

/// Every file a run can produce, named `{experiment}_{suffix}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Evaluation,
    Predictions,
    Model,
    ImportancePlot,
    ConfusionPlot,
    Report,
}

impl Artifact {
    fn suffix(self) -> &'static str {
        match self {
            Artifact::Evaluation => "evaluate.json",
            Artifact::Predictions => "predict.json",
            Artifact::Model => "model.bin",
            Artifact::ImportancePlot => "importance.png",
            Artifact::ConfusionPlot => "confusion.png",
            Artifact::Report => "report.md",
        }
    }
}

/// Owns the output directory of one experiment.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Creates `output_dir` and its parents when missing.
    ///
    /// # Errors
    ///
    /// [`IoError::OutputDirCreate`].
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|source| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    #[must_use]
    pub fn experiment(&self) -> &ExperimentName {
        &self.experiment
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// # Errors
    ///
    /// [`IoError::SerializeJson`] or [`IoError::WriteFile`], as for
    /// [`ResultWriter::write_predictions`].
    #[instrument(skip_all, fields(n_models = summary.models.len()))]
    pub fn write_evaluation(&self, summary: &EvaluationSummary) -> Result<PathBuf, IoError> {
        #[derive(Serialize)]
        struct Evaluation<'a> {
            experiment: &'a str,
            #[serde(flatten)]
            summary: &'a EvaluationSummary,
        }

        let path = self.write_json(
            Artifact::Evaluation,
            &Evaluation {
                experiment: self.experiment.as_str(),
                summary,
            },
        )?;
        info!(path = %path.display(), chosen = %summary.chosen_model, "evaluation written");
        Ok(path)
    }

    /// # Errors
    ///
    /// [`IoError::SerializeJson`] or [`IoError::WriteFile`].
    #[instrument(skip_all, fields(n_rows = predictions.len()))]
    pub fn write_predictions(
        &self,
        model_kind: &str,
        predictions: &[PredictionRow],
    ) -> Result<PathBuf, IoError> {
        #[derive(Serialize)]
        struct Predictions<'a> {
            experiment: &'a str,
            model: &'a str,
            n_rows: usize,
            predictions: &'a [PredictionRow],
        }

        let path = self.write_json(
            Artifact::Predictions,
            &Predictions {
                experiment: self.experiment.as_str(),
                model: model_kind,
                n_rows: predictions.len(),
                predictions,
            },
        )?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }

    /// Where the chosen model is saved. Nothing is written here.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.path_of(Artifact::Model)
    }

    #[must_use]
    pub fn importance_plot_path(&self) -> PathBuf {
        self.path_of(Artifact::ImportancePlot)
    }

    #[must_use]
    pub fn confusion_plot_path(&self) -> PathBuf {
        self.path_of(Artifact::ConfusionPlot)
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.path_of(Artifact::Report)
    }

    fn path_of(&self, artifact: Artifact) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}", self.experiment, artifact.suffix()))
    }

    fn write_json(&self, artifact: Artifact, value: &impl Serialize) -> Result<PathBuf, IoError> {
        let path = self.path_of(artifact);
        let json = serde_json::to_string_pretty(value).map_err(|source| IoError::SerializeJson {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| IoError::WriteFile {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::summary::fixtures;

    fn writer(dir: &Path) -> ResultWriter {
        ResultWriter::new(dir, ExperimentName::new("pml".into()).unwrap()).unwrap()
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn paths_share_the_experiment_prefix() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out").join("run1");
        let w = writer(&nested);
        assert!(nested.is_dir());
        assert_eq!(w.output_dir(), nested.as_path());
        assert_eq!(w.experiment().as_str(), "pml");
        assert_eq!(w.model_path(), nested.join("pml_model.bin"));
        assert_eq!(w.report_path(), nested.join("pml_report.md"));
        assert_eq!(w.importance_plot_path(), nested.join("pml_importance.png"));
        assert_eq!(w.confusion_plot_path(), nested.join("pml_confusion.png"));
    }

    #[test]
    fn evaluation_file() {
        let dir = TempDir::new().unwrap();
        let path = writer(dir.path())
            .write_evaluation(&fixtures::evaluation())
            .unwrap();
        assert_eq!(path, dir.path().join("pml_evaluate.json"));

        let content = read_json(&path);
        assert_eq!(content["experiment"], "pml");
        assert_eq!(content["chosen_model"], "random forest");
        assert_eq!(content["class_names"], serde_json::json!(["A", "B"]));
        assert_eq!(content["cleaning"]["n_boundary_rows_dropped"], 2);

        let models = content["models"].as_array().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0]["kind"], "decision tree");
        assert!(models[0]["oob_accuracy"].is_null());
        assert_eq!(models[1]["confusion_matrix"][0][1], 1);
        assert_eq!(models[1]["class_metrics"][1]["class"], "B");
        assert_eq!(models[1]["importances"][0]["name"], "roll_belt");
        assert_eq!(models[1]["validation_kappa"], 0.86);
    }

    #[test]
    fn predictions_file() {
        let dir = TempDir::new().unwrap();
        let path = writer(dir.path())
            .write_predictions("random forest", &fixtures::predictions())
            .unwrap();

        let content = read_json(&path);
        assert_eq!(content["model"], "random forest");
        assert_eq!(content["n_rows"], 1);
        let first = &content["predictions"][0];
        assert_eq!(first["key"], "1");
        assert_eq!(first["predicted_class"], "B");
        assert_eq!(first["top_k"][0]["probability"], 0.75);
    }

    #[test]
    fn output_dir_under_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, "x").unwrap();
        let err = ResultWriter::new(&file.join("sub"), ExperimentName::new("pml".into()).unwrap());
        assert!(matches!(err, Err(IoError::OutputDirCreate { .. })));
    }
}
