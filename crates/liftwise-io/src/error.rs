//! Failures of reading, cleaning and artifact output.
//!
//! Row indices count data rows from zero, header excluded.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    // Reading
    #[error("cannot open {path}")]
    FileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV in {path} near byte {offset}")]
    CsvParse {
        path: PathBuf,
        offset: u64,
        source: csv::Error,
    },

    #[error("{path} has a header but no data rows")]
    EmptyDataset { path: PathBuf },

    #[error("{path}: row {row_index} has {got} fields, the header has {expected}")]
    InconsistentRowLength {
        path: PathBuf,
        row_index: usize,
        expected: usize,
        got: usize,
    },

    #[error("{path}: column \"{column}\" appears twice in the header")]
    DuplicateColumn { path: PathBuf, column: String },

    #[error("{path}: required column \"{column}\" is absent")]
    MissingColumn { path: PathBuf, column: String },

    /// Neither `classe` (training) nor `problem_id` (testing) is present.
    #[error("{path} has neither a classe nor a problem_id column")]
    NoTargetColumn { path: PathBuf },

    /// A sensor or window cell that is neither a number nor a missing marker.
    #[error("{path}: row {row_index}, column \"{column}\" holds unparseable \"{raw}\"")]
    InvalidCell {
        path: PathBuf,
        row_index: usize,
        column: String,
        raw: String,
    },

    #[error("{path}: row {row_index} has an empty classe")]
    MissingLabel { path: PathBuf, row_index: usize },

    // Cleaning and projection
    #[error("{path} has no classe labels to train on")]
    UnlabeledTable { path: PathBuf },

    #[error("missing-value threshold {threshold} is outside [0, 1]")]
    InvalidMissingThreshold { threshold: f64 },

    #[error("cleaning {path} left no predictor columns")]
    NoPredictors { path: PathBuf },

    #[error("cleaning {path} left no complete rows")]
    NoCompleteRows { path: PathBuf },

    /// A row to score lacks a predictor the model was trained on.
    #[error("{path}: row {row_index} has no value for predictor \"{column}\"")]
    MissingPredictorValue {
        path: PathBuf,
        row_index: usize,
        column: String,
    },

    // Output
    #[error("experiment name \"{name}\" may only use letters, digits, '_' and '-'")]
    InvalidExperimentName { name: String },

    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot encode {path} as JSON")]
    SerializeJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("nothing to plot for {what}")]
    EmptyPlot { what: &'static str },

    #[error("cannot render plot to {path}")]
    RenderPlot {
        path: PathBuf,
        source: image::ImageError,
    },
}
