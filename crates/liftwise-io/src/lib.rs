//! Sensor CSV reading, cleaning, artifact writing, plots and report output.

mod clean;
mod domain;
mod error;
mod plot;
mod reader;
mod report;
mod schema;
mod summary;
mod writer;

pub use clean::{CleanReport, Cleaner, project};
pub use domain::{
    ClassLabels, CleanDataset, ExperimentName, Observation, ScoringSet, SensorTable, Target,
};
pub use error::IoError;
pub use plot::{ConfusionHeatmap, ImportanceChart};
pub use reader::SensorReader;
pub use report::{ReportContext, ReportWriter};
pub use schema::{ColumnRole, SensorLocation};
pub use summary::{
    ClassMetricRow, ClassProbability, EvaluationSummary, ImportanceRow, ModelSummary,
    PredictionRow,
};
pub use writer::ResultWriter;
