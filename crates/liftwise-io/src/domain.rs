//! Domain types for liftwise-io.

use std::path::{Path, PathBuf};

use crate::IoError;
use crate::clean::CleanReport;
use crate::schema::SensorLocation;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The target column of a row: a training label or a scoring key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Classe(String),
    ProblemId(String),
}

/// One CSV row.
///
/// `readings[j]` belongs to `SensorTable::sensor_names()[j]`; `None` marks a
/// missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Row-index cell, or the zero-based data row number when the column is absent.
    pub row_id: String,
    /// Participant performing the lift; empty when the column is absent.
    pub subject: String,
    /// `true` for window-boundary summary rows (`new_window == "yes"`).
    pub window_boundary: bool,
    /// Window number, when present and numeric.
    pub window_number: Option<u32>,
    pub target: Target,
    pub readings: Vec<Option<f64>>,
}

/// A parsed sensor CSV file.
///
/// Produced by [`SensorReader`](crate::SensorReader).
#[derive(Debug, Clone)]
pub struct SensorTable {
    path: PathBuf,
    n_housekeeping_columns: usize,
    sensor_names: Vec<String>,
    sensor_locations: Vec<SensorLocation>,
    observations: Vec<Observation>,
    labeled: bool,
}

impl SensorTable {
    pub(crate) fn new(
        path: PathBuf,
        n_housekeeping_columns: usize,
        sensor_names: Vec<String>,
        observations: Vec<Observation>,
        labeled: bool,
    ) -> Self {
        let sensor_locations = sensor_names
            .iter()
            .map(|n| SensorLocation::from_column(n))
            .collect();
        Self {
            path,
            n_housekeeping_columns,
            sensor_names,
            sensor_locations,
            observations,
            labeled,
        }
    }

    /// Return the file this table was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the sensor column names in file order.
    #[must_use]
    pub fn sensor_names(&self) -> &[String] {
        &self.sensor_names
    }

    /// Return the location of each sensor column.
    #[must_use]
    pub fn sensor_locations(&self) -> &[SensorLocation] {
        &self.sensor_locations
    }

    /// Return the number of non-sensor columns (index, subject, time, window, target).
    #[must_use]
    pub fn n_housekeeping_columns(&self) -> usize {
        self.n_housekeeping_columns
    }

    /// Return the parsed rows.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// `true` when rows carry `classe` labels rather than problem ids.
    #[must_use]
    pub fn is_labeled(&self) -> bool {
        self.labeled
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.observations.len()
    }

    /// Return the index of a sensor column by name.
    #[must_use]
    pub fn sensor_index(&self, name: &str) -> Option<usize> {
        self.sensor_names.iter().position(|n| n == name)
    }
}

/// Mapping between class names and zero-based class indices, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    /// Build from any collection of names; duplicates collapse.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort_unstable();
        names.dedup();
        Self { names }
    }

    /// Return the class index of `name`.
    #[must_use]
    pub fn encode(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    /// Return the class name of `index`.
    #[must_use]
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Return all class names in index order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Return the number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` when there are no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Model-ready training data produced by [`Cleaner`](crate::Cleaner).
///
/// `features[i]`, `labels[i]` and `subjects[i]` describe the same row.
#[derive(Debug, Clone)]
pub struct CleanDataset {
    pub predictor_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub class_labels: ClassLabels,
    pub subjects: Vec<String>,
    /// What cleaning removed to get here.
    pub report: CleanReport,
}

impl CleanDataset {
    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Return the number of predictor columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.predictor_names.len()
    }

    /// Count rows per class, in class index order.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_labels.len()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Unlabeled rows projected onto a model's predictor columns.
#[derive(Debug, Clone)]
pub struct ScoringSet {
    /// Problem id, or row id for tables without one, per row.
    pub keys: Vec<String>,
    pub features: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_name_valid() {
        let name = ExperimentName::new("pml-run_01".to_string()).unwrap();
        assert_eq!(name.as_str(), "pml-run_01");
        assert_eq!(name.to_string(), "pml-run_01");
    }

    #[test]
    fn experiment_name_rejects_empty() {
        let name = ExperimentName::new(String::new());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn experiment_name_rejects_special_chars() {
        let name = ExperimentName::new("../escape".to_string());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn class_labels_sorted_and_deduplicated() {
        let labels = ClassLabels::from_names(["C", "A", "E", "A", "B", "D"]);
        assert_eq!(labels.names(), &["A", "B", "C", "D", "E"]);
        assert_eq!(labels.encode("C"), Some(2));
        assert_eq!(labels.encode("F"), None);
        assert_eq!(labels.decode(4), Some("E"));
        assert_eq!(labels.decode(5), None);
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn class_counts_by_index() {
        let ds = CleanDataset {
            predictor_names: vec!["roll_belt".into()],
            features: vec![vec![1.0], vec![2.0], vec![3.0]],
            labels: vec![1, 0, 1],
            class_labels: ClassLabels::from_names(["A", "B"]),
            subjects: vec!["carlitos".into(); 3],
            report: CleanReport::default(),
        };
        assert_eq!(ds.class_counts(), vec![1, 2]);
        assert_eq!(ds.n_features(), 1);
    }
}
