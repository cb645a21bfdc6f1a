//! Sensor CSV reader with full input validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{Observation, SensorTable, Target};
use crate::schema::{ColumnRole, parse_reading};

/// Reads a lifting-sensor CSV file (training or testing layout).
///
/// Expected CSV format:
/// - header row, optionally led by an unnamed or `X` row-index column
/// - a `new_window` column (`yes` / `no`)
/// - a `classe` column (training) or a `problem_id` column (testing)
/// - any number of sensor columns; `NA`, empty and `#DIV/0!` cells are missing
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::DuplicateColumn`] | A header name appears twice |
/// | [`IoError::MissingColumn`] | No `new_window` column |
/// | [`IoError::NoTargetColumn`] | Neither `classe` nor `problem_id` |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidCell`] | Unparseable sensor, window flag or window number |
/// | [`IoError::MissingLabel`] | Empty `classe` cell |
pub struct SensorReader {
    path: PathBuf,
}

/// Column positions resolved from the header.
struct Layout {
    row_index: Option<usize>,
    subject: Option<usize>,
    window_flag: usize,
    window_number: Option<usize>,
    label: Option<usize>,
    problem_id: Option<usize>,
    sensors: Vec<usize>,
}

impl SensorReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`SensorTable`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<SensorTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets our own InconsistentRowLength check report short rows.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header: Vec<String> = rdr
            .headers()
            .map_err(|e| self.csv_error(e))?
            .iter()
            .map(String::from)
            .collect();
        let expected_cols = header.len();
        let layout = self.layout(&header)?;
        debug!(
            expected_cols,
            n_sensors = layout.sensors.len(),
            labeled = layout.label.is_some(),
            "read CSV header"
        );

        let mut observations = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }
            let cell = |i: usize| record.get(i).unwrap_or("");
            let invalid = |i: usize| IoError::InvalidCell {
                path: self.path.clone(),
                row_index,
                column: header[i].clone(),
                raw: cell(i).to_string(),
            };

            let window_boundary = match cell(layout.window_flag).trim() {
                "yes" => true,
                "no" => false,
                _ => return Err(invalid(layout.window_flag)),
            };
            let window_number = match layout.window_number {
                Some(i) if !cell(i).trim().is_empty() => {
                    Some(cell(i).trim().parse::<u32>().map_err(|_| invalid(i))?)
                }
                _ => None,
            };

            let target = match (layout.label, layout.problem_id) {
                (Some(i), _) => {
                    let label = cell(i).trim();
                    if label.is_empty() {
                        return Err(IoError::MissingLabel {
                            path: self.path.clone(),
                            row_index,
                        });
                    }
                    Target::Classe(label.to_string())
                }
                (None, Some(i)) => Target::ProblemId(cell(i).trim().to_string()),
                (None, None) => {
                    return Err(IoError::NoTargetColumn {
                        path: self.path.clone(),
                    });
                }
            };

            let readings = layout
                .sensors
                .iter()
                .map(|&i| parse_reading(cell(i)).map_err(|_| invalid(i)))
                .collect::<Result<Vec<_>, _>>()?;

            observations.push(Observation {
                row_id: layout
                    .row_index
                    .map_or_else(|| row_index.to_string(), |i| cell(i).to_string()),
                subject: layout.subject.map(cell).unwrap_or_default().to_string(),
                window_boundary,
                window_number,
                target,
                readings,
            });
        }

        if observations.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let n_boundary = observations.iter().filter(|o| o.window_boundary).count();
        info!(
            n_rows = observations.len(),
            n_boundary,
            n_sensors = layout.sensors.len(),
            "sensor table loaded"
        );

        let sensor_names = layout.sensors.iter().map(|&i| header[i].clone()).collect();
        Ok(SensorTable::new(
            self.path.clone(),
            expected_cols - layout.sensors.len(),
            sensor_names,
            observations,
            layout.label.is_some(),
        ))
    }

    fn layout(&self, header: &[String]) -> Result<Layout, IoError> {
        let mut seen = HashSet::new();
        let mut layout = Layout {
            row_index: None,
            subject: None,
            window_flag: usize::MAX,
            window_number: None,
            label: None,
            problem_id: None,
            sensors: Vec::new(),
        };
        let mut window_flag = None;

        for (i, name) in header.iter().enumerate() {
            if !seen.insert(name.as_str()) {
                return Err(IoError::DuplicateColumn {
                    path: self.path.clone(),
                    column: name.clone(),
                });
            }
            match ColumnRole::classify(name, i) {
                ColumnRole::RowIndex => layout.row_index = Some(i),
                ColumnRole::Subject => layout.subject = Some(i),
                ColumnRole::Timestamp => {}
                ColumnRole::WindowFlag => window_flag = Some(i),
                ColumnRole::WindowNumber => layout.window_number = Some(i),
                ColumnRole::Label => layout.label = Some(i),
                ColumnRole::ProblemId => layout.problem_id = Some(i),
                ColumnRole::Sensor(_) => layout.sensors.push(i),
            }
        }

        layout.window_flag = window_flag.ok_or_else(|| IoError::MissingColumn {
            path: self.path.clone(),
            column: "new_window".to_string(),
        })?;
        if layout.label.is_none() && layout.problem_id.is_none() {
            return Err(IoError::NoTargetColumn {
                path: self.path.clone(),
            });
        }
        Ok(layout)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
