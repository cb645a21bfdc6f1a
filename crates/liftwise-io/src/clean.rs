//! Row and column filtering that turns a sensor table into model input.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::IoError;
use crate::domain::{ClassLabels, CleanDataset, ScoringSet, SensorTable, Target};

/// What cleaning removed, for the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub n_rows_read: usize,
    pub n_boundary_rows_dropped: usize,
    pub n_incomplete_rows_dropped: usize,
    pub n_rows_kept: usize,
    pub n_housekeeping_columns_dropped: usize,
    pub n_sensor_columns: usize,
    /// Columns whose missing fraction exceeded the threshold.
    pub sparse_columns_dropped: Vec<String>,
    /// Columns removed by the near-zero-variance rule.
    pub near_zero_variance_dropped: Vec<String>,
    pub n_predictors: usize,
    /// Predictor count per sensor location, in location order.
    pub predictors_by_location: Vec<(String, usize)>,
}

/// Builder for the cleaning pass.
///
/// # Defaults
///
/// | Parameter            | Default |
/// |----------------------|---------|
/// | `missing_threshold`  | 0.95    |
/// | `near_zero_variance` | false   |
/// | `keep_boundary_rows` | false   |
#[derive(Debug, Clone)]
pub struct Cleaner {
    missing_threshold: f64,
    near_zero_variance: bool,
    keep_boundary_rows: bool,
}

/// caret's `nearZeroVar` cut-offs.
const NZV_FREQ_RATIO: f64 = 95.0 / 5.0;
const NZV_UNIQUE_PERCENT: f64 = 10.0;

impl Cleaner {
    /// Create a cleaner with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            missing_threshold: 0.95,
            near_zero_variance: false,
            keep_boundary_rows: false,
        }
    }

    /// Drop a column when its missing fraction is strictly above `threshold`.
    #[must_use]
    pub fn with_missing_threshold(mut self, threshold: f64) -> Self {
        self.missing_threshold = threshold;
        self
    }

    /// Also drop near-zero-variance columns.
    #[must_use]
    pub fn with_near_zero_variance(mut self, enabled: bool) -> Self {
        self.near_zero_variance = enabled;
        self
    }

    /// Keep window-boundary summary rows instead of dropping them.
    #[must_use]
    pub fn with_keep_boundary_rows(mut self, keep: bool) -> Self {
        self.keep_boundary_rows = keep;
        self
    }

    /// Return the missing-fraction threshold.
    #[must_use]
    pub fn missing_threshold(&self) -> f64 {
        self.missing_threshold
    }

    /// Clean a labeled sensor table.
    ///
    /// Drops boundary rows, housekeeping columns, sparse columns (and
    /// near-zero-variance columns when enabled), then any row still missing
    /// a predictor. Labels are encoded in sorted class-name order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::InvalidMissingThreshold`] | threshold outside [0.0, 1.0] |
    /// | [`IoError::UnlabeledTable`] | the table has no `classe` column |
    /// | [`IoError::NoPredictors`] | every sensor column was dropped |
    /// | [`IoError::NoCompleteRows`] | no row survives |
    #[instrument(skip_all, fields(path = %table.path().display(), n_rows = table.n_rows()))]
    pub fn clean(&self, table: &SensorTable) -> Result<CleanDataset, IoError> {
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            return Err(IoError::InvalidMissingThreshold {
                threshold: self.missing_threshold,
            });
        }
        if !table.is_labeled() {
            return Err(IoError::UnlabeledTable {
                path: table.path().to_path_buf(),
            });
        }

        let rows: Vec<_> = table
            .observations()
            .iter()
            .filter(|o| self.keep_boundary_rows || !o.window_boundary)
            .collect();
        let n_boundary_rows_dropped = table.n_rows() - rows.len();
        if rows.is_empty() {
            return Err(IoError::NoCompleteRows {
                path: table.path().to_path_buf(),
            });
        }

        let names = table.sensor_names();
        let mut sparse_columns_dropped = Vec::new();
        let mut near_zero_variance_dropped = Vec::new();
        let mut kept_columns = Vec::new();
        for (j, name) in names.iter().enumerate() {
            let column: Vec<Option<f64>> = rows.iter().map(|o| o.readings[j]).collect();
            let n_missing = column.iter().filter(|v| v.is_none()).count();
            let missing_fraction = n_missing as f64 / rows.len() as f64;
            if missing_fraction > self.missing_threshold {
                sparse_columns_dropped.push(name.clone());
                continue;
            }
            if self.near_zero_variance && is_near_zero_variance(column.iter().flatten().copied()) {
                near_zero_variance_dropped.push(name.clone());
                continue;
            }
            kept_columns.push(j);
        }
        debug!(
            n_sparse = sparse_columns_dropped.len(),
            n_nzv = near_zero_variance_dropped.len(),
            n_kept = kept_columns.len(),
            "column filter applied"
        );

        if kept_columns.is_empty() {
            return Err(IoError::NoPredictors {
                path: table.path().to_path_buf(),
            });
        }

        let mut features = Vec::with_capacity(rows.len());
        let mut raw_labels = Vec::with_capacity(rows.len());
        let mut subjects = Vec::with_capacity(rows.len());
        let mut n_incomplete_rows_dropped = 0;
        for obs in &rows {
            let values: Option<Vec<f64>> = kept_columns.iter().map(|&j| obs.readings[j]).collect();
            let (Some(values), Target::Classe(label)) = (values, &obs.target) else {
                n_incomplete_rows_dropped += 1;
                continue;
            };
            features.push(values);
            raw_labels.push(label.as_str());
            subjects.push(obs.subject.clone());
        }
        if n_incomplete_rows_dropped > 0 {
            warn!(
                n_incomplete_rows_dropped,
                "dropped rows with a missing predictor value"
            );
        }
        if features.is_empty() {
            return Err(IoError::NoCompleteRows {
                path: table.path().to_path_buf(),
            });
        }

        let class_labels = ClassLabels::from_names(raw_labels.iter().copied());
        let labels = raw_labels
            .iter()
            .filter_map(|l| class_labels.encode(l))
            .collect();

        let predictor_names: Vec<String> = kept_columns.iter().map(|&j| names[j].clone()).collect();
        let mut by_location: HashMap<_, usize> = HashMap::new();
        for &j in &kept_columns {
            *by_location.entry(table.sensor_locations()[j]).or_default() += 1;
        }
        let mut predictors_by_location: Vec<_> = by_location.into_iter().collect();
        predictors_by_location.sort_unstable();

        let report = CleanReport {
            n_rows_read: table.n_rows(),
            n_boundary_rows_dropped,
            n_incomplete_rows_dropped,
            n_rows_kept: features.len(),
            n_housekeeping_columns_dropped: table.n_housekeeping_columns(),
            n_sensor_columns: names.len(),
            sparse_columns_dropped,
            near_zero_variance_dropped,
            n_predictors: predictor_names.len(),
            predictors_by_location: predictors_by_location
                .into_iter()
                .map(|(loc, n)| (loc.to_string(), n))
                .collect(),
        };

        info!(
            n_rows = report.n_rows_kept,
            n_predictors = report.n_predictors,
            n_classes = class_labels.len(),
            "sensor table cleaned"
        );

        Ok(CleanDataset {
            predictor_names,
            features,
            labels,
            class_labels,
            subjects,
            report,
        })
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// caret's rule: a single distinct value, or a dominant value (most common
/// over second most common above 95/5) together with few distinct values
/// (under 10 % of the sample count).
fn is_near_zero_variance(values: impl Iterator<Item = f64>) -> bool {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    let mut n = 0usize;
    for v in values {
        // -0.0 and 0.0 are one value.
        let key = if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        *counts.entry(key).or_default() += 1;
        n += 1;
    }
    if counts.len() <= 1 {
        return true;
    }
    let mut freq: Vec<usize> = counts.values().copied().collect();
    freq.sort_unstable_by(|a, b| b.cmp(a));
    let freq_ratio = freq[0] as f64 / freq[1] as f64;
    let unique_percent = 100.0 * counts.len() as f64 / n as f64;
    freq_ratio > NZV_FREQ_RATIO && unique_percent < NZV_UNIQUE_PERCENT
}

/// Project `table` onto `predictor_names`, in that order.
///
/// Every row is kept. Rows are keyed by problem id, or by row id for
/// labeled tables.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::MissingColumn`] | a predictor is not a column of `table` |
/// | [`IoError::MissingPredictorValue`] | a row has no value for a predictor |
#[instrument(skip_all, fields(path = %table.path().display(), n_predictors = predictor_names.len()))]
pub fn project(table: &SensorTable, predictor_names: &[String]) -> Result<ScoringSet, IoError> {
    let columns = predictor_names
        .iter()
        .map(|name| {
            table.sensor_index(name).ok_or_else(|| IoError::MissingColumn {
                path: table.path().to_path_buf(),
                column: name.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut keys = Vec::with_capacity(table.n_rows());
    let mut features = Vec::with_capacity(table.n_rows());
    for (row_index, obs) in table.observations().iter().enumerate() {
        let row = columns
            .iter()
            .zip(predictor_names)
            .map(|(&j, name)| {
                obs.readings[j].ok_or_else(|| IoError::MissingPredictorValue {
                    path: table.path().to_path_buf(),
                    row_index,
                    column: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        keys.push(match &obs.target {
            Target::ProblemId(id) => id.clone(),
            Target::Classe(_) => obs.row_id.clone(),
        });
        features.push(row);
    }

    info!(n_rows = features.len(), "scoring set projected");
    Ok(ScoringSet { keys, features })
}
