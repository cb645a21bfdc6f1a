//! Column roles of the lifting sensor CSV files.

use std::fmt;

/// Body or equipment location a sensor column was recorded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorLocation {
    Belt,
    Arm,
    Forearm,
    Dumbbell,
    Other,
}

impl SensorLocation {
    /// Find the location token among the `_`-separated parts of a column name.
    ///
    /// `gyros_forearm_x` is a forearm column even though it also ends in a
    /// component suffix. A `.N` suffix, added by exporters to repeated header
    /// names (`skewness_roll_belt.1`), is ignored.
    #[must_use]
    pub fn from_column(name: &str) -> Self {
        let name = match name.rsplit_once('.') {
            Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
            _ => name,
        };
        for token in name.split('_') {
            match token {
                "belt" => return SensorLocation::Belt,
                "arm" => return SensorLocation::Arm,
                "forearm" => return SensorLocation::Forearm,
                "dumbbell" => return SensorLocation::Dumbbell,
                _ => {}
            }
        }
        SensorLocation::Other
    }

    /// Return the lower-case name used in column headers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SensorLocation::Belt => "belt",
            SensorLocation::Arm => "arm",
            SensorLocation::Forearm => "forearm",
            SensorLocation::Dumbbell => "dumbbell",
            SensorLocation::Other => "other",
        }
    }
}

impl fmt::Display for SensorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a CSV column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Unnamed leading column or `X`: the row number written by the exporter.
    RowIndex,
    /// `user_name`.
    Subject,
    /// `raw_timestamp_part_1`, `raw_timestamp_part_2`, `cvtd_timestamp`.
    Timestamp,
    /// `new_window`: `yes` marks a window-boundary summary row.
    WindowFlag,
    /// `num_window`.
    WindowNumber,
    /// `classe`, the technique label.
    Label,
    /// `problem_id`, the key of an unlabeled scoring row.
    ProblemId,
    /// A sensor reading or window statistic.
    Sensor(SensorLocation),
}

impl ColumnRole {
    /// Classify a header name. `position` is the zero-based column index.
    #[must_use]
    pub fn classify(name: &str, position: usize) -> Self {
        match name {
            "" | "X" if position == 0 => ColumnRole::RowIndex,
            "user_name" => ColumnRole::Subject,
            "raw_timestamp_part_1" | "raw_timestamp_part_2" | "cvtd_timestamp" => {
                ColumnRole::Timestamp
            }
            "new_window" => ColumnRole::WindowFlag,
            "num_window" => ColumnRole::WindowNumber,
            "classe" => ColumnRole::Label,
            "problem_id" => ColumnRole::ProblemId,
            other => ColumnRole::Sensor(SensorLocation::from_column(other)),
        }
    }

    /// `true` for columns that describe the recording rather than the movement.
    #[must_use]
    pub fn is_housekeeping(self) -> bool {
        !matches!(self, ColumnRole::Sensor(_))
    }
}

/// Parse a sensor cell. `Ok(None)` for missing markers and non-finite numbers.
///
/// Missing markers are the empty string, `NA` and the spreadsheet artifact
/// `#DIV/0!`. The raw text is returned as the error for anything else that
/// is not a number.
pub(crate) fn parse_reading(raw: &str) -> Result<Option<f64>, &str> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "NA" | "#DIV/0!" => Ok(None),
        _ => trimmed
            .parse::<f64>()
            .map(|v| v.is_finite().then_some(v))
            .map_err(|_| raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_from_any_token() {
        assert_eq!(SensorLocation::from_column("roll_belt"), SensorLocation::Belt);
        assert_eq!(SensorLocation::from_column("gyros_forearm_x"), SensorLocation::Forearm);
        assert_eq!(SensorLocation::from_column("accel_arm_z"), SensorLocation::Arm);
        assert_eq!(
            SensorLocation::from_column("kurtosis_picth_dumbbell"),
            SensorLocation::Dumbbell
        );
        assert_eq!(SensorLocation::from_column("heart_rate"), SensorLocation::Other);
    }

    #[test]
    fn repeated_header_suffix_ignored() {
        assert_eq!(SensorLocation::from_column("skewness_roll_belt.1"), SensorLocation::Belt);
        assert_eq!(SensorLocation::from_column("skewness_roll_dumbbell.12"), SensorLocation::Dumbbell);
        assert_eq!(SensorLocation::from_column("belt.x"), SensorLocation::Other);
    }

    #[test]
    fn classify_housekeeping() {
        assert_eq!(ColumnRole::classify("", 0), ColumnRole::RowIndex);
        assert_eq!(ColumnRole::classify("X", 0), ColumnRole::RowIndex);
        assert_eq!(ColumnRole::classify("user_name", 1), ColumnRole::Subject);
        assert_eq!(ColumnRole::classify("cvtd_timestamp", 4), ColumnRole::Timestamp);
        assert_eq!(ColumnRole::classify("new_window", 5), ColumnRole::WindowFlag);
        assert_eq!(ColumnRole::classify("classe", 159), ColumnRole::Label);
        assert_eq!(ColumnRole::classify("problem_id", 159), ColumnRole::ProblemId);
        assert!(ColumnRole::classify("num_window", 6).is_housekeeping());
    }

    #[test]
    fn classify_sensor() {
        let role = ColumnRole::classify("magnet_dumbbell_y", 20);
        assert_eq!(role, ColumnRole::Sensor(SensorLocation::Dumbbell));
        assert!(!role.is_housekeeping());
    }

    #[test]
    fn missing_markers() {
        assert_eq!(parse_reading("NA"), Ok(None));
        assert_eq!(parse_reading(""), Ok(None));
        assert_eq!(parse_reading("#DIV/0!"), Ok(None));
        assert_eq!(parse_reading("inf"), Ok(None));
        assert_eq!(parse_reading(" 1.41 "), Ok(Some(1.41)));
        assert_eq!(parse_reading("-0.02"), Ok(Some(-0.02)));
        assert_eq!(parse_reading("abc"), Err("abc"));
    }
}
