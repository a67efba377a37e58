use crate::columns::{
    COL_DATE, COL_DIRECTION_ID, COL_ID, COL_LAT, COL_LONG, COL_NAME, COL_PROJECT_ID,
    COL_TIME_INTERVAL, COL_TOTAL_VEHICLES,
};
use crate::util::parse_f64_safe;
use csv::StringRecord;
use thiserror::Error;
use tracing::warn;

/// Canonical fields a dataset must carry to be loadable.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_PROJECT_ID,
    COL_DATE,
    COL_TIME_INTERVAL,
    COL_DIRECTION_ID,
    COL_TOTAL_VEHICLES,
    COL_ID,
    COL_NAME,
    COL_LONG,
    COL_LAT,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("dataset contains no rows")]
    EmptyDataset,
}

/// Structural validation of a standardized raw table.
///
/// Fatal checks, in order: the required canonical columns must all be
/// present, and the table must have at least one row. Rows with missing
/// coordinates are only warned about; they stay in the dataset and are
/// dropped later, per row, where coordinates actually matter.
///
/// Value semantics (coordinate ranges, count non-negativity) are
/// deliberately not checked here; see the diagnostics module.
pub fn validate_table(headers: &[String], rows: &[StringRecord]) -> Result<(), ValidationError> {
    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(|required| required.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(ValidationError::MissingColumns(missing));
    }

    if rows.is_empty() {
        return Err(ValidationError::EmptyDataset);
    }

    let lat_idx = headers.iter().position(|h| h == COL_LAT);
    let long_idx = headers.iter().position(|h| h == COL_LONG);
    let missing_coords = rows
        .iter()
        .filter(|row| {
            let lat = lat_idx.and_then(|i| parse_f64_safe(row.get(i)));
            let long = long_idx.and_then(|i| parse_f64_safe(row.get(i)));
            lat.is_none() || long.is_none()
        })
        .count();
    if missing_coords > 0 {
        warn!(rows = missing_coords, "some coordinate data is missing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> StringRecord {
        StringRecord::from(cells.to_vec())
    }

    const FULL: [&str; 9] = [
        "Project ID",
        "Date",
        "Time Interval",
        "Direction ID",
        "Total Vehicles",
        "ID",
        "Name",
        "LONG",
        "LAT",
    ];

    #[test]
    fn names_exactly_the_missing_columns() {
        let partial = headers(&["Project ID", "Time Interval", "ID", "Name", "LONG", "LAT"]);
        let rows = vec![row(&["P1", "07:00", "1", "Corner", "90.4", "23.8"])];
        let err = validate_table(&partial, &rows).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns(vec![
                "Date".to_string(),
                "Direction ID".to_string(),
                "Total Vehicles".to_string(),
            ])
        );
    }

    #[test]
    fn rejects_empty_dataset() {
        let err = validate_table(&headers(&FULL), &[]).unwrap_err();
        assert_eq!(err, ValidationError::EmptyDataset);
    }

    #[test]
    fn null_coordinates_warn_but_pass() {
        let rows = vec![
            row(&["P1", "2024-03-18", "07:00", "1", "120", "12", "Corner", "", ""]),
            row(&["P1", "2024-03-18", "07:00", "2", "80", "12", "Corner", "90.41", "23.81"]),
        ];
        assert!(validate_table(&headers(&FULL), &rows).is_ok());
    }

    #[test]
    fn extra_columns_are_not_an_error() {
        let mut names = FULL.to_vec();
        names.push("observer notes");
        let rows = vec![row(&[
            "P1",
            "2024-03-18",
            "07:00",
            "1",
            "120",
            "12",
            "Corner",
            "90.41",
            "23.81",
            "windy",
        ])];
        assert!(validate_table(&headers(&names), &rows).is_ok());
    }
}
