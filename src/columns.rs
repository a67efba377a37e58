// Column name standardization.
//
// The two source formats name the same fields differently ("location-id"
// vs. "ID", "time-intervals" vs. "Time Interval"). Everything downstream
// works against the canonical names defined here.
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const COL_ID: &str = "ID";
pub const COL_NAME: &str = "Name";
pub const COL_TIME_INTERVAL: &str = "Time Interval";
pub const COL_PROJECT_ID: &str = "Project ID";
pub const COL_DATE: &str = "Date";
pub const COL_DIRECTION_ID: &str = "Direction ID";
pub const COL_TOTAL_VEHICLES: &str = "Total Vehicles";
pub const COL_LONG: &str = "LONG";
pub const COL_LAT: &str = "LAT";
pub const COL_URL: &str = "URL";

// Alias table keyed by folded spellings (lowercase, hyphens as spaces) from
// both source vocabularies. Canonical names fold to entries that map back to
// themselves, so standardizing twice is a no-op.
static COLUMN_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // 15-minute format
        ("location id", COL_ID),
        ("location name", COL_NAME),
        ("time intervals", COL_TIME_INTERVAL),
        ("project id", COL_PROJECT_ID),
        ("date", COL_DATE),
        ("direction id", COL_DIRECTION_ID),
        ("total vehicles", COL_TOTAL_VEHICLES),
        ("longitude", COL_LONG),
        ("latitude", COL_LAT),
        ("image url", COL_URL),
        ("car", "Car"),
        ("microbus", "Microbus"),
        ("bus", "Bus"),
        ("truck", "Truck"),
        ("special vehicle", "Special vehicular"),
        ("motorcycle", "Motorcycle"),
        ("bicycle", "Bicycle"),
        // Hourly format
        ("time interval", COL_TIME_INTERVAL),
        ("special vehicular", "Special vehicular"),
        ("id", COL_ID),
        ("name", COL_NAME),
        ("long", COL_LONG),
        ("lat", COL_LAT),
        ("url", COL_URL),
    ])
});

/// Fold a raw column name for alias lookup: lowercase, hyphens as spaces.
fn fold_column(name: &str) -> String {
    name.to_lowercase().replace('-', " ").trim().to_string()
}

/// Look up the canonical name for a raw column spelling, if it has one.
pub fn canonical_column(name: &str) -> Option<&'static str> {
    COLUMN_ALIASES.get(fold_column(name).as_str()).copied()
}

/// Standardize a full header row. Matched columns are renamed to their
/// canonical form; unknown columns keep their folded name and pass through
/// (missing required fields are the validator's problem, extra columns are
/// nobody's).
pub fn standardize_headers(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| {
            let folded = fold_column(h);
            match COLUMN_ALIASES.get(folded.as_str()) {
                Some(canonical) => canonical.to_string(),
                None => folded,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn canonical_headers_are_a_fixed_point() {
        let canonical = owned(&[
            "Project ID",
            "Date",
            "Time Interval",
            "Direction ID",
            "Total Vehicles",
            "ID",
            "Name",
            "LONG",
            "LAT",
            "URL",
            "Car",
            "Microbus",
            "Bus",
            "Truck",
            "Special vehicular",
            "Motorcycle",
            "Bicycle",
        ]);
        assert_eq!(standardize_headers(&canonical), canonical);
    }

    #[test]
    fn matching_ignores_case_and_hyphens() {
        assert_eq!(canonical_column("location-id"), Some("ID"));
        assert_eq!(canonical_column("Location-ID"), Some("ID"));
        assert_eq!(canonical_column("location id"), Some("ID"));
        assert_eq!(canonical_column("TIME-INTERVALS"), Some("Time Interval"));
        assert_eq!(canonical_column("special vehicle"), Some("Special vehicular"));
        assert_eq!(canonical_column("observer"), None);
    }

    #[test]
    fn fifteen_minute_header_maps_to_canonical() {
        let raw = owned(&[
            "location-id",
            "location-name",
            "time-intervals",
            "project-id",
            "date",
            "direction-id",
            "total-vehicles",
            "longitude",
            "latitude",
            "image-url",
        ]);
        assert_eq!(
            standardize_headers(&raw),
            owned(&[
                "ID",
                "Name",
                "Time Interval",
                "Project ID",
                "Date",
                "Direction ID",
                "Total Vehicles",
                "LONG",
                "LAT",
                "URL",
            ])
        );
    }

    #[test]
    fn unknown_columns_pass_through_folded() {
        let raw = owned(&["Weather-Notes", "ID"]);
        assert_eq!(standardize_headers(&raw), owned(&["weather notes", "ID"]));
    }
}
