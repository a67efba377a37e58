//! Data quality checks mirroring what an analyst would eyeball before
//! trusting a count dataset: shape, gaps, impossible coordinates, and
//! totals that disagree with their per-class breakdown.

use crate::types::{TrafficRecord, TrafficTable};
use crate::util::format_int;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tabled::Tabled;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureReport {
    pub rows: usize,
    pub locations: usize,
    pub projects: usize,
    pub dates: usize,
    pub time_intervals: usize,
    /// First few distinct interval labels, to eyeball the bucket scheme.
    pub interval_sample: Vec<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

const INTERVAL_SAMPLE_SIZE: usize = 5;

pub fn structure_report(table: &TrafficTable) -> StructureReport {
    let locations: BTreeSet<&str> = table.records.iter().map(|r| r.location_id.as_str()).collect();
    let projects: BTreeSet<&str> = table.records.iter().map(|r| r.project_id.as_str()).collect();
    let dates: BTreeSet<NaiveDate> = table.records.iter().map(|r| r.date).collect();
    let time_intervals: BTreeSet<&str> =
        table.records.iter().map(|r| r.time_interval.as_str()).collect();

    StructureReport {
        rows: table.len(),
        locations: locations.len(),
        projects: projects.len(),
        dates: dates.len(),
        time_intervals: time_intervals.len(),
        interval_sample: time_intervals
            .iter()
            .take(INTERVAL_SAMPLE_SIZE)
            .map(|s| s.to_string())
            .collect(),
        date_range: date_range(&table.records),
    }
}

fn date_range(records: &[TrafficRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let first = records.iter().map(|r| r.date).min()?;
    let last = records.iter().map(|r| r.date).max()?;
    Some((first, last))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValueReport {
    pub missing_coordinates: usize,
    pub missing_images: usize,
    /// Rows repeating an earlier (location, interval, direction, date)
    /// combination. Aggregations collapse these, so a high number here
    /// means the source file itself needs a look.
    pub duplicate_rows: usize,
}

pub fn missing_value_report(table: &TrafficTable) -> MissingValueReport {
    let mut seen: HashSet<(&str, &str, &str, NaiveDate)> = HashSet::new();
    let mut report = MissingValueReport {
        missing_coordinates: 0,
        missing_images: 0,
        duplicate_rows: 0,
    };

    for record in &table.records {
        if record.latitude.is_none() || record.longitude.is_none() {
            report.missing_coordinates += 1;
        }
        if record.image_reference.is_none() {
            report.missing_images += 1;
        }
        let key = (
            record.location_id.as_str(),
            record.time_interval.as_str(),
            record.direction_id.as_str(),
            record.date,
        );
        if !seen.insert(key) {
            report.duplicate_rows += 1;
        }
    }
    report
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CoordinateAnomaly {
    #[tabled(rename = "ID")]
    pub location_id: String,
    #[tabled(rename = "LAT")]
    pub latitude: String,
    #[tabled(rename = "LONG")]
    pub longitude: String,
    #[tabled(rename = "Problem")]
    pub problem: String,
}

/// Rows whose present coordinates fall outside the valid ranges
/// (latitude -90..=90, longitude -180..=180). Absent coordinates are a
/// missing-value concern, not an anomaly.
pub fn coordinate_anomalies(table: &TrafficTable) -> Vec<CoordinateAnomaly> {
    let mut anomalies = Vec::new();
    for record in &table.records {
        let mut problems: Vec<&str> = Vec::new();
        if let Some(lat) = record.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                problems.push("latitude out of range");
            }
        }
        if let Some(long) = record.longitude {
            if !(-180.0..=180.0).contains(&long) {
                problems.push("longitude out of range");
            }
        }
        if !problems.is_empty() {
            anomalies.push(CoordinateAnomaly {
                location_id: record.location_id.clone(),
                latitude: fmt_coord(record.latitude),
                longitude: fmt_coord(record.longitude),
                problem: problems.join("; "),
            });
        }
    }
    anomalies
}

fn fmt_coord(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => "-".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub common_locations: usize,
    pub only_in_first: Vec<String>,
    pub only_in_second: Vec<String>,
    pub first_date_range: Option<(NaiveDate, NaiveDate)>,
    pub second_date_range: Option<(NaiveDate, NaiveDate)>,
}

/// How two snapshots of the same network line up, typically the hourly
/// and fifteen-minute files for one collection campaign.
pub fn consistency_report(first: &TrafficTable, second: &TrafficTable) -> ConsistencyReport {
    let first_ids: BTreeSet<&str> =
        first.records.iter().map(|r| r.location_id.as_str()).collect();
    let second_ids: BTreeSet<&str> =
        second.records.iter().map(|r| r.location_id.as_str()).collect();

    ConsistencyReport {
        common_locations: first_ids.intersection(&second_ids).count(),
        only_in_first: first_ids
            .difference(&second_ids)
            .map(|s| s.to_string())
            .collect(),
        only_in_second: second_ids
            .difference(&first_ids)
            .map(|s| s.to_string())
            .collect(),
        first_date_range: date_range(&first.records),
        second_date_range: date_range(&second.records),
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CompositionMismatch {
    #[tabled(rename = "ID")]
    pub location_id: String,
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Time Interval")]
    pub time_interval: String,
    #[tabled(rename = "Direction")]
    pub direction_id: String,
    #[tabled(rename = "Total Vehicles")]
    pub total_vehicles: String,
    #[tabled(rename = "Class Sum")]
    pub class_sum: String,
}

/// Rows where the per-class counts do not add up to the reported total.
/// Rows without any class columns are skipped, their totals are all we
/// have. Reported for review only, nothing downstream is corrected.
pub fn composition_mismatches(table: &TrafficTable) -> Vec<CompositionMismatch> {
    table
        .records
        .iter()
        .filter(|r| !r.vehicle_counts.is_empty())
        .filter_map(|r| {
            let class_sum = r
                .vehicle_counts
                .values()
                .fold(0u64, |acc, c| acc.saturating_add(*c));
            if class_sum == r.total_vehicles {
                return None;
            }
            Some(CompositionMismatch {
                location_id: r.location_id.clone(),
                date: r.date.to_string(),
                time_interval: r.time_interval.clone(),
                direction_id: r.direction_id.clone(),
                total_vehicles: format_int(r.total_vehicles),
                class_sum: format_int(class_sum),
            })
        })
        .collect()
}
