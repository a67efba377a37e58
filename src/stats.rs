use crate::types::{
    matches_project, DirectionFlow, IntersectionStats, TrafficRecord, TrafficTable, VehicleClass,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Collapse repeated directional rows: one row per
/// (location, time interval, direction) triple, first occurrence kept.
/// Sources occasionally repeat a directional count within a snapshot and
/// summing the repeats would double-count the volume.
pub(crate) fn dedup_directional<'a>(rows: &[&'a TrafficRecord]) -> Vec<&'a TrafficRecord> {
    let mut seen: HashSet<(&str, &str, &str)> = HashSet::new();
    rows.iter()
        .copied()
        .filter(|r| {
            seen.insert((
                r.location_id.as_str(),
                r.time_interval.as_str(),
                r.direction_id.as_str(),
            ))
        })
        .collect()
}

/// Traffic statistics for one (location, time interval) selection,
/// optionally restricted to a project.
///
/// A selection that matches nothing returns zeroed stats; that is an
/// expected outcome, not an error.
pub fn intersection_stats(
    table: &TrafficTable,
    location_id: &str,
    time_interval: &str,
    project_id: Option<&str>,
) -> IntersectionStats {
    let filtered: Vec<&TrafficRecord> = table
        .records
        .iter()
        .filter(|r| {
            r.location_id == location_id
                && r.time_interval == time_interval
                && matches_project(r, project_id)
        })
        .collect();

    if filtered.is_empty() {
        warn!(location_id, time_interval, "no data found for location");
        return IntersectionStats::empty();
    }

    // Picked across all filtered rows, before dedup, so the choice does not
    // depend on source order: smallest reference wins.
    let image_reference = filtered
        .iter()
        .filter_map(|r| r.image_reference.as_deref())
        .min()
        .map(str::to_string);

    let deduped = dedup_directional(&filtered);

    // Counts near the top of the u64 range are garbage, but a load can still
    // carry them; the sums saturate instead of wrapping.
    let total_vehicles: u64 = deduped
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.total_vehicles));

    let mut vehicle_composition: BTreeMap<VehicleClass, u64> = BTreeMap::new();
    for record in &deduped {
        for (class, count) in &record.vehicle_counts {
            let slot = vehicle_composition.entry(*class).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
    }

    // Guard the divide: with a zero total there is nothing meaningful to
    // express as a share, even when composition entries exist.
    let percentages: BTreeMap<VehicleClass, f64> = if total_vehicles > 0 {
        vehicle_composition
            .iter()
            .map(|(class, count)| (*class, *count as f64 / total_vehicles as f64 * 100.0))
            .collect()
    } else {
        BTreeMap::new()
    };

    IntersectionStats {
        total_vehicles,
        vehicle_composition,
        percentages,
        image_reference,
    }
}

/// Per-direction volumes for one location/interval on a specific date,
/// sorted by direction id. Feeds the peak-flow panel.
pub fn direction_breakdown(
    table: &TrafficTable,
    location_id: &str,
    time_interval: &str,
    date: NaiveDate,
    project_id: Option<&str>,
) -> Vec<DirectionFlow> {
    let filtered: Vec<&TrafficRecord> = table
        .records
        .iter()
        .filter(|r| {
            r.location_id == location_id
                && r.time_interval == time_interval
                && r.date == date
                && matches_project(r, project_id)
        })
        .collect();

    let mut flows: Vec<DirectionFlow> = dedup_directional(&filtered)
        .into_iter()
        .map(|r| DirectionFlow {
            direction_id: r.direction_id.clone(),
            total_vehicles: r.total_vehicles,
        })
        .collect();
    flows.sort_by(|a, b| a.direction_id.cmp(&b.direction_id));
    flows
}
