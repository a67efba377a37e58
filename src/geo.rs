use crate::config::{ColorPolicy, MapConfig};
use crate::stats::dedup_directional;
use crate::types::{
    matches_project, GeoSummary, LocationPoint, MapCenter, MarkerColor, TrafficRecord,
    TrafficTable,
};
use crate::util::average;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Marker tier for a location's summed volume. Tiers are half-open, so a
/// volume sitting exactly on a boundary takes the higher tier.
pub fn marker_color(total_vehicles: u64, map: &MapConfig) -> MarkerColor {
    match map.color_policy {
        ColorPolicy::AbsoluteVolume => {
            if total_vehicles < 1000 {
                MarkerColor::Green
            } else if total_vehicles < 2500 {
                MarkerColor::Orange
            } else {
                MarkerColor::Red
            }
        }
        ColorPolicy::CapacityRatio => {
            let ratio = total_vehicles as f64 / map.capacity_assumption;
            if ratio < 0.6 {
                MarkerColor::Green
            } else if ratio < 0.8 {
                MarkerColor::Orange
            } else {
                MarkerColor::Red
            }
        }
    }
}

/// Logarithmic marker radius: zero volume still draws, heavy locations
/// grow slowly instead of swallowing the map.
pub fn marker_size(total_vehicles: u64, marker_scale: f64) -> f64 {
    (total_vehicles as f64 + 1.0).ln() * marker_scale
}

/// Everything the map needs for one (date, time interval) snapshot:
/// one point per distinct location/coordinate/image group, plus a center.
///
/// Returns `None` only when the filter matches no rows at all. Matching
/// rows that all lack coordinates still produce a summary with an empty
/// point list and the configured fallback center.
pub fn geo_summary(
    table: &TrafficTable,
    time_interval: &str,
    date: NaiveDate,
    project_id: Option<&str>,
    selected_location: Option<&str>,
    map: &MapConfig,
) -> Option<GeoSummary> {
    let filtered: Vec<&TrafficRecord> = table
        .records
        .iter()
        .filter(|r| {
            r.time_interval == time_interval && r.date == date && matches_project(r, project_id)
        })
        .collect();

    if filtered.is_empty() {
        warn!(time_interval, %date, "no data available for the selected filters");
        return None;
    }

    let mut mappable: Vec<&TrafficRecord> = Vec::with_capacity(filtered.len());
    let mut without_coords = 0usize;
    for record in filtered {
        if record.latitude.is_some() && record.longitude.is_some() {
            mappable.push(record);
        } else {
            without_coords += 1;
        }
    }
    if without_coords > 0 {
        warn!(rows = without_coords, "skipping rows without coordinates");
    }

    // Bit patterns keep f64 usable as an exact grouping key. Locations
    // reported under two coordinate pairs stay two markers on purpose.
    type GroupKey = (String, String, u64, u64, Option<String>);
    let mut groups: BTreeMap<GroupKey, u64> = BTreeMap::new();
    for record in dedup_directional(&mappable) {
        if let (Some(lat), Some(long)) = (record.latitude, record.longitude) {
            let key = (
                record.location_id.clone(),
                record.location_name.clone(),
                long.to_bits(),
                lat.to_bits(),
                record.image_reference.clone(),
            );
            let slot = groups.entry(key).or_insert(0);
            *slot = slot.saturating_add(record.total_vehicles);
        }
    }

    // BTreeMap iteration order doubles as the output order: location id first.
    let points: Vec<LocationPoint> = groups
        .into_iter()
        .map(|((location_id, name, long_bits, lat_bits, image_reference), total)| {
            let is_selected = selected_location == Some(location_id.as_str());
            LocationPoint {
                is_selected,
                color: marker_color(total, map),
                size: marker_size(total, map.marker_scale),
                location_id,
                name,
                longitude: f64::from_bits(long_bits),
                latitude: f64::from_bits(lat_bits),
                total_vehicles: total,
                image_reference,
            }
        })
        .collect();

    let center = if points.is_empty() {
        warn!(
            lat = map.default_lat,
            long = map.default_long,
            "no coordinates to center on, using configured default"
        );
        MapCenter {
            lat: map.default_lat,
            long: map.default_long,
        }
    } else {
        let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        let longs: Vec<f64> = points.iter().map(|p| p.longitude).collect();
        MapCenter {
            lat: average(&lats),
            long: average(&longs),
        }
    };

    Some(GeoSummary { points, center })
}

/// Location id closest to the given coordinates, straight-line distance
/// over every row that carries a coordinate pair.
pub fn nearest_location(table: &TrafficTable, lat: f64, long: f64) -> Option<String> {
    table
        .records
        .iter()
        .filter_map(|r| match (r.latitude, r.longitude) {
            (Some(rlat), Some(rlong)) => {
                let distance = ((rlat - lat).powi(2) + (rlong - long).powi(2)).sqrt();
                Some((r, distance))
            }
            _ => None,
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(r, _)| r.location_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VehicleClass;
    use std::collections::BTreeMap as VehicleMap;

    fn map_config(policy: ColorPolicy) -> MapConfig {
        MapConfig {
            color_policy: policy,
            ..MapConfig::default()
        }
    }

    fn record(location: &str, direction: &str, total: u64, lat: Option<f64>, long: Option<f64>) -> TrafficRecord {
        TrafficRecord {
            project_id: "P1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
            time_interval: "07:00".to_string(),
            direction_id: direction.to_string(),
            location_id: location.to_string(),
            location_name: format!("Location {}", location),
            longitude: long,
            latitude: lat,
            total_vehicles: total,
            vehicle_counts: VehicleMap::from([(VehicleClass::Car, total)]),
            image_reference: None,
        }
    }

    fn summarize(table: &TrafficTable, selected: Option<&str>) -> Option<GeoSummary> {
        geo_summary(
            table,
            "07:00",
            NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
            None,
            selected,
            &MapConfig::default(),
        )
    }

    #[test]
    fn filter_miss_yields_none() {
        let table = TrafficTable {
            records: vec![record("12", "1", 100, Some(23.81), Some(90.41))],
        };
        let summary = geo_summary(
            &table,
            "23:00",
            NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
            None,
            None,
            &MapConfig::default(),
        );
        assert!(summary.is_none());
    }

    #[test]
    fn rows_without_coordinates_are_skipped_not_fatal() {
        let table = TrafficTable {
            records: vec![
                record("12", "1", 100, Some(23.81), Some(90.41)),
                record("13", "1", 50, None, Some(90.42)),
            ],
        };
        let summary = summarize(&table, None).unwrap();
        assert_eq!(summary.points.len(), 1);
        assert_eq!(summary.points[0].location_id, "12");
    }

    #[test]
    fn all_rows_without_coordinates_fall_back_to_default_center() {
        let table = TrafficTable {
            records: vec![record("12", "1", 100, None, None)],
        };
        let summary = summarize(&table, None).unwrap();
        assert!(summary.points.is_empty());
        assert_eq!(summary.center.lat, 0.0);
        assert_eq!(summary.center.long, 0.0);
    }

    #[test]
    fn directions_sum_but_duplicates_do_not() {
        let table = TrafficTable {
            records: vec![
                record("12", "1", 100, Some(23.81), Some(90.41)),
                record("12", "2", 60, Some(23.81), Some(90.41)),
                record("12", "2", 999, Some(23.81), Some(90.41)),
            ],
        };
        let summary = summarize(&table, None).unwrap();
        assert_eq!(summary.points.len(), 1);
        assert_eq!(summary.points[0].total_vehicles, 160);
    }

    #[test]
    fn distinct_images_make_distinct_markers() {
        let mut with_image = record("12", "1", 100, Some(23.81), Some(90.41));
        with_image.image_reference = Some("https://img/cam.jpg".to_string());
        let table = TrafficTable {
            records: vec![with_image, record("12", "2", 60, Some(23.81), Some(90.41))],
        };
        let summary = summarize(&table, None).unwrap();
        // The image is part of the group key; rows reported under different
        // references stay separate markers.
        assert_eq!(summary.points.len(), 2);
        let totals: Vec<u64> = summary.points.iter().map(|p| p.total_vehicles).collect();
        assert_eq!(totals, vec![60, 100]);
    }

    #[test]
    fn oversized_direction_totals_saturate_marker_volume() {
        let table = TrafficTable {
            records: vec![
                record("12", "1", u64::MAX, Some(23.81), Some(90.41)),
                record("12", "2", 60, Some(23.81), Some(90.41)),
            ],
        };
        let summary = summarize(&table, None).unwrap();
        assert_eq!(summary.points.len(), 1);
        assert_eq!(summary.points[0].total_vehicles, u64::MAX);
        assert!(summary.points[0].size.is_finite());
    }

    #[test]
    fn points_come_out_sorted_by_location_id() {
        let table = TrafficTable {
            records: vec![
                record("31", "1", 10, Some(23.9), Some(90.5)),
                record("12", "1", 10, Some(23.8), Some(90.4)),
                record("25", "1", 10, Some(23.85), Some(90.45)),
            ],
        };
        let ids: Vec<String> = summarize(&table, None)
            .unwrap()
            .points
            .into_iter()
            .map(|p| p.location_id)
            .collect();
        assert_eq!(ids, vec!["12", "25", "31"]);
    }

    #[test]
    fn center_is_mean_of_point_coordinates() {
        let table = TrafficTable {
            records: vec![
                record("12", "1", 10, Some(10.0), Some(20.0)),
                record("13", "1", 10, Some(30.0), Some(40.0)),
            ],
        };
        let summary = summarize(&table, None).unwrap();
        assert_eq!(summary.center.lat, 20.0);
        assert_eq!(summary.center.long, 30.0);
    }

    #[test]
    fn selected_location_is_flagged() {
        let table = TrafficTable {
            records: vec![
                record("12", "1", 10, Some(23.8), Some(90.4)),
                record("13", "1", 10, Some(23.9), Some(90.5)),
            ],
        };
        let summary = summarize(&table, Some("13")).unwrap();
        let flags: Vec<(String, bool)> = summary
            .points
            .into_iter()
            .map(|p| (p.location_id, p.is_selected))
            .collect();
        assert_eq!(
            flags,
            vec![("12".to_string(), false), ("13".to_string(), true)]
        );
    }

    #[test]
    fn absolute_volume_boundaries() {
        let cfg = map_config(ColorPolicy::AbsoluteVolume);
        assert_eq!(marker_color(999, &cfg), MarkerColor::Green);
        assert_eq!(marker_color(1000, &cfg), MarkerColor::Orange);
        assert_eq!(marker_color(2499, &cfg), MarkerColor::Orange);
        assert_eq!(marker_color(2500, &cfg), MarkerColor::Red);
    }

    #[test]
    fn capacity_ratio_boundaries() {
        let mut cfg = map_config(ColorPolicy::CapacityRatio);
        cfg.capacity_assumption = 1000.0;
        assert_eq!(marker_color(599, &cfg), MarkerColor::Green);
        assert_eq!(marker_color(600, &cfg), MarkerColor::Orange);
        assert_eq!(marker_color(799, &cfg), MarkerColor::Orange);
        assert_eq!(marker_color(800, &cfg), MarkerColor::Red);
    }

    #[test]
    fn color_never_steps_down_as_volume_grows() {
        for policy in [ColorPolicy::AbsoluteVolume, ColorPolicy::CapacityRatio] {
            let cfg = map_config(policy);
            let rank = |c: MarkerColor| match c {
                MarkerColor::Green => 0,
                MarkerColor::Orange => 1,
                MarkerColor::Red => 2,
            };
            let mut previous = 0;
            for volume in (0..5000).step_by(7) {
                let current = rank(marker_color(volume, &cfg));
                assert!(current >= previous, "tier dropped at volume {}", volume);
                previous = current;
            }
        }
    }

    #[test]
    fn marker_size_grows_and_stays_finite() {
        assert_eq!(marker_size(0, 3.0), 0.0);
        assert!(marker_size(0, 3.0).is_finite());
        assert!(marker_size(1, 3.0) > marker_size(0, 3.0));
        assert!(marker_size(100, 3.0) > marker_size(1, 3.0));
        assert!(marker_size(u64::MAX, 3.0).is_finite());
    }

    #[test]
    fn nearest_location_by_straight_line() {
        let table = TrafficTable {
            records: vec![
                record("12", "1", 10, Some(23.80), Some(90.40)),
                record("13", "1", 10, Some(23.90), Some(90.50)),
                record("14", "1", 10, None, None),
            ],
        };
        assert_eq!(
            nearest_location(&table, 23.81, 90.41).as_deref(),
            Some("12")
        );
        assert_eq!(
            nearest_location(&table, 23.95, 90.55).as_deref(),
            Some("13")
        );
    }

    #[test]
    fn nearest_location_without_coordinates_is_none() {
        let table = TrafficTable {
            records: vec![record("14", "1", 10, None, None)],
        };
        assert_eq!(nearest_location(&table, 23.8, 90.4), None);
    }
}
