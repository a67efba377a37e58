use crate::types::{
    CompositionRow, DirectionFlow, DirectionRow, GeoSummary, IntersectionStats, LocationRow,
};
use crate::util::{format_int, format_number};
use serde::Serialize;
use std::error::Error;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Composition table for one selection. Share is "-" when the selection
/// has no volume to take shares of.
pub fn composition_rows(stats: &IntersectionStats) -> Vec<CompositionRow> {
    stats
        .vehicle_composition
        .iter()
        .map(|(class, count)| CompositionRow {
            vehicle: class.label().to_string(),
            count: format_int(*count),
            share: match stats.percentages.get(class) {
                Some(share) => format!("{:.1}%", share),
                None => "-".to_string(),
            },
        })
        .collect()
}

pub fn location_rows(summary: &GeoSummary) -> Vec<LocationRow> {
    summary
        .points
        .iter()
        .map(|point| LocationRow {
            id: point.location_id.clone(),
            name: point.name.clone(),
            lat: format!("{:.5}", point.latitude),
            long: format!("{:.5}", point.longitude),
            total_vehicles: format_int(point.total_vehicles),
            color: point.color.as_str().to_string(),
            marker_size: format_number(point.size, 1),
            selected: if point.is_selected { "yes" } else { "" }.to_string(),
        })
        .collect()
}

pub fn direction_rows(flows: &[DirectionFlow]) -> Vec<DirectionRow> {
    flows
        .iter()
        .map(|flow| DirectionRow {
            direction_id: flow.direction_id.clone(),
            total_vehicles: format_int(flow.total_vehicles),
        })
        .collect()
}
