use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tabled::Tabled;

/// Which of the two CSV snapshots a table is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hourly,
    FifteenMinute,
}

impl Granularity {
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Hourly => "1 Hour",
            Granularity::FifteenMinute => "15 Minutes",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Vehicle classes tracked by the count sheets. The display label of each
/// class is also its canonical column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum VehicleClass {
    Car,
    Microbus,
    Bus,
    Truck,
    #[serde(rename = "Special vehicular")]
    SpecialVehicular,
    Motorcycle,
    Bicycle,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 7] = [
        VehicleClass::Car,
        VehicleClass::Microbus,
        VehicleClass::Bus,
        VehicleClass::Truck,
        VehicleClass::SpecialVehicular,
        VehicleClass::Motorcycle,
        VehicleClass::Bicycle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            VehicleClass::Car => "Car",
            VehicleClass::Microbus => "Microbus",
            VehicleClass::Bus => "Bus",
            VehicleClass::Truck => "Truck",
            VehicleClass::SpecialVehicular => "Special vehicular",
            VehicleClass::Motorcycle => "Motorcycle",
            VehicleClass::Bicycle => "Bicycle",
        }
    }

    pub fn from_label(label: &str) -> Option<VehicleClass> {
        VehicleClass::ALL.iter().copied().find(|c| c.label() == label)
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One standardized row of directional volume at a counting location.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficRecord {
    pub project_id: String,
    pub date: NaiveDate,
    pub time_interval: String,
    pub direction_id: String,
    pub location_id: String,
    pub location_name: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub total_vehicles: u64,
    /// Entries exist only for class columns present in the source file;
    /// an absent class is different from a present class counted as 0.
    pub vehicle_counts: BTreeMap<VehicleClass, u64>,
    pub image_reference: Option<String>,
}

/// The canonical table for one data granularity. Immutable once built;
/// rebuilt wholesale when the user switches data sources.
#[derive(Debug, Clone, Default)]
pub struct TrafficTable {
    pub records: Vec<TrafficRecord>,
}

impl TrafficTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn project_ids(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.project_id.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    pub fn dates(&self, project: Option<&str>) -> Vec<NaiveDate> {
        let set: BTreeSet<NaiveDate> = self
            .records
            .iter()
            .filter(|r| matches_project(r, project))
            .map(|r| r.date)
            .collect();
        set.into_iter().collect()
    }

    pub fn time_intervals(&self, date: NaiveDate, project: Option<&str>) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| r.date == date && matches_project(r, project))
            .map(|r| r.time_interval.as_str())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    pub fn location_ids(&self, project: Option<&str>) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| matches_project(r, project))
            .map(|r| r.location_id.as_str())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }
}

/// `None` means "all projects".
pub fn matches_project(record: &TrafficRecord, project: Option<&str>) -> bool {
    match project {
        Some(p) => record.project_id == p,
        None => true,
    }
}

/// Aggregated statistics for one (location, time interval) selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionStats {
    pub total_vehicles: u64,
    pub vehicle_composition: BTreeMap<VehicleClass, u64>,
    pub percentages: BTreeMap<VehicleClass, f64>,
    pub image_reference: Option<String>,
}

impl IntersectionStats {
    pub fn empty() -> Self {
        IntersectionStats {
            total_vehicles: 0,
            vehicle_composition: BTreeMap::new(),
            percentages: BTreeMap::new(),
            image_reference: None,
        }
    }
}

/// Per-direction volume for the peak-flow panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionFlow {
    pub direction_id: String,
    pub total_vehicles: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Green,
    Orange,
    Red,
}

impl MarkerColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerColor::Green => "green",
            MarkerColor::Orange => "orange",
            MarkerColor::Red => "red",
        }
    }
}

/// One map marker: a counting location with its summed volume and the
/// precomputed visual encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPoint {
    pub location_id: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub total_vehicles: u64,
    pub image_reference: Option<String>,
    pub color: MarkerColor,
    pub size: f64,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapCenter {
    pub lat: f64,
    pub long: f64,
}

/// Map-ready aggregation for one (date, time interval) selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoSummary {
    pub points: Vec<LocationPoint>,
    pub center: MapCenter,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CompositionRow {
    #[serde(rename = "Vehicle")]
    #[tabled(rename = "Vehicle")]
    pub vehicle: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: String,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct LocationRow {
    #[serde(rename = "ID")]
    #[tabled(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "LAT")]
    #[tabled(rename = "LAT")]
    pub lat: String,
    #[serde(rename = "LONG")]
    #[tabled(rename = "LONG")]
    pub long: String,
    #[serde(rename = "TotalVehicles")]
    #[tabled(rename = "TotalVehicles")]
    pub total_vehicles: String,
    #[serde(rename = "Color")]
    #[tabled(rename = "Color")]
    pub color: String,
    #[serde(rename = "MarkerSize")]
    #[tabled(rename = "MarkerSize")]
    pub marker_size: String,
    #[serde(rename = "Selected")]
    #[tabled(rename = "Selected")]
    pub selected: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DirectionRow {
    #[serde(rename = "DirectionID")]
    #[tabled(rename = "DirectionID")]
    pub direction_id: String,
    #[serde(rename = "TotalVehicles")]
    #[tabled(rename = "TotalVehicles")]
    pub total_vehicles: String,
}
