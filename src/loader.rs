use crate::columns::{
    standardize_headers, COL_DATE, COL_DIRECTION_ID, COL_ID, COL_LAT, COL_LONG, COL_NAME,
    COL_PROJECT_ID, COL_TIME_INTERVAL, COL_TOTAL_VEHICLES, COL_URL,
};
use crate::config::AppConfig;
use crate::images::{resolver_from, ImageResolver};
use crate::types::{Granularity, TrafficRecord, TrafficTable, VehicleClass};
use crate::util::{parse_date_flexible, parse_f64_safe, parse_u64_safe};
use crate::validate::{validate_table, ValidationError};
use csv::{ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("schema validation failed: {0}")]
    Schema(#[from] ValidationError),

    /// Any unparseable date is fatal for the whole load; dropping such rows
    /// silently would skew every date-filtered aggregate.
    #[error("date conversion failed on line {line}: {value:?}")]
    DateParse { line: usize, value: String },

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    /// Rows lacking a usable LAT or LONG value (kept, but unmappable).
    pub missing_coords: usize,
    /// Non-empty count cells that failed to parse and degraded to 0.
    pub unparsed_counts: usize,
    /// Non-empty URL cells that produced no image reference.
    pub unresolved_images: usize,
}

/// Resolved column positions within a standardized header.
struct ColumnIndex {
    project: usize,
    date: usize,
    interval: usize,
    direction: usize,
    location: usize,
    name: usize,
    long: usize,
    lat: usize,
    total: usize,
    url: Option<usize>,
    classes: Vec<(VehicleClass, usize)>,
}

impl ColumnIndex {
    fn build(headers: &[String]) -> Result<ColumnIndex, ValidationError> {
        let position = |name: &str| headers.iter().position(|h| h == name);
        let mut missing: Vec<String> = Vec::new();
        let mut require = |name: &str| match position(name) {
            Some(i) => i,
            None => {
                missing.push(name.to_string());
                0
            }
        };

        let index = ColumnIndex {
            project: require(COL_PROJECT_ID),
            date: require(COL_DATE),
            interval: require(COL_TIME_INTERVAL),
            direction: require(COL_DIRECTION_ID),
            location: require(COL_ID),
            name: require(COL_NAME),
            long: require(COL_LONG),
            lat: require(COL_LAT),
            total: require(COL_TOTAL_VEHICLES),
            url: position(COL_URL),
            classes: VehicleClass::ALL
                .iter()
                .filter_map(|c| position(c.label()).map(|i| (*c, i)))
                .collect(),
        };

        if missing.is_empty() {
            Ok(index)
        } else {
            missing.sort();
            Err(ValidationError::MissingColumns(missing))
        }
    }
}

/// Load one CSV snapshot through the full pipeline: read in batches,
/// standardize columns, validate, type every row, attach image references.
pub fn load_table(path: &Path, cfg: &AppConfig) -> Result<(TrafficTable, LoadReport), LoadError> {
    if !path.exists() {
        return Err(LoadError::SourceNotFound(path.to_path_buf()));
    }
    info!(path = %path.display(), "loading traffic data");

    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let raw_headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    // Batched accumulation. The batch size only bounds transient memory;
    // results are identical for any positive size.
    let chunk_size = cfg.data.chunk_size.max(1);
    let mut rows: Vec<StringRecord> = Vec::new();
    let mut batch: Vec<StringRecord> = Vec::with_capacity(chunk_size);
    for result in rdr.records() {
        batch.push(result?);
        if batch.len() >= chunk_size {
            debug!(rows = batch.len(), "read batch");
            rows.append(&mut batch);
        }
    }
    rows.append(&mut batch);

    let headers = standardize_headers(&raw_headers);
    debug!(original = ?raw_headers, standardized = ?headers, "standardized columns");

    validate_table(&headers, &rows)?;
    let index = ColumnIndex::build(&headers)?;
    let resolver = resolver_from(&cfg.images);

    let mut report = LoadReport {
        total_rows: rows.len(),
        ..LoadReport::default()
    };
    let mut records: Vec<TrafficRecord> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        // Spreadsheet-style line number (header is line 1).
        let line = i + 2;
        records.push(build_record(row, line, &index, cfg, resolver.as_ref(), &mut report)?);
    }

    if report.missing_coords > 0 || report.unparsed_counts > 0 || report.unresolved_images > 0 {
        warn!(
            missing_coords = report.missing_coords,
            unparsed_counts = report.unparsed_counts,
            unresolved_images = report.unresolved_images,
            "load completed with degraded rows"
        );
    }
    info!(rows = report.total_rows, "canonical table ready");

    Ok((TrafficTable { records }, report))
}

/// Load the snapshot configured for a granularity.
pub fn load_granularity(
    granularity: Granularity,
    cfg: &AppConfig,
) -> Result<(TrafficTable, LoadReport), LoadError> {
    load_table(cfg.source_path(granularity), cfg)
}

fn build_record(
    row: &StringRecord,
    line: usize,
    index: &ColumnIndex,
    cfg: &AppConfig,
    resolver: &dyn ImageResolver,
    report: &mut LoadReport,
) -> Result<TrafficRecord, LoadError> {
    let cell = |i: usize| row.get(i).unwrap_or("").trim();

    let raw_date = cell(index.date);
    let date = parse_date_flexible(Some(raw_date), &cfg.data.date_format).ok_or_else(|| {
        LoadError::DateParse {
            line,
            value: raw_date.to_string(),
        }
    })?;

    let longitude = parse_f64_safe(row.get(index.long));
    let latitude = parse_f64_safe(row.get(index.lat));
    if longitude.is_none() || latitude.is_none() {
        report.missing_coords += 1;
    }

    let total_vehicles = count_cell(row.get(index.total), &mut report.unparsed_counts);
    let mut vehicle_counts = BTreeMap::new();
    for (class, i) in &index.classes {
        vehicle_counts.insert(*class, count_cell(row.get(*i), &mut report.unparsed_counts));
    }

    let location_id = cell(index.location).to_string();
    let raw_url = index.url.and_then(|i| row.get(i)).map(str::trim).filter(|s| !s.is_empty());
    let image_reference = resolver.resolve(&location_id, raw_url);
    if raw_url.is_some() && image_reference.is_none() {
        report.unresolved_images += 1;
    }

    Ok(TrafficRecord {
        project_id: cell(index.project).to_string(),
        date,
        time_interval: cell(index.interval).to_string(),
        direction_id: cell(index.direction).to_string(),
        location_id,
        location_name: cell(index.name).to_string(),
        longitude,
        latitude,
        total_vehicles,
        vehicle_counts,
        image_reference,
    })
}

/// Count cells are 0 when empty; non-empty garbage also degrades to 0 but is
/// tallied so the load summary can call it out.
fn count_cell(raw: Option<&str>, unparsed: &mut usize) -> u64 {
    match raw.map(str::trim) {
        None => 0,
        Some("") => 0,
        Some(s) => match parse_u64_safe(Some(s)) {
            Some(n) => n,
            None => {
                *unparsed += 1;
                0
            }
        },
    }
}
