// Entry point and terminal flow for the traffic-count dashboard.
//
// - Option [1] loads one of the two count datasets (hourly / 15-minute).
// - Option [2] computes intersection statistics for a picked selection.
// - Option [3] prints the map summary for a date and time interval.
// - Option [4] exports the current selection to CSV/JSON files.
// - Option [5] runs data diagnostics over the loaded dataset.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use traffic_dashboard::config::AppConfig;
use traffic_dashboard::types::{Granularity, GeoSummary, IntersectionStats, TrafficTable};
use traffic_dashboard::{diagnostics, geo, loader, output, stats, util};

type StatsKey = (Option<String>, String, String);
type GeoKey = (Option<String>, NaiveDate, String, Option<String>);

// In-memory app state: the table loads once per granularity switch, and
// repeated selections within a session come out of the caches instead of
// being recomputed.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        granularity: None,
        table: None,
        stats_cache: HashMap::new(),
        geo_cache: HashMap::new(),
    })
});

struct AppState {
    granularity: Option<Granularity>,
    table: Option<TrafficTable>,
    stats_cache: HashMap<StatsKey, IntersectionStats>,
    geo_cache: HashMap<GeoKey, GeoSummary>,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Print a numbered list and return the entry the user picks.
fn pick_from_list<T: std::fmt::Display + Clone>(title: &str, options: &[T]) -> Option<T> {
    if options.is_empty() {
        println!("No options available.\n");
        return None;
    }
    println!("{}:", title);
    for (i, option) in options.iter().enumerate() {
        println!("[{}] {}", i + 1, option);
    }
    match read_choice().parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => Some(options[n - 1].clone()),
        _ => {
            println!("Invalid choice.\n");
            None
        }
    }
}

/// Numbered pick where `[0]` is an explicit "none" entry. The outer `None`
/// means the user typed something invalid and the flow should abort.
fn pick_optional(title: &str, none_label: &str, options: &[String]) -> Option<Option<String>> {
    println!("{}:", title);
    println!("[0] {}", none_label);
    for (i, option) in options.iter().enumerate() {
        println!("[{}] {}", i + 1, option);
    }
    match read_choice().parse::<usize>() {
        Ok(0) => Some(None),
        Ok(n) if n <= options.len() => Some(Some(options[n - 1].clone())),
        _ => {
            println!("Invalid choice.\n");
            None
        }
    }
}

/// Project pick; `Some(None)` is "all projects". Skipped entirely when the
/// table only carries one project.
fn pick_project(table: &TrafficTable) -> Option<Option<String>> {
    let projects = table.project_ids();
    if projects.len() <= 1 {
        return Some(None);
    }
    pick_optional("Select project", "All projects", &projects)
}

struct Selection {
    project: Option<String>,
    date: NaiveDate,
    time_interval: String,
    location_id: String,
}

/// Walk the user through project, date, time interval, and location, each
/// offered from the values actually present in the loaded table.
fn prompt_selection(table: &TrafficTable) -> Option<Selection> {
    let project = pick_project(table)?;
    let project_ref = project.as_deref();
    let date = pick_from_list("Select date", &table.dates(project_ref))?;
    let time_interval =
        pick_from_list("Select time interval", &table.time_intervals(date, project_ref))?;
    let location_id = pick_from_list("Select location", &table.location_ids(project_ref))?;
    Some(Selection {
        project,
        date,
        time_interval,
        location_id,
    })
}

/// Clone the loaded table out of the app state, or print the standard
/// "load first" message.
fn current_table() -> Option<TrafficTable> {
    let state = APP_STATE.lock().unwrap();
    match &state.table {
        Some(table) => Some(table.clone()),
        None => {
            println!("Error: No dataset loaded. Please load a dataset first (option 1).\n");
            None
        }
    }
}

fn cached_stats(table: &TrafficTable, selection: &Selection) -> IntersectionStats {
    let key: StatsKey = (
        selection.project.clone(),
        selection.time_interval.clone(),
        selection.location_id.clone(),
    );
    let mut state = APP_STATE.lock().unwrap();
    if let Some(hit) = state.stats_cache.get(&key) {
        return hit.clone();
    }
    let computed = stats::intersection_stats(
        table,
        &selection.location_id,
        &selection.time_interval,
        selection.project.as_deref(),
    );
    state.stats_cache.insert(key, computed.clone());
    computed
}

fn cached_geo(
    table: &TrafficTable,
    project: Option<String>,
    date: NaiveDate,
    time_interval: String,
    selected: Option<String>,
    cfg: &AppConfig,
) -> Option<GeoSummary> {
    let key: GeoKey = (project.clone(), date, time_interval.clone(), selected.clone());
    {
        let state = APP_STATE.lock().unwrap();
        if let Some(hit) = state.geo_cache.get(&key) {
            return Some(hit.clone());
        }
    }
    let computed = geo::geo_summary(
        table,
        &time_interval,
        date,
        project.as_deref(),
        selected.as_deref(),
        &cfg.map,
    )?;
    let mut state = APP_STATE.lock().unwrap();
    state.geo_cache.insert(key, computed.clone());
    Some(computed)
}

/// Handle option [1]: load (or switch) the count dataset.
///
/// Picking the granularity that is already loaded keeps the current table;
/// switching rebuilds the table and drops every cached result.
fn handle_load(cfg: &AppConfig) {
    println!("Select dataset granularity:");
    println!("[1] {}", Granularity::Hourly.label());
    println!("[2] {}", Granularity::FifteenMinute.label());
    let granularity = match read_choice().as_str() {
        "1" => Granularity::Hourly,
        "2" => Granularity::FifteenMinute,
        _ => {
            println!("Invalid choice. Please enter 1 or 2.\n");
            return;
        }
    };

    {
        let state = APP_STATE.lock().unwrap();
        if state.table.is_some() && state.granularity == Some(granularity) {
            println!("{} dataset already loaded.\n", granularity.label());
            return;
        }
    }

    match loader::load_granularity(granularity, cfg) {
        Ok((table, report)) => {
            println!(
                "Processing dataset... ({} rows loaded)",
                util::format_int(report.total_rows)
            );
            if report.missing_coords > 0 {
                println!(
                    "Note: {} rows have no usable coordinates.",
                    util::format_int(report.missing_coords)
                );
            }
            if report.unparsed_counts > 0 {
                println!(
                    "Note: {} count cells could not be parsed and were treated as 0.",
                    util::format_int(report.unparsed_counts)
                );
            }
            if report.unresolved_images > 0 {
                println!(
                    "Note: {} image links could not be resolved.",
                    util::format_int(report.unresolved_images)
                );
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.granularity = Some(granularity);
            state.table = Some(table);
            state.stats_cache.clear();
            state.geo_cache.clear();
        }
        Err(e) => {
            eprintln!("Failed to load dataset: {}\n", e);
        }
    }
}

/// Handle option [2]: statistics for one (location, time interval) pick,
/// plus the per-direction flow on the picked date.
fn handle_stats() {
    let Some(table) = current_table() else {
        return;
    };
    let Some(selection) = prompt_selection(&table) else {
        return;
    };

    let stats_result = cached_stats(&table, &selection);

    println!(
        "\nIntersection {} at {}",
        selection.location_id, selection.time_interval
    );
    println!(
        "Total Vehicles: {}",
        util::format_int(stats_result.total_vehicles)
    );
    if stats_result.total_vehicles == 0 {
        println!("No traffic recorded for this selection.");
    }
    let composition = output::composition_rows(&stats_result);
    if !composition.is_empty() {
        output::preview_table_rows(&composition, 10);
    }
    match &stats_result.image_reference {
        Some(url) => println!("Intersection image: {}", url),
        None => println!("No intersection image available."),
    }

    let flows = stats::direction_breakdown(
        &table,
        &selection.location_id,
        &selection.time_interval,
        selection.date,
        selection.project.as_deref(),
    );
    if flows.is_empty() {
        println!("No direction data on {}.\n", selection.date);
    } else {
        println!("\nTraffic flow by direction on {}:", selection.date);
        output::preview_table_rows(&output::direction_rows(&flows), 20);
    }
}

/// Handle option [3]: map summary (one row per location marker) for a
/// picked date and time interval, with an optional highlighted location.
fn handle_map(cfg: &AppConfig) {
    let Some(table) = current_table() else {
        return;
    };
    let Some(project) = pick_project(&table) else {
        return;
    };
    let project_ref = project.as_deref();
    let Some(date) = pick_from_list("Select date", &table.dates(project_ref)) else {
        return;
    };
    let Some(time_interval) =
        pick_from_list("Select time interval", &table.time_intervals(date, project_ref))
    else {
        return;
    };
    let Some(selected) =
        pick_optional("Highlight location", "None", &table.location_ids(project_ref))
    else {
        return;
    };

    let Some(summary) = cached_geo(&table, project, date, time_interval.clone(), selected, cfg)
    else {
        println!("No data available for the selected filters.\n");
        return;
    };

    println!("\nMap summary for {} at {}:", date, time_interval);
    output::preview_table_rows(&output::location_rows(&summary), 25);
    println!(
        "Map center: {:.5}, {:.5} (zoom {}, {} tiles)\n",
        summary.center.lat, summary.center.long, cfg.map.zoom_start, cfg.map.tile_style
    );

    // Stand-in for clicking the rendered map: type a coordinate pair and
    // get the closest counting location back.
    print!("Find nearest location to \"lat,long\" (blank to skip): ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    let entry = buf.trim();
    if !entry.is_empty() {
        match parse_lat_long(entry) {
            Some((lat, long)) => match geo::nearest_location(&table, lat, long) {
                Some(id) => println!("Nearest location: {}\n", id),
                None => println!("No locations with coordinates available.\n"),
            },
            None => println!("Could not parse coordinates.\n"),
        }
    }
}

fn parse_lat_long(entry: &str) -> Option<(f64, f64)> {
    let (lat, long) = entry.split_once(',')?;
    Some((lat.trim().parse().ok()?, long.trim().parse().ok()?))
}

/// Handle option [4]: write the current selection out as files.
///
/// Side-effectful on purpose: a composition CSV, a stats JSON, and the
/// location table CSV for the same date/interval.
fn handle_export(cfg: &AppConfig) {
    let Some(table) = current_table() else {
        return;
    };
    let Some(selection) = prompt_selection(&table) else {
        return;
    };

    println!("\nExporting selection...");

    let stats_result = cached_stats(&table, &selection);
    let composition_file = "intersection_composition.csv";
    if let Err(e) = output::write_csv(composition_file, &output::composition_rows(&stats_result)) {
        eprintln!("Write error: {}", e);
    }
    println!("Composition table exported to {}", composition_file);

    let stats_file = "intersection_stats.json";
    if let Err(e) = output::write_json(stats_file, &stats_result) {
        eprintln!("Write error: {}", e);
    }
    println!("Statistics exported to {}", stats_file);

    let summary = cached_geo(
        &table,
        selection.project.clone(),
        selection.date,
        selection.time_interval.clone(),
        Some(selection.location_id.clone()),
        cfg,
    );
    match summary {
        Some(summary) => {
            let map_file = "map_locations.csv";
            if let Err(e) = output::write_csv(map_file, &output::location_rows(&summary)) {
                eprintln!("Write error: {}", e);
            }
            println!("Location table exported to {}\n", map_file);
        }
        None => println!("No mappable rows for this selection, location table skipped.\n"),
    }
}

/// Handle option [5]: data quality checks over the loaded table, plus a
/// consistency pass against the other granularity when its file loads.
fn handle_diagnostics(cfg: &AppConfig) {
    let snapshot = {
        let state = APP_STATE.lock().unwrap();
        state.granularity.zip(state.table.clone())
    };
    let Some((granularity, table)) = snapshot else {
        println!("Error: No dataset loaded. Please load a dataset first (option 1).\n");
        return;
    };

    let structure = diagnostics::structure_report(&table);
    println!("\nDataset structure ({})", granularity.label());
    println!("Rows: {}", util::format_int(structure.rows));
    println!("Locations: {}", util::format_int(structure.locations));
    println!("Projects: {}", util::format_int(structure.projects));
    println!("Dates: {}", util::format_int(structure.dates));
    println!("Time intervals: {}", util::format_int(structure.time_intervals));
    if !structure.interval_sample.is_empty() {
        println!("Interval labels: {}", structure.interval_sample.join(", "));
    }
    if let Some((first, last)) = structure.date_range {
        println!("Date range: {} to {}", first, last);
    }

    let missing = diagnostics::missing_value_report(&table);
    println!("\nMissing values");
    println!(
        "Rows without coordinates: {}",
        util::format_int(missing.missing_coordinates)
    );
    println!(
        "Rows without images: {}",
        util::format_int(missing.missing_images)
    );
    println!(
        "Duplicate directional rows: {}",
        util::format_int(missing.duplicate_rows)
    );
    println!("");

    let anomalies = diagnostics::coordinate_anomalies(&table);
    if anomalies.is_empty() {
        println!("No out-of-range coordinates found.");
    } else {
        println!("Out-of-range coordinates:");
        output::preview_table_rows(&anomalies, 10);
    }

    let mismatches = diagnostics::composition_mismatches(&table);
    if mismatches.is_empty() {
        println!("No totals disagree with their class sums.\n");
    } else {
        println!("Totals disagreeing with class sums:");
        output::preview_table_rows(&mismatches, 10);
    }

    let other = match granularity {
        Granularity::Hourly => Granularity::FifteenMinute,
        Granularity::FifteenMinute => Granularity::Hourly,
    };
    match loader::load_granularity(other, cfg) {
        Ok((other_table, _)) => {
            let consistency = diagnostics::consistency_report(&table, &other_table);
            println!(
                "Cross-dataset consistency ({} vs {}):",
                granularity.label(),
                other.label()
            );
            println!(
                "Common locations: {}",
                util::format_int(consistency.common_locations)
            );
            if !consistency.only_in_first.is_empty() {
                println!(
                    "Only in {}: {}",
                    granularity.label(),
                    consistency.only_in_first.join(", ")
                );
            }
            if !consistency.only_in_second.is_empty() {
                println!(
                    "Only in {}: {}",
                    other.label(),
                    consistency.only_in_second.join(", ")
                );
            }
            if let (Some((a1, a2)), Some((b1, b2))) =
                (consistency.first_date_range, consistency.second_date_range)
            {
                println!(
                    "{} covers {} to {}; {} covers {} to {}",
                    granularity.label(),
                    a1,
                    a2,
                    other.label(),
                    b1,
                    b2
                );
            }
            println!("");
        }
        Err(e) => {
            println!(
                "Skipping cross-dataset check ({} not loadable: {}).\n",
                other.label(),
                e
            );
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return;
        }
    };

    loop {
        println!("Traffic Count Dashboard");
        println!("[1] Load dataset");
        println!("[2] Intersection statistics");
        println!("[3] Map summary");
        println!("[4] Export selection");
        println!("[5] Data diagnostics");
        println!("[q] Quit\n");
        match read_choice().as_str() {
            "1" => handle_load(&cfg),
            "2" => handle_stats(),
            "3" => handle_map(&cfg),
            "4" => handle_export(&cfg),
            "5" => handle_diagnostics(&cfg),
            "q" | "Q" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-5 or q.\n");
            }
        }
    }
}
