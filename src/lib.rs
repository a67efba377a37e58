//! Loading, cleaning, and aggregation for intersection traffic-count
//! datasets: the data layer behind the count dashboard.

pub mod columns;
pub mod config;
pub mod diagnostics;
pub mod geo;
pub mod images;
pub mod loader;
pub mod output;
pub mod stats;
pub mod types;
pub mod util;
pub mod validate;
