use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Granularity;

/// Which tier function drives marker colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorPolicy {
    /// Tier on the raw summed volume.
    AbsoluteVolume,
    /// Tier on volume divided by the assumed roadway capacity.
    CapacityRatio,
}

/// Where image references come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Canonicalize sharing URLs from the URL column into direct-view links.
    Remote,
    /// Derive `loc<ID>.<ext>` paths under a local image directory.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub hourly_path: PathBuf,
    pub fifteen_min_path: PathBuf,
    pub date_format: String,
    pub chunk_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            hourly_path: PathBuf::from("traffic-count.csv"),
            fifteen_min_path: PathBuf::from("traffic-count-15min.csv"),
            date_format: "%Y-%m-%d".to_string(),
            chunk_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Assumed roadway capacity in vehicles per hour, for v/c tiering.
    pub capacity_assumption: f64,
    pub default_lat: f64,
    pub default_long: f64,
    pub marker_scale: f64,
    pub zoom_start: u32,
    pub tile_style: String,
    pub color_policy: ColorPolicy,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            capacity_assumption: 1200.0,
            default_lat: 0.0,
            default_long: 0.0,
            marker_scale: 3.0,
            zoom_start: 14,
            tile_style: "CartoDB positron".to_string(),
            color_policy: ColorPolicy::AbsoluteVolume,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub mode: ImageMode,
    pub local_dir: PathBuf,
    pub extension: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            mode: ImageMode::Remote,
            local_dir: PathBuf::from("images"),
            extension: "jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub map: MapConfig,
    pub images: ImageConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("map.capacity_assumption must be a positive number, got {0}")]
    InvalidCapacity(f64),
}

impl AppConfig {
    /// Load configuration from the `TRAFFIC_DASHBOARD_CONFIG` path (TOML) if
    /// present, falling back to the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("TRAFFIC_DASHBOARD_CONFIG")
            .unwrap_or_else(|_| "dashboard.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&s)?
        } else {
            AppConfig::default()
        };
        // The capacity divides marker volumes; anything but a positive
        // finite number poisons every ratio.
        let capacity = cfg.map.capacity_assumption;
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(ConfigError::InvalidCapacity(capacity));
        }
        Ok(cfg)
    }

    /// CSV path for the given data granularity.
    pub fn source_path(&self, granularity: Granularity) -> &Path {
        match granularity {
            Granularity::Hourly => &self.data.hourly_path,
            Granularity::FifteenMinute => &self.data.fifteen_min_path,
        }
    }
}
