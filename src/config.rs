use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::boundary::BoundarySource;

pub const DEFAULT_UNIT_FIELD: &str = "Xa";
pub const DEFAULT_PARENT_FIELD: &str = "Diem";
pub const DEFAULT_EXPORT_FILE_NAME: &str = "xa_trong_vung_ve.xlsx";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub boundary: BoundaryConfig,
    pub export: ExportConfig,
    pub radar: Option<RadarConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoundaryConfig {
    pub path: PathBuf,
    pub unit_field: String,
    pub parent_field: String,
    /// PROJ.4 definition of the dataset CRS; `None` means WGS84 lon/lat
    pub source_proj: Option<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Xa_NA_chuan.shp"),
            unit_field: DEFAULT_UNIT_FIELD.to_string(),
            parent_field: DEFAULT_PARENT_FIELD.to_string(),
            source_proj: None,
        }
    }
}

impl BoundaryConfig {
    pub fn source(&self) -> BoundarySource {
        BoundarySource {
            path: self.path.clone(),
            unit_field: self.unit_field.clone(),
            parent_field: self.parent_field.clone(),
            source_proj: self.source_proj.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub template: Option<PathBuf>,
    /// 1-based row of the first written row in the template
    pub start_row: usize,
    /// 1-based column of the parent name in the template
    pub start_col: usize,
    pub header: [String; 2],
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            template: None,
            start_row: 3,
            start_col: 1,
            header: ["District".to_string(), "Communes".to_string()],
            file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RadarConfig {
    /// Frame URL with a `{timestamp}` placeholder (`%Y%m%d%H%M`, UTC)
    pub url_template: String,
    /// Overlay extent: `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: [f64; 4],
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    0.6
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
