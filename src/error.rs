//! Error taxonomy for loading, querying, exporting and radar fetches.

use std::path::PathBuf;

use thiserror::Error;

/// Boundary dataset could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("boundary dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported boundary format for {}: expected .shp, .json or .geojson", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to read boundary dataset {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("feature {index} in {}: missing or empty field '{field}'", path.display())]
    MissingField {
        path: PathBuf,
        index: usize,
        field: String,
    },

    #[error("feature {index} in {}: {message}", path.display())]
    InvalidGeometry {
        path: PathBuf,
        index: usize,
        message: String,
    },

    #[error("failed to reproject boundary dataset: {0}")]
    Projection(String),
}

/// Drawn input could not be turned into a query region. Recoverable.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("malformed drawing payload: {0}")]
    Malformed(String),

    #[error("drawing {index}: unsupported geometry type '{kind}', expected Polygon or MultiPolygon")]
    UnsupportedType { index: usize, kind: String },

    #[error("drawing {index}: polygon has no coordinates")]
    MissingCoordinates { index: usize },

    #[error("drawing {index}: non-finite coordinate")]
    NonFinite { index: usize },

    #[error("invalid topology while merging drawn regions: {0}")]
    Topology(String),
}

/// Export could not be produced. Recoverable.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export workbook error: {0}")]
    Sheet(String),
}

/// Radar frame could not be fetched. Affects the overlay only.
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("radar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("radar frame {timestamp} unavailable: HTTP {status}")]
    Unavailable { timestamp: String, status: u16 },

    #[error("no radar frame available")]
    NoFrame,
}
