//! Wardmap - list the communes inside regions drawn on a map
//!
//! This library provides the boundary layer, the region query engine and the
//! export and radar collaborators shared by the `serve` and `resolve` binaries.

pub mod boundary;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod models;
pub mod radar;

pub use boundary::{BoundaryLayer, BoundarySource};
pub use engine::{Outcome, RegionQueryEngine};
pub use error::{DataLoadError, ExportError, GeometryError, RadarError};
pub use models::{AdministrativeUnit, DrawnRegion, ExportRow, SelectionResult};
