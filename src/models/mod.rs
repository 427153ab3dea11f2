//! Core data models for the region query pipeline.

pub mod selection;
pub mod unit;

pub use selection::{ExportRow, ParentGroup, SelectionResult, EXPORT_DELIMITER};
pub use unit::{AdministrativeUnit, DrawnRegion, GeoBbox};
