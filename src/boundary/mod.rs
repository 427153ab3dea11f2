//! Administrative boundary layer.
//!
//! Reads the commune/ward dataset once, reprojects it to WGS84 and keeps it
//! as an immutable, load-ordered table of units.

mod layer;
mod project;
mod source;

pub use layer::BoundaryLayer;
pub use project::Reprojector;
pub use source::{read_units, BoundaryFormat, BoundarySource};
