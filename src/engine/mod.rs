//! Region query engine.
//!
//! Merges user-drawn polygons, intersects them against the boundary layer
//! using an R-tree pre-filter, and groups the matched units by parent.

mod drawing;
mod index;
mod merge;
mod outcome;
mod resolve;

pub use drawing::{drawings_from_value, parse_drawings};
pub use index::UnitIndex;
pub use merge::merge_regions;
pub use outcome::Outcome;
pub use resolve::RegionQueryEngine;
