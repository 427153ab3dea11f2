//! Resolve drawn regions to matched units grouped by parent.

use std::collections::BTreeMap;
use std::sync::Arc;

use geo::Intersects;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::index::UnitIndex;
use super::merge::merge_regions;
use super::outcome::Outcome;
use crate::boundary::BoundaryLayer;
use crate::error::GeometryError;
use crate::models::{DrawnRegion, ExportRow, ParentGroup, SelectionResult};

/// Spatial query over a boundary layer.
///
/// Holds no state between calls beyond the read-only layer and its index.
pub struct RegionQueryEngine {
    boundary: Arc<BoundaryLayer>,
    index: UnitIndex,
}

impl RegionQueryEngine {
    pub fn new(boundary: Arc<BoundaryLayer>) -> Self {
        let index = UnitIndex::build(boundary.all_units());
        Self { boundary, index }
    }

    pub fn boundary(&self) -> &BoundaryLayer {
        &self.boundary
    }

    /// Units intersecting the union of `drawn_regions`, grouped by parent.
    ///
    /// Boundary-only contact counts as a match. Groups follow the parent's
    /// first appearance in the dataset; names within a group are sorted and
    /// unique.
    pub fn resolve(&self, drawn_regions: &[DrawnRegion]) -> Result<SelectionResult, GeometryError> {
        if drawn_regions.is_empty() {
            return Ok(SelectionResult::empty());
        }

        let merged = merge_regions(drawn_regions)?;
        if merged.is_empty() {
            debug!("No drawing of {} has a non-zero area", drawn_regions.len());
            return Ok(SelectionResult::empty());
        }

        // Test against the drawn members: the union is snapped to a grid and
        // would lose exact edge contact
        let units = self.boundary.all_units();
        let candidates = self.index.candidates(&merged.members);

        let matched: Vec<usize> = candidates
            .into_par_iter()
            .filter(|&position| units[position].geometry.intersects(&merged.members))
            .collect();

        debug!(
            "{} drawings merged into {} polygons, {} units matched",
            drawn_regions.len(),
            merged.union.0.len(),
            matched.len()
        );

        let matched_count = matched.len();
        let mut by_parent: BTreeMap<(usize, &str), Vec<&str>> = BTreeMap::new();
        for position in matched {
            let unit = &units[position];
            // Every parent of a loaded unit has a rank
            let rank = self
                .boundary
                .parent_rank(&unit.parent_name)
                .unwrap_or(usize::MAX);
            by_parent
                .entry((rank, unit.parent_name.as_str()))
                .or_default()
                .push(unit.unit_name.as_str());
        }

        let groups = by_parent
            .into_iter()
            .map(|((_, parent), mut names)| {
                names.sort_unstable();
                names.dedup();
                ParentGroup {
                    parent: parent.to_string(),
                    units: names.into_iter().map(String::from).collect(),
                }
            })
            .collect();

        Ok(SelectionResult::from_groups(groups).with_matched(matched_count))
    }

    /// Resolve and classify into an [`Outcome`] for reporting to the user
    pub fn query(&self, drawn_regions: &[DrawnRegion]) -> Outcome {
        if drawn_regions.is_empty() {
            return Outcome::NothingDrawn;
        }

        match self.resolve(drawn_regions) {
            Ok(result) if result.is_empty() => Outcome::NoMatch,
            Ok(result) => {
                info!(
                    "Found {} units ({} distinct names) in {} parents",
                    result.matched_count(),
                    result.unit_count(),
                    result.len()
                );
                Outcome::Found(result)
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                Outcome::Failed(e)
            }
        }
    }

    /// One row per group, names joined with `", "`, in result order
    pub fn to_export_rows(result: &SelectionResult) -> Vec<ExportRow> {
        result.groups().iter().map(ExportRow::from_group).collect()
    }
}
