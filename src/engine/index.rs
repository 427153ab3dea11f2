//! Spatial index for candidate unit lookups.

use geo::{BoundingRect, MultiPolygon};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use crate::models::AdministrativeUnit;

/// Envelope of one unit, pointing back at its load-order position
#[derive(Clone)]
pub struct IndexedUnit {
    pub position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedUnit {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedUnit {
    pub fn new(position: usize, unit: &AdministrativeUnit) -> Option<Self> {
        let bbox = unit.bbox()?;
        Some(Self {
            position,
            envelope: AABB::from_corners(
                [bbox.min_lon(), bbox.min_lat()],
                [bbox.max_lon(), bbox.max_lat()],
            ),
        })
    }
}

/// R-tree over unit envelopes.
///
/// Only narrows the candidate set; callers still apply the exact predicate.
pub struct UnitIndex {
    tree: RTree<IndexedUnit>,
}

impl UnitIndex {
    pub fn build(units: &[AdministrativeUnit]) -> Self {
        let indexed: Vec<IndexedUnit> = units
            .iter()
            .enumerate()
            .filter_map(|(position, unit)| IndexedUnit::new(position, unit))
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Spatial index built with {} entries", tree.size());

        Self { tree }
    }

    /// Load-order positions of units whose envelope touches any polygon
    /// envelope of `region`, sorted and deduplicated
    pub fn candidates(&self, region: &MultiPolygon<f64>) -> Vec<usize> {
        let mut positions: Vec<usize> = region
            .iter()
            .filter_map(|polygon| polygon.bounding_rect())
            .flat_map(|rect| {
                let envelope =
                    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
                self.tree
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|iu| iu.position)
                    .collect::<Vec<_>>()
            })
            .collect();

        positions.sort_unstable();
        positions.dedup();
        positions
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
