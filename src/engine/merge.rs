//! Union of drawn regions into one merged region.

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{Area, BooleanOps, MultiPolygon, Polygon};
use tracing::debug;

use crate::error::GeometryError;
use crate::models::DrawnRegion;

/// Drawn polygons that survived validation, with their union.
///
/// The union snaps coordinates to the boolean-op grid, so predicates run
/// against `members`, which keep the drawn coordinates unchanged.
#[derive(Debug, Clone)]
pub struct MergedRegion {
    pub members: MultiPolygon<f64>,
    pub union: MultiPolygon<f64>,
}

impl MergedRegion {
    pub fn is_empty(&self) -> bool {
        self.members.0.is_empty()
    }
}

/// Validate and union all drawn polygons.
///
/// Overlapping and adjacent members are merged. Zero-area members are
/// absorbed. Non-finite coordinates fail with [`GeometryError::NonFinite`].
pub fn merge_regions(regions: &[DrawnRegion]) -> Result<MergedRegion, GeometryError> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for (index, region) in regions.iter().enumerate() {
        if !is_finite(&region.geometry) {
            return Err(GeometryError::NonFinite { index });
        }
        for polygon in region.geometry.iter() {
            if polygon.unsigned_area() > 0.0 {
                polygons.push(polygon.clone());
            } else {
                debug!("Absorbing zero-area polygon from drawing {}", index);
            }
        }
    }

    let union = catch_unwind(AssertUnwindSafe(|| {
        polygons
            .iter()
            .fold(MultiPolygon::new(Vec::new()), |merged, polygon| merged.union(polygon))
    }))
    .map_err(|payload| GeometryError::Topology(panic_message(payload.as_ref())))?;

    Ok(MergedRegion {
        members: MultiPolygon::new(polygons),
        union,
    })
}

fn is_finite(geometry: &MultiPolygon<f64>) -> bool {
    use geo::CoordsIter;
    geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "boolean operation failed".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: f64, y: f64, size: f64) -> DrawnRegion {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
        .into()
    }

    #[test]
    fn test_empty_input_is_empty_region() {
        assert!(merge_regions(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_squares_merge() {
        let merged = merge_regions(&[square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)]).unwrap();
        assert_eq!(merged.members.0.len(), 2);
        assert_eq!(merged.union.0.len(), 1);
        assert!((merged.union.unsigned_area() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_polygon_is_idempotent() {
        let once = merge_regions(&[square(0.0, 0.0, 1.0)]).unwrap();
        let twice = merge_regions(&[square(0.0, 0.0, 1.0), square(0.0, 0.0, 1.0)]).unwrap();
        assert!((once.union.unsigned_area() - twice.union.unsigned_area()).abs() < 1e-12);
        assert_eq!(twice.union.0.len(), 1);
    }

    #[test]
    fn test_disjoint_squares_stay_separate() {
        let merged = merge_regions(&[square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]).unwrap();
        assert_eq!(merged.union.0.len(), 2);
    }

    #[test]
    fn test_zero_area_sliver_absorbed() {
        let sliver: DrawnRegion = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 2.0, y: 2.0),
        ]
        .into();
        let merged = merge_regions(&[sliver.clone(), square(10.0, 10.0, 1.0)]).unwrap();
        assert_eq!(merged.members.0.len(), 1);
        assert_eq!(merged.union.0.len(), 1);

        assert!(merge_regions(&[sliver]).unwrap().is_empty());
    }

    #[test]
    fn test_members_keep_drawn_coordinates() {
        let x = 104.1546913568;
        let drawn: DrawnRegion = polygon![
            (x: x, y: 19.2031),
            (x: x + 0.0371, y: 19.2031),
            (x: x + 0.0371, y: 19.2377),
            (x: x, y: 19.2377),
        ]
        .into();
        let merged = merge_regions(&[drawn.clone()]).unwrap();
        assert_eq!(merged.members, drawn.geometry);
    }

    #[test]
    fn test_non_finite_coordinate() {
        let bad: DrawnRegion = polygon![
            (x: 0.0, y: 0.0),
            (x: f64::NAN, y: 0.0),
            (x: 1.0, y: 1.0),
        ]
        .into();
        assert!(matches!(
            merge_regions(&[square(0.0, 0.0, 1.0), bad]),
            Err(GeometryError::NonFinite { index: 1 })
        ));
    }
}
