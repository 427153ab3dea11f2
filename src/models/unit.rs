//! Boundary records and user-drawn regions.

use geo::{BoundingRect, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

/// A single administrative unit (commune/ward) with its parent district
#[derive(Debug, Clone)]
pub struct AdministrativeUnit {
    /// Unit name, e.g. the commune
    pub unit_name: String,

    /// Parent unit name, e.g. the district. Used as the grouping key.
    pub parent_name: String,

    /// Boundary in WGS84 lon/lat
    pub geometry: MultiPolygon<f64>,
}

impl AdministrativeUnit {
    pub fn new(
        unit_name: impl Into<String>,
        parent_name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            parent_name: parent_name.into(),
            geometry,
        }
    }

    /// Get the bounding box of this unit
    pub fn bbox(&self) -> Option<GeoBbox> {
        self.geometry.bounding_rect().map(|rect| {
            GeoBbox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        })
    }
}

/// One polygon contributed by the drawing tool.
///
/// The drawing tool always reports its full state, so a query takes the
/// complete set of regions rather than a delta.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnRegion {
    pub geometry: MultiPolygon<f64>,
}

impl DrawnRegion {
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self { geometry }
    }
}

impl From<Polygon<f64>> for DrawnRegion {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::new(MultiPolygon::new(vec![polygon]))
    }
}

impl From<MultiPolygon<f64>> for DrawnRegion {
    fn from(geometry: MultiPolygon<f64>) -> Self {
        Self::new(geometry)
    }
}

/// Bounding box as `[min_lon, min_lat, max_lon, max_lat]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBbox(pub [f64; 4]);

impl GeoBbox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self([min_lon, min_lat, max_lon, max_lat])
    }

    pub fn min_lon(&self) -> f64 {
        self.0[0]
    }

    pub fn min_lat(&self) -> f64 {
        self.0[1]
    }

    pub fn max_lon(&self) -> f64 {
        self.0[2]
    }

    pub fn max_lat(&self) -> f64 {
        self.0[3]
    }

    /// Smallest box covering both
    pub fn union(&self, other: &GeoBbox) -> GeoBbox {
        GeoBbox::new(
            self.min_lon().min(other.min_lon()),
            self.min_lat().min(other.min_lat()),
            self.max_lon().max(other.max_lon()),
            self.max_lat().max(other.max_lat()),
        )
    }

    /// Center as (lon, lat)
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon() + self.max_lon()) / 2.0,
            (self.min_lat() + self.max_lat()) / 2.0,
        )
    }
}

impl std::fmt::Display for GeoBbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon(),
            self.min_lat(),
            self.max_lon(),
            self.max_lat()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_unit_bbox() {
        let square = polygon![
            (x: 104.0, y: 19.0),
            (x: 105.0, y: 19.0),
            (x: 105.0, y: 20.0),
            (x: 104.0, y: 20.0),
        ];
        let unit = AdministrativeUnit::new("Nghi Phong", "Nghi Loc", MultiPolygon::new(vec![square]));
        let bbox = unit.bbox().unwrap();
        assert_eq!(bbox, GeoBbox::new(104.0, 19.0, 105.0, 20.0));
        assert_eq!(bbox.center(), (104.5, 19.5));
    }

    #[test]
    fn test_empty_geometry_has_no_bbox() {
        let unit = AdministrativeUnit::new("X", "Y", MultiPolygon::new(vec![]));
        assert!(unit.bbox().is_none());
    }

    #[test]
    fn test_bbox_display() {
        let bbox = GeoBbox::new(102.5, 17.25, 107.0, 21.0);
        assert_eq!(bbox.to_string(), "102.5,17.25,107,21");
    }
}
