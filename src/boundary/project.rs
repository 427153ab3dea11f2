//! Reprojection of boundary geometry to WGS84 lon/lat.

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj, transform::transform};

use crate::error::DataLoadError;

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// Converts coordinates from a source CRS (PROJ.4 string) to WGS84 degrees
pub struct Reprojector {
    from: Proj,
    to: Proj,
    /// Geographic sources are given in degrees and must be fed in radians
    source_is_geographic: bool,
}

impl Reprojector {
    pub fn new(source_proj: &str) -> Result<Self, DataLoadError> {
        let from = Proj::from_proj_string(source_proj).map_err(|e| {
            DataLoadError::Projection(format!("invalid source CRS '{source_proj}': {e}"))
        })?;
        let to = Proj::from_proj_string(WGS84_PROJ4)
            .map_err(|e| DataLoadError::Projection(format!("invalid WGS84 CRS: {e}")))?;

        Ok(Self {
            from,
            to,
            source_is_geographic: is_geographic(source_proj),
        })
    }

    pub fn project_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, DataLoadError> {
        let mut point = if self.source_is_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point).map_err(|e| {
            DataLoadError::Projection(format!("transform failed at ({}, {}): {e}", coord.x, coord.y))
        })?;

        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    pub fn project(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, DataLoadError> {
        geometry.try_map_coords(|coord| self.project_coord(coord))
    }
}

fn is_geographic(proj: &str) -> bool {
    proj.split_whitespace()
        .any(|token| matches!(token, "+proj=longlat" | "+proj=latlong" | "+proj=lonlat" | "+proj=latlon"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_detection() {
        assert!(is_geographic("+proj=longlat +datum=WGS84 +no_defs"));
        assert!(!is_geographic("+proj=utm +zone=48 +datum=WGS84 +units=m +no_defs"));
    }

    #[test]
    fn test_wgs84_identity() {
        let reprojector = Reprojector::new(WGS84_PROJ4).unwrap();
        let out = reprojector.project_coord(Coord { x: 104.8, y: 19.23 }).unwrap();
        assert!((out.x - 104.8).abs() < 1e-9);
        assert!((out.y - 19.23).abs() < 1e-9);
    }

    #[test]
    fn test_utm_zone_48_to_wgs84() {
        // Central meridian of UTM zone 48N is 105E; easting 500000 lies on it.
        let reprojector =
            Reprojector::new("+proj=utm +zone=48 +datum=WGS84 +units=m +no_defs").unwrap();
        let out = reprojector
            .project_coord(Coord { x: 500_000.0, y: 2_100_000.0 })
            .unwrap();
        assert!((out.x - 105.0).abs() < 1e-6);
        assert!(out.y > 18.9 && out.y < 19.1);
    }

    #[test]
    fn test_invalid_proj_string() {
        assert!(matches!(
            Reprojector::new("+proj=nonsense"),
            Err(DataLoadError::Projection(_))
        ));
    }
}
