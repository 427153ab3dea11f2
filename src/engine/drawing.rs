//! Decoding of the drawing tool's GeoJSON payload into drawn regions.

use geo::MultiPolygon;
use geojson::{GeoJson, Geometry, Value};
use tracing::debug;

use crate::error::GeometryError;
use crate::models::DrawnRegion;

/// Parse a drawing payload from JSON text.
///
/// Accepts a FeatureCollection, an array of Features, a single Feature or a
/// bare Geometry. Features with a null geometry are skipped.
pub fn parse_drawings(json: &str) -> Result<Vec<DrawnRegion>, GeometryError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| GeometryError::Malformed(e.to_string()))?;
    drawings_from_value(value)
}

/// Same as [`parse_drawings`] for an already-parsed JSON value
pub fn drawings_from_value(value: serde_json::Value) -> Result<Vec<DrawnRegion>, GeometryError> {
    let documents = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => vec![other],
    };

    let mut geometries: Vec<Option<Geometry>> = Vec::new();
    for document in documents {
        let geojson =
            GeoJson::from_json_value(document).map_err(|e| GeometryError::Malformed(e.to_string()))?;
        match geojson {
            GeoJson::FeatureCollection(fc) => {
                geometries.extend(fc.features.into_iter().map(|f| f.geometry));
            }
            GeoJson::Feature(f) => geometries.push(f.geometry),
            GeoJson::Geometry(g) => geometries.push(Some(g)),
        }
    }

    let mut regions = Vec::with_capacity(geometries.len());
    for (index, geometry) in geometries.into_iter().enumerate() {
        let Some(geometry) = geometry else {
            debug!("Skipping drawing {} without geometry", index);
            continue;
        };
        regions.push(to_region(index, geometry)?);
    }

    Ok(regions)
}

fn to_region(index: usize, geometry: Geometry) -> Result<DrawnRegion, GeometryError> {
    let has_coordinates = match &geometry.value {
        Value::Polygon(rings) => rings.first().is_some_and(|ring| !ring.is_empty()),
        Value::MultiPolygon(polygons) => {
            !polygons.is_empty()
                && polygons
                    .iter()
                    .all(|rings| rings.first().is_some_and(|ring| !ring.is_empty()))
        }
        other => {
            return Err(GeometryError::UnsupportedType {
                index,
                kind: kind_name(other).to_string(),
            })
        }
    };

    if !has_coordinates {
        return Err(GeometryError::MissingCoordinates { index });
    }

    let converted: geo::Geometry<f64> = geometry
        .value
        .try_into()
        .map_err(|e: geojson::Error| GeometryError::Malformed(format!("drawing {index}: {e}")))?;

    let multi = match converted {
        geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        geo::Geometry::MultiPolygon(mp) => mp,
        _ => {
            return Err(GeometryError::Malformed(format!(
                "drawing {index}: unexpected geometry after conversion"
            )))
        }
    };

    Ok(DrawnRegion::new(multi))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
