//! Dataset readers for shapefile and GeoJSON boundary files.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::GeoJson;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape};
use tracing::{debug, info};

use crate::config::{DEFAULT_PARENT_FIELD, DEFAULT_UNIT_FIELD};
use crate::error::DataLoadError;
use crate::models::AdministrativeUnit;

/// Where and how to read the boundary dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundarySource {
    pub path: PathBuf,
    pub unit_field: String,
    pub parent_field: String,
    /// PROJ.4 definition of the dataset CRS; `None` means WGS84 lon/lat
    pub source_proj: Option<String>,
}

impl BoundarySource {
    /// Source with the default field names and no reprojection
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            unit_field: DEFAULT_UNIT_FIELD.to_string(),
            parent_field: DEFAULT_PARENT_FIELD.to_string(),
            source_proj: None,
        }
    }

    pub fn with_fields(mut self, unit_field: &str, parent_field: &str) -> Self {
        self.unit_field = unit_field.to_string();
        self.parent_field = parent_field.to_string();
        self
    }

    pub fn with_source_proj(mut self, proj: impl Into<String>) -> Self {
        self.source_proj = Some(proj.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFormat {
    Shapefile,
    GeoJson,
}

impl BoundaryFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "shp" => Some(BoundaryFormat::Shapefile),
            "json" | "geojson" => Some(BoundaryFormat::GeoJson),
            _ => None,
        }
    }
}

/// Read all units from the dataset in file order, in the dataset's own CRS
pub fn read_units(source: &BoundarySource) -> Result<Vec<AdministrativeUnit>, DataLoadError> {
    let path = &source.path;
    if !path.exists() {
        return Err(DataLoadError::NotFound(path.clone()));
    }

    let format = BoundaryFormat::from_path(path)
        .ok_or_else(|| DataLoadError::UnsupportedFormat(path.clone()))?;

    info!("Reading boundary dataset {:?} ({:?})", path, format);

    let units = match format {
        BoundaryFormat::Shapefile => read_shapefile(source)?,
        BoundaryFormat::GeoJson => read_geojson(source)?,
    };

    info!("Read {} units from {:?}", units.len(), path);
    Ok(units)
}

fn read_shapefile(source: &BoundarySource) -> Result<Vec<AdministrativeUnit>, DataLoadError> {
    let path = &source.path;
    let malformed = |e: shapefile::Error| DataLoadError::Malformed {
        path: path.clone(),
        message: e.to_string(),
    };

    let mut reader = shapefile::Reader::from_path(path).map_err(malformed)?;
    let mut units = Vec::new();

    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(malformed)?;

        let unit_name = record_text(&record, &source.unit_field).ok_or_else(|| {
            DataLoadError::MissingField {
                path: path.clone(),
                index,
                field: source.unit_field.clone(),
            }
        })?;
        let parent_name = record_text(&record, &source.parent_field).ok_or_else(|| {
            DataLoadError::MissingField {
                path: path.clone(),
                index,
                field: source.parent_field.clone(),
            }
        })?;

        let invalid = |message: String| DataLoadError::InvalidGeometry {
            path: path.clone(),
            index,
            message,
        };

        let geometry = match shape {
            Shape::Polygon(p) => rings_to_multipolygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
            Shape::PolygonM(p) => rings_to_multipolygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
            Shape::PolygonZ(p) => rings_to_multipolygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
            Shape::NullShape => return Err(invalid("null shape".to_string())),
            other => return Err(invalid(format!("expected polygon, found {:?}", other.shapetype()))),
        };

        if geometry.0.is_empty() {
            return Err(invalid("polygon has no outer ring".to_string()));
        }

        units.push(AdministrativeUnit::new(unit_name, parent_name, geometry));
    }

    Ok(units)
}

/// Text value of a dbase field, trimmed. Numeric codes are accepted as text.
fn record_text(record: &Record, field: &str) -> Option<String> {
    let text = match record.get(field)? {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) => format_number(*n),
        FieldValue::Integer(i) => i.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Group shapefile rings into polygons: each outer ring takes the inner
/// rings that follow it.
fn rings_to_multipolygon<P, F>(rings: &[PolygonRing<P>], to_coord: F) -> MultiPolygon<f64>
where
    F: Fn(&P) -> Coord<f64>,
{
    fn close(mut coords: Vec<Coord<f64>>) -> LineString<f64> {
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
        LineString::new(coords)
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                if let Some(ext) = exterior.take() {
                    polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(close(points.iter().map(&to_coord).collect()));
            }
            PolygonRing::Inner(points) => {
                // Holes before any outer ring have nothing to attach to
                if exterior.is_some() {
                    holes.push(close(points.iter().map(&to_coord).collect()));
                }
            }
        }
    }

    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon::new(polygons)
}

fn read_geojson(source: &BoundarySource) -> Result<Vec<AdministrativeUnit>, DataLoadError> {
    let path = &source.path;
    let malformed = |message: String| DataLoadError::Malformed {
        path: path.clone(),
        message,
    };

    let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(|e| malformed(e.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(malformed("GeoJSON must be a FeatureCollection".to_string())),
    };

    let mut units = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let property = |field: &str| -> Result<String, DataLoadError> {
            let value = feature.properties.as_ref().and_then(|props| props.get(field));
            let text = match value {
                Some(serde_json::Value::String(s)) => s.trim().to_string(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            if text.is_empty() {
                return Err(DataLoadError::MissingField {
                    path: path.clone(),
                    index,
                    field: field.to_string(),
                });
            }
            Ok(text)
        };

        let unit_name = property(&source.unit_field)?;
        let parent_name = property(&source.parent_field)?;

        let invalid = |message: String| DataLoadError::InvalidGeometry {
            path: path.clone(),
            index,
            message,
        };

        let geometry = match feature.geometry {
            Some(geometry) => {
                let geometry: geo::Geometry<f64> = geometry
                    .value
                    .try_into()
                    .map_err(|e: geojson::Error| invalid(e.to_string()))?;
                match geometry {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => return Err(invalid("expected Polygon or MultiPolygon".to_string())),
                }
            }
            None => return Err(invalid("feature has no geometry".to_string())),
        };

        debug!("Unit {} / {}", parent_name, unit_name);
        units.push(AdministrativeUnit::new(unit_name, parent_name, geometry));
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::Point;
    use std::io::Write;

    fn write_geojson(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            BoundaryFormat::from_path(Path::new("Xa_NA_chuan.SHP")),
            Some(BoundaryFormat::Shapefile)
        );
        assert_eq!(
            BoundaryFormat::from_path(Path::new("xa.geojson")),
            Some(BoundaryFormat::GeoJson)
        );
        assert_eq!(BoundaryFormat::from_path(Path::new("xa.kml")), None);
        assert_eq!(BoundaryFormat::from_path(Path::new("xa")), None);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let source = BoundarySource::new("/nonexistent/Xa_NA_chuan.shp");
        assert!(matches!(read_units(&source), Err(DataLoadError::NotFound(_))));
    }

    #[test]
    fn test_read_geojson_features_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson(
            &dir,
            "xa.geojson",
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"Xa":" Nghi Phong ","Diem":"Nghi Loc"},
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type":"Feature","properties":{"Xa":"Hung Loc","Diem":"Vinh"},
                 "geometry":{"type":"MultiPolygon","coordinates":[[[[2,0],[3,0],[3,1],[2,0]]]]}}
            ]}"#,
        );

        let units = read_units(&BoundarySource::new(path)).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_name, "Nghi Phong");
        assert_eq!(units[0].parent_name, "Nghi Loc");
        assert_eq!(units[1].unit_name, "Hung Loc");
        assert_eq!(units[1].geometry.0.len(), 1);
    }

    #[test]
    fn test_geojson_missing_parent_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson(
            &dir,
            "xa.json",
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"Xa":"Nghi Phong","Diem":null},
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}
            ]}"#,
        );

        match read_units(&BoundarySource::new(path)) {
            Err(DataLoadError::MissingField { index, field, .. }) => {
                assert_eq!(index, 0);
                assert_eq!(field, "Diem");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_geojson_custom_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson(
            &dir,
            "xa.json",
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"ward":"W1","district":7},
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}
            ]}"#,
        );

        let source = BoundarySource::new(path).with_fields("ward", "district");
        let units = read_units(&source).unwrap();
        assert_eq!(units[0].unit_name, "W1");
        assert_eq!(units[0].parent_name, "7");
    }

    #[test]
    fn test_geojson_rejects_point_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson(
            &dir,
            "xa.json",
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"Xa":"A","Diem":"D"},
                 "geometry":{"type":"Point","coordinates":[0,0]}}
            ]}"#,
        );

        assert!(matches!(
            read_units(&BoundarySource::new(path)),
            Err(DataLoadError::InvalidGeometry { index: 0, .. })
        ));
    }

    #[test]
    fn test_geojson_must_be_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson(
            &dir,
            "xa.json",
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#,
        );

        assert!(matches!(
            read_units(&BoundarySource::new(path)),
            Err(DataLoadError::Malformed { .. })
        ));
    }

    fn write_shapefile(dir: &tempfile::TempDir, name: &str, rows: &[(&str, f64, f64)]) -> PathBuf {
        use shapefile::dbase::{FieldName, TableWriterBuilder};

        let path = dir.path().join(name);
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("Xa").unwrap(), 50)
            .add_numeric_field(FieldName::try_from("Diem").unwrap(), 10, 0);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();

        for &(unit, parent, x) in rows {
            let ring = vec![
                Point::new(x, 0.0),
                Point::new(x, 1.0),
                Point::new(x + 1.0, 1.0),
                Point::new(x + 1.0, 0.0),
                Point::new(x, 0.0),
            ];
            let shape = shapefile::Polygon::new(PolygonRing::Outer(ring));

            let mut record = Record::default();
            record.insert("Xa".to_string(), FieldValue::Character(Some(unit.to_string())));
            record.insert("Diem".to_string(), FieldValue::Numeric(Some(parent)));
            writer.write_shape_and_record(&shape, &record).unwrap();
        }

        path
    }

    #[test]
    fn test_read_shapefile_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_shapefile(
            &dir,
            "xa.shp",
            &[
                ("  Nghi Phong  ", 7.0, 104.0),
                ("Hung Loc", 3.0, 105.0),
                ("Nghi Thai", 7.0, 106.0),
            ],
        );

        assert_eq!(BoundaryFormat::from_path(&path), Some(BoundaryFormat::Shapefile));

        let units = read_units(&BoundarySource::new(&path)).unwrap();
        let names: Vec<(&str, &str)> = units
            .iter()
            .map(|u| (u.unit_name.as_str(), u.parent_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Nghi Phong", "7"), ("Hung Loc", "3"), ("Nghi Thai", "7")]
        );

        let bbox = units[1].bbox().unwrap();
        assert_eq!(bbox.0, [105.0, 0.0, 106.0, 1.0]);
        assert_eq!(units[0].geometry.0.len(), 1);
    }

    #[test]
    fn test_shapefile_blank_name_is_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_shapefile(
            &dir,
            "blank.shp",
            &[("Nghi Phong", 7.0, 0.0), ("   ", 7.0, 1.0)],
        );

        match read_units(&BoundarySource::new(path)) {
            Err(DataLoadError::MissingField { index, field, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "Xa");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rings_grouped_with_holes() {
        let square = |min: f64, max: f64| {
            vec![
                Point::new(min, min),
                Point::new(min, max),
                Point::new(max, max),
                Point::new(max, min),
            ]
        };

        let rings = vec![
            PolygonRing::Outer(square(0.0, 10.0)),
            PolygonRing::Inner(square(4.0, 6.0)),
            PolygonRing::Outer(square(20.0, 30.0)),
        ];

        let mp = rings_to_multipolygon(&rings, |pt| Coord { x: pt.x, y: pt.y });
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
        // Rings are closed
        assert_eq!(mp.0[0].exterior().0.first(), mp.0[0].exterior().0.last());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(7.5), "7.5");
    }
}
