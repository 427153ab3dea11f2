//! The loaded, immutable boundary table.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoJsonValue};
use hashbrown::{HashMap, HashSet};
use tracing::{info, warn};

use super::project::Reprojector;
use super::source::{read_units, BoundarySource};
use crate::error::DataLoadError;
use crate::models::{AdministrativeUnit, GeoBbox};

static SHARED: Mutex<Option<Arc<BoundaryLayer>>> = Mutex::new(None);

/// Administrative units in WGS84, in dataset order
#[derive(Debug)]
pub struct BoundaryLayer {
    units: Vec<AdministrativeUnit>,
    /// Distinct parent names in first-appearance order
    parents: Vec<String>,
    parent_rank: HashMap<String, usize>,
    bbox: Option<GeoBbox>,
    origin: Option<PathBuf>,
}

impl BoundaryLayer {
    /// Read, validate and reproject the dataset
    pub fn load(source: &BoundarySource) -> Result<Self, DataLoadError> {
        let mut units = read_units(source)?;

        if let Some(proj) = &source.source_proj {
            info!("Reprojecting {} units from '{}' to WGS84", units.len(), proj);
            let reprojector = Reprojector::new(proj)?;
            for unit in &mut units {
                unit.geometry = reprojector.project(&unit.geometry)?;
            }
        }

        let mut layer = Self::from_units(units);
        layer.origin = Some(source.path.clone());

        info!(
            "Boundary layer ready: {} units in {} parents",
            layer.len(),
            layer.parents.len()
        );

        Ok(layer)
    }

    /// Process-wide layer, loaded on first successful call.
    ///
    /// Later calls return the cached handle regardless of `source`. A failed
    /// load is not cached.
    pub fn shared(source: &BoundarySource) -> Result<Arc<Self>, DataLoadError> {
        let mut slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(layer) = slot.as_ref() {
            return Ok(Arc::clone(layer));
        }

        let layer = Arc::new(Self::load(source)?);
        *slot = Some(Arc::clone(&layer));
        Ok(layer)
    }

    /// Build a layer from units already in WGS84
    pub fn from_units(units: Vec<AdministrativeUnit>) -> Self {
        let mut parents = Vec::new();
        let mut parent_rank = HashMap::new();
        let mut bbox: Option<GeoBbox> = None;

        for unit in &units {
            if !parent_rank.contains_key(&unit.parent_name) {
                parent_rank.insert(unit.parent_name.clone(), parents.len());
                parents.push(unit.parent_name.clone());
            }

            if let Some(unit_bbox) = unit.bbox() {
                bbox = Some(match bbox {
                    Some(b) => b.union(&unit_bbox),
                    None => unit_bbox,
                });
            }
        }

        let duplicates = count_duplicate_names(&units);
        if duplicates > 0 {
            warn!(
                "{} units share a name with another unit of the same parent",
                duplicates
            );
        }

        Self {
            units,
            parents,
            parent_rank,
            bbox,
            origin: None,
        }
    }

    /// All units in load order
    pub fn all_units(&self) -> &[AdministrativeUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Distinct parent names in first-appearance order
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Position of a parent in first-appearance order
    pub fn parent_rank(&self, parent: &str) -> Option<usize> {
        self.parent_rank.get(parent).copied()
    }

    /// Extent of the whole dataset
    pub fn bbox(&self) -> Option<GeoBbox> {
        self.bbox
    }

    /// File the layer was read from, if any
    pub fn origin(&self) -> Option<&PathBuf> {
        self.origin.as_ref()
    }

    /// The layer as a FeatureCollection with `unit` and `parent` properties,
    /// for drawing the boundary overlay
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .units
            .iter()
            .map(|unit| {
                let mut properties = JsonObject::new();
                properties.insert("unit".to_string(), unit.unit_name.clone().into());
                properties.insert("parent".to_string(), unit.parent_name.clone().into());
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(GeoJsonValue::from(&unit.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Units whose (parent, name) pair already appeared earlier in the list
fn count_duplicate_names(units: &[AdministrativeUnit]) -> usize {
    let mut seen = HashSet::new();
    units
        .iter()
        .filter(|u| !seen.insert((u.parent_name.as_str(), u.unit_name.as_str())))
        .count()
}
