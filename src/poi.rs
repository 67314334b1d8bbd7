use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_FOCUS_ZOOM: u8 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointOfInterest {
    pub id: String,
    pub label: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_focus_zoom")]
    pub zoom: u8,
}

fn default_focus_zoom() -> u8 {
    DEFAULT_FOCUS_ZOOM
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    points: Vec<PointOfInterest>,
}

#[derive(Debug, thiserror::Error)]
pub enum PoiCatalogError {
    #[error("failed to read point-of-interest file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse point-of-interest file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("duplicate point-of-interest id `{id}`")]
    DuplicateId { id: String },

    #[error("point of interest `{id}` has invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { id: String, lat: f64, lng: f64 },

    #[error("point-of-interest catalog is empty")]
    Empty,
}

/// Named places the focus hook may center the map on.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiCatalog {
    points: Vec<PointOfInterest>,
}

impl Default for PoiCatalog {
    fn default() -> Self {
        Self {
            points: builtin_points(),
        }
    }
}

impl PoiCatalog {
    pub fn new(points: Vec<PointOfInterest>) -> Result<Self, PoiCatalogError> {
        if points.is_empty() {
            return Err(PoiCatalogError::Empty);
        }

        let mut seen = BTreeSet::new();
        for point in &points {
            if !seen.insert(point.id.as_str()) {
                return Err(PoiCatalogError::DuplicateId {
                    id: point.id.clone(),
                });
            }
            if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
                return Err(PoiCatalogError::InvalidCoordinates {
                    id: point.id.clone(),
                    lat: point.lat,
                    lng: point.lng,
                });
            }
        }

        Ok(Self { points })
    }

    pub fn from_yaml_str(raw: &str, path: &Path) -> Result<Self, PoiCatalogError> {
        let file = serde_yaml::from_str::<CatalogFile>(raw).map_err(|source| {
            PoiCatalogError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::new(file.points)
    }

    pub fn load(path: &Path) -> Result<Self, PoiCatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| PoiCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw, path)
    }

    /// Loads `path` when given, otherwise the built-in catalog.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, PoiCatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&PointOfInterest> {
        self.points.iter().find(|point| point.id == id)
    }

    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }
}

fn builtin_points() -> Vec<PointOfInterest> {
    [
        ("mahakaleshwar", "Mahakaleshwar Temple", 23.1828, 75.7682),
        ("ram-ghat", "Ram Ghat", 23.1794, 75.7612),
        ("harsiddhi", "Harsiddhi Temple", 23.1808, 75.7649),
        ("kal-bhairav", "Kal Bhairav Temple", 23.2011, 75.7661),
        ("mangalnath", "Mangalnath Temple", 23.2138, 75.7719),
        ("sandipani-ashram", "Sandipani Ashram", 23.1969, 75.7743),
        ("ujjain-junction", "Ujjain Junction", 23.1793, 75.7849),
    ]
    .into_iter()
    .map(|(id, label, lat, lng)| PointOfInterest {
        id: id.to_owned(),
        label: label.to_owned(),
        lat,
        lng,
        zoom: DEFAULT_FOCUS_ZOOM,
    })
    .collect()
}
