//! Stored map features: graves and landmarks (points), paths (lines) and
//! plots or sections (areas).

use std::fmt;

use chrono::{DateTime, Utc};
use geo::{Centroid, Coord, LineString, Point, Polygon};
use geojson::{Feature, Geometry, Value as GeoJsonValue};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Point,
    Line,
    Area,
}

/// Feature geometry; the variant fixes the coordinate shape
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    Line(LineString<f64>),
    /// Closed exterior ring, first coordinate equal to the last
    Area(LineString<f64>),
}

impl FeatureGeometry {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureGeometry::Point(_) => FeatureKind::Point,
            FeatureGeometry::Line(_) => FeatureKind::Line,
            FeatureGeometry::Area(_) => FeatureKind::Area,
        }
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        match self {
            FeatureGeometry::Point(point) => std::slice::from_ref(&point.0),
            FeatureGeometry::Line(line) | FeatureGeometry::Area(line) => &line.0,
        }
    }

    /// Checks that the coordinates are usable positions and match the kind
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first problem found
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(bad) = self.coords().iter().find(|c| !is_lon_lat(**c)) {
            return Err(Error::Validation(format!(
                "coordinate ({}, {}) is not a valid longitude/latitude pair",
                bad.x, bad.y
            )));
        }

        match self {
            FeatureGeometry::Point(_) => Ok(()),
            FeatureGeometry::Line(line) if line.0.len() < 2 => Err(Error::Validation(format!(
                "a line needs at least 2 coordinates, got {}",
                line.0.len()
            ))),
            FeatureGeometry::Line(_) => Ok(()),
            FeatureGeometry::Area(ring) if ring.0.len() < 4 => Err(Error::Validation(format!(
                "an area ring needs at least 4 coordinates, got {}",
                ring.0.len()
            ))),
            FeatureGeometry::Area(ring) if !ring.is_closed() => Err(Error::Validation(
                "an area ring must start and end at the same coordinate".to_string(),
            )),
            FeatureGeometry::Area(_) => Ok(()),
        }
    }

    /// The coordinate a visitor is guided to: the point itself, otherwise the centroid
    pub fn representative_coord(&self) -> Option<Coord<f64>> {
        match self {
            FeatureGeometry::Point(point) => Some(point.0),
            FeatureGeometry::Line(line) => line.centroid().map(|c| c.0),
            FeatureGeometry::Area(ring) => Polygon::new(ring.clone(), vec![])
                .centroid()
                .map(|c| c.0),
        }
    }

    fn to_geojson(&self) -> Geometry {
        let value = match self {
            FeatureGeometry::Point(point) => GeoJsonValue::from(point),
            FeatureGeometry::Line(line) => GeoJsonValue::from(line),
            FeatureGeometry::Area(ring) => GeoJsonValue::from(&Polygon::new(ring.clone(), vec![])),
        };
        Geometry::new(value)
    }

    fn from_geojson(geometry: &Geometry) -> Result<Self, Error> {
        let geometry = geo::Geometry::<f64>::try_from(geometry.clone())
            .map_err(|e| Error::GeoJson(e.to_string()))?;
        match geometry {
            geo::Geometry::Point(point) => Ok(FeatureGeometry::Point(point)),
            geo::Geometry::LineString(line) => Ok(FeatureGeometry::Line(line)),
            geo::Geometry::Polygon(polygon) => {
                let (exterior, _) = polygon.into_inner();
                Ok(FeatureGeometry::Area(exterior))
            }
            _ => Err(Error::Validation(
                "only Point, LineString and Polygon geometries are supported".to_string(),
            )),
        }
    }
}

fn is_lon_lat(coord: Coord<f64>) -> bool {
    coord.x.is_finite()
        && coord.y.is_finite()
        && (-180.0..=180.0).contains(&coord.x)
        && (-90.0..=90.0).contains(&coord.y)
}

fn default_color() -> String {
    "#000000".to_string()
}

/// Descriptive properties shown to visitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl FeatureProperties {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            color: default_color(),
            category: None,
            info: None,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        Ok(())
    }
}

/// A feature that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDraft {
    pub geometry: FeatureGeometry,
    pub properties: FeatureProperties,
}

impl FeatureDraft {
    pub fn new(geometry: FeatureGeometry, properties: FeatureProperties) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    pub fn point(name: &str, coord: Coord<f64>) -> Self {
        Self::new(
            FeatureGeometry::Point(Point::from(coord)),
            FeatureProperties::new(name),
        )
    }

    pub fn line(name: &str, coords: Vec<Coord<f64>>) -> Self {
        Self::new(
            FeatureGeometry::Line(LineString::new(coords)),
            FeatureProperties::new(name),
        )
    }

    pub fn area(name: &str, ring: Vec<Coord<f64>>) -> Self {
        Self::new(
            FeatureGeometry::Area(LineString::new(ring)),
            FeatureProperties::new(name),
        )
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed geometry or a missing name
    pub fn validate(&self) -> Result<(), Error> {
        self.geometry.validate()?;
        self.properties.validate()
    }

    /// Reads a draft from a `GeoJSON` feature; its `properties` must carry a `name`
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry is missing or unsupported, or the
    /// properties do not deserialize
    pub fn from_geojson(feature: &Feature) -> Result<Self, Error> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| Error::Validation("feature has no geometry".to_string()))?;
        let properties = feature.properties.clone().unwrap_or_default();
        let properties: FeatureProperties =
            serde_json::from_value(serde_json::Value::Object(properties))
                .map_err(|e| Error::Validation(e.to_string()))?;

        Ok(Self {
            geometry: FeatureGeometry::from_geojson(geometry)?,
            properties,
        })
    }
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeaturePatch {
    pub geometry: Option<FeatureGeometry>,
    pub properties: Option<FeatureProperties>,
}

/// A stored feature
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub id: FeatureId,
    pub geometry: FeatureGeometry,
    pub properties: FeatureProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeoFeature {
    pub fn kind(&self) -> FeatureKind {
        self.geometry.kind()
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn representative_coord(&self) -> Option<Coord<f64>> {
        self.geometry.representative_coord()
    }

    pub fn to_geojson(&self) -> Feature {
        let mut feature = Feature::from(self.geometry.to_geojson());
        feature.set_property("id", self.id.0);
        if let Ok(serde_json::Value::Object(properties)) = serde_json::to_value(&self.properties) {
            for (key, value) in properties {
                feature.set_property(key, value);
            }
        }
        feature.set_property("createdAt", self.created_at.to_rfc3339());
        feature.set_property("updatedAt", self.updated_at.to_rfc3339());
        feature
    }
}
