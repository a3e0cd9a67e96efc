use geo::{Coord, LineString, Point};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use serde::Serialize;

use crate::{Meters, geometry::lonlat, model::FeatureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    Depart,
    BearLeft,
    BearRight,
    TurnLeft,
    TurnRight,
    UTurn,
    Arrive,
}

/// One instruction of a route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStep {
    pub instruction: String,
    /// Where the instruction applies
    #[serde(with = "lonlat")]
    pub coordinate: Coord<f64>,
    pub maneuver: Maneuver,
    /// Walking distance from the start of the route to `coordinate`
    pub distance_from_start: Meters,
}

/// A planned walk to one destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub destination_feature_id: FeatureId,
    pub destination_name: String,
    /// From the visitor's true position to the destination's coordinate
    #[serde(with = "lonlat::vec")]
    pub coordinates: Vec<Coord<f64>>,
    pub steps: Vec<RouteStep>,
    pub total_distance: Meters,
}

impl Route {
    /// The coordinate the visitor is guided to
    pub fn destination(&self) -> Option<Coord<f64>> {
        self.coordinates.last().copied()
    }

    /// The route line plus one point per step
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.steps.len() + 1);

        let line = LineString::new(self.coordinates.clone());
        let mut route = Feature::from(Geometry::new(GeoJsonValue::from(&line)));
        route.set_property("kind", "route");
        route.set_property("destination_id", self.destination_feature_id.0);
        route.set_property("destination_name", self.destination_name.clone());
        route.set_property("total_distance", self.total_distance);
        features.push(route);

        for (idx, step) in self.steps.iter().enumerate() {
            let point = Point::from(step.coordinate);
            let mut feature = Feature::from(Geometry::new(GeoJsonValue::from(&point)));
            feature.set_property("kind", "step");
            feature.set_property("step_index", idx);
            feature.set_property("instruction", step.instruction.clone());
            if let Ok(maneuver) = serde_json::to_value(step.maneuver) {
                feature.set_property("maneuver", maneuver);
            }
            feature.set_property("distance_from_start", step.distance_from_start);
            features.push(feature);
        }

        FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        }
    }
}
