//! Geodesic helpers shared by the graph builder, the planner and the tracker.
//!
//! Coordinates are `(longitude, latitude)` in degrees. Distances are meters.

use geo::{Bearing, Closest, ClosestPoint, Coord, Distance, Haversine, Line, Point};
use itertools::Itertools;

use crate::Meters;

/// Mean earth radius used by [`Haversine`]
const EARTH_RADIUS: Meters = 6_371_008.8;

/// Great-circle distance between two coordinates
pub fn haversine_distance(a: Coord<f64>, b: Coord<f64>) -> Meters {
    Haversine.distance(Point::from(a), Point::from(b))
}

/// Initial heading from `from` to `to`, degrees clockwise from north in `[0, 360)`
pub fn bearing(from: Coord<f64>, to: Coord<f64>) -> f64 {
    Haversine
        .bearing(Point::from(from), Point::from(to))
        .rem_euclid(360.0)
}

/// Signed heading change in degrees within `(-180, 180]`; positive turns right
pub fn turn_angle(incoming: f64, outgoing: f64) -> f64 {
    let delta = (outgoing - incoming).rem_euclid(360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Equirectangular projection to meters around a reference latitude.
///
/// Accurate enough over the extent of a cemetery; used wherever planar
/// nearest-point math is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    cos_lat: f64,
}

impl LocalProjection {
    pub fn new(reference_lat: f64) -> Self {
        Self {
            cos_lat: reference_lat.to_radians().cos(),
        }
    }

    pub fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: coord.x.to_radians() * self.cos_lat * EARTH_RADIUS,
            y: coord.y.to_radians() * EARTH_RADIUS,
        }
    }
}

/// Shortest distance from `point` to the segment `a`-`b`
pub fn distance_to_segment(point: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> Meters {
    if a == b {
        return haversine_distance(point, a);
    }

    let projection = LocalProjection::new(point.y);
    let p = Point::from(projection.project(point));
    let segment = Line::new(projection.project(a), projection.project(b));

    match segment.closest_point(&p) {
        Closest::Intersection(closest) | Closest::SinglePoint(closest) => {
            (closest.x() - p.x()).hypot(closest.y() - p.y())
        }
        Closest::Indeterminate => haversine_distance(point, a),
    }
}

/// Shortest distance from `point` to any segment of `line`; `None` for an empty line
pub fn distance_to_polyline(point: Coord<f64>, line: &[Coord<f64>]) -> Option<Meters> {
    match line {
        [] => None,
        [only] => Some(haversine_distance(point, *only)),
        _ => line
            .iter()
            .tuple_windows()
            .map(|(a, b)| distance_to_segment(point, *a, *b))
            .min_by(f64::total_cmp),
    }
}

/// Sum of great-circle distances between consecutive coordinates
pub fn polyline_length(line: &[Coord<f64>]) -> Meters {
    line.iter()
        .tuple_windows()
        .map(|(a, b)| haversine_distance(*a, *b))
        .sum()
}

/// Eight-point compass name for a heading
pub fn compass_direction(heading: f64) -> &'static str {
    const NAMES: [&str; 8] = [
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
    ];
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = ((heading.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    NAMES[sector]
}

/// Serializes coordinates as `[lon, lat]` arrays, the way GeoJSON writes positions
pub mod lonlat {
    use geo::Coord;
    use serde::{Serialize, Serializer};

    pub fn serialize<S: Serializer>(coord: &Coord<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        [coord.x, coord.y].serialize(serializer)
    }

    pub mod vec {
        use geo::Coord;
        use serde::Serializer;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(
            coords: &[Coord<f64>],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(coords.len()))?;
            for coord in coords {
                seq.serialize_element(&[coord.x, coord.y])?;
            }
            seq.end()
        }
    }
}
