//! Path network components - nodes and edges

use geo::{Coord, Point};

use crate::{Meters, model::FeatureId};

/// Path graph node, a snapped path vertex
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    /// Coordinates of the first raw vertex snapped here
    pub geometry: Point<f64>,
}

impl PathNode {
    pub fn coord(&self) -> Coord<f64> {
        self.geometry.0
    }
}

/// Path graph edge, one segment of a path feature
#[derive(Debug, Clone, PartialEq)]
pub struct PathEdge {
    /// Great-circle length of the segment, always positive
    pub distance: Meters,
    /// The path feature this segment was cut from
    pub feature: FeatureId,
}
