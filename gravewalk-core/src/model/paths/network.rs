use geo::{Coord, LineString, Point};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use petgraph::{
    graph::{EdgeReference, NodeIndex, UnGraph},
    visit::EdgeRef,
};
use rstar::{RTree, primitives::GeomWithData};

use super::{PathEdge, PathNode};
use crate::{
    Meters,
    geometry::{LocalProjection, haversine_distance},
};

/// Projected node position with its graph index, stored in the spatial index
pub type IndexedPoint = GeomWithData<[f64; 2], NodeIndex>;

/// Routable network of path segments
///
/// Undirected: every path can be walked both ways. Built once per set of path
/// features and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PathGraph {
    pub(crate) graph: UnGraph<PathNode, PathEdge>,
    rtree: RTree<IndexedPoint>,
    projection: LocalProjection,
    dropped_edges: usize,
}

impl PathGraph {
    pub(crate) fn new(projection: LocalProjection) -> Self {
        Self {
            graph: UnGraph::default(),
            rtree: RTree::new(),
            projection,
            dropped_edges: 0,
        }
    }

    pub(crate) fn add_node(&mut self, coord: Coord<f64>) -> NodeIndex {
        let idx = self.graph.add_node(PathNode {
            geometry: Point::from(coord),
        });
        let projected = self.projection.project(coord);
        self.rtree
            .insert(GeomWithData::new([projected.x, projected.y], idx));
        idx
    }

    pub(crate) fn add_edge(&mut self, a: NodeIndex, b: NodeIndex, edge: PathEdge) {
        self.graph.add_edge(a, b, edge);
    }

    pub(crate) fn record_dropped_edge(&mut self) {
        self.dropped_edges += 1;
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Segments discarded while building because both ends snapped together
    pub fn dropped_edge_count(&self) -> usize {
        self.dropped_edges
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&PathNode> {
        self.graph.node_weight(idx)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &PathNode)> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx).map(|node| (idx, node)))
    }

    /// All edges as `(node_a, node_b, edge)`
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &PathEdge)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight()))
    }

    /// Edges touching `node`; `target()` is always the neighbor
    pub(crate) fn edges_from(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = EdgeReference<'_, PathEdge>> {
        self.graph.edges(node)
    }

    /// Nearest node to `coord` and its great-circle distance
    pub fn nearest_node(&self, coord: Coord<f64>) -> Option<(NodeIndex, Meters)> {
        let projected = self.projection.project(coord);
        let nearest = self.rtree.nearest_neighbor(&[projected.x, projected.y])?;
        let node = self.node(nearest.data)?;
        Some((nearest.data, haversine_distance(coord, node.coord())))
    }

    /// Renders nodes and edges for debugging
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.node_count() + self.edge_count());

        for edge in self.graph.edge_references() {
            let (Some(a), Some(b)) = (self.node(edge.source()), self.node(edge.target())) else {
                continue;
            };
            let line = LineString::new(vec![a.coord(), b.coord()]);
            let mut feature = Feature::from(Geometry::new(GeoJsonValue::from(&line)));
            feature.set_property("edge_id", edge.id().index());
            feature.set_property("node1", edge.source().index());
            feature.set_property("node2", edge.target().index());
            feature.set_property("length_meters", edge.weight().distance);
            feature.set_property("path_feature", edge.weight().feature.0);
            features.push(feature);
        }

        for (idx, node) in self.nodes() {
            let mut feature = Feature::from(Geometry::new(GeoJsonValue::from(&node.geometry)));
            feature.set_property("node_id", idx.index());
            feature.set_property("degree", self.graph.edges(idx).count());
            features.push(feature);
        }

        FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        }
    }
}
