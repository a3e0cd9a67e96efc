use geo::{Coord, LineString};
use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::graph::NodeIndex;

use crate::{
    Error, GuidanceConfig, Meters,
    geometry::{LocalProjection, haversine_distance},
    model::{FeatureGeometry, FeatureId, GeoFeature, PathEdge, PathGraph},
};

/// Builds the path graph from the line features among `features`
///
/// Every consecutive vertex pair of every line becomes one undirected edge.
/// Vertices within `snap_tolerance` of an existing node are merged into it, so
/// paths drawn to meet at a junction connect even when their endpoints are a
/// little apart. Segments whose ends snap onto the same node are dropped.
/// Points and areas are ignored.
///
/// # Errors
///
/// Returns [`Error::EmptyGraph`] if there are no line features
pub fn build_path_graph<'a, I>(features: I, config: &GuidanceConfig) -> Result<PathGraph, Error>
where
    I: IntoIterator<Item = &'a GeoFeature>,
{
    let lines: Vec<(FeatureId, &LineString<f64>)> = features
        .into_iter()
        .filter_map(|feature| match &feature.geometry {
            FeatureGeometry::Line(line) => Some((feature.id, line)),
            _ => None,
        })
        .collect();

    let Some(origin) = lines.iter().find_map(|(_, line)| line.0.first()) else {
        return Err(Error::EmptyGraph);
    };

    info!("Building path graph from {} path features", lines.len());

    let mut graph = PathGraph::new(LocalProjection::new(origin.y));

    for (feature, line) in &lines {
        let mut previous: Option<NodeIndex> = None;

        for (a, b) in line.coords().tuple_windows() {
            let node_a = match previous {
                Some(node) => node,
                None => snap_or_insert(&mut graph, *a, config.snap_tolerance),
            };
            let node_b = snap_or_insert(&mut graph, *b, config.snap_tolerance);
            previous = Some(node_b);

            let distance = haversine_distance(*a, *b);
            if node_a == node_b || distance <= f64::EPSILON {
                debug!(
                    "Dropping degenerate segment of path {feature} at ({}, {})",
                    a.x, a.y
                );
                graph.record_dropped_edge();
                continue;
            }

            graph.add_edge(
                node_a,
                node_b,
                PathEdge {
                    distance,
                    feature: *feature,
                },
            );
        }
    }

    if graph.dropped_edge_count() > 0 {
        warn!(
            "{} path segments were shorter than the snap tolerance and were dropped",
            graph.dropped_edge_count()
        );
    }
    info!(
        "Path graph built: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}

fn snap_or_insert(graph: &mut PathGraph, coord: Coord<f64>, tolerance: Meters) -> NodeIndex {
    match graph.nearest_node(coord) {
        Some((node, distance)) if distance <= tolerance => node,
        _ => graph.add_node(coord),
    }
}
