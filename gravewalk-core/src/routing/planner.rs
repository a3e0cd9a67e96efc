use geo::Coord;
use log::debug;

use super::{dijkstra::dijkstra_path, route::Route, steps::derive_steps};
use crate::{
    Error, GuidanceConfig,
    geometry::polyline_length,
    model::{GeoFeature, PathGraph},
};

/// Plans a walking route from `start` to `destination` over `graph`
///
/// Both ends are snapped to their nearest path node; the route itself begins
/// at the true `start` and ends at the destination's representative
/// coordinate. Identical inputs always produce an identical route.
///
/// # Errors
///
/// - [`Error::Unreachable`] if either end is further than `max_snap_distance`
///   from the path network, or the two snapped nodes are not connected
/// - [`Error::PlanTimeout`] if the search exceeds `plan_timeout`
/// - [`Error::Validation`] if the destination has no usable coordinate
pub fn plan(
    start: Coord<f64>,
    destination: &GeoFeature,
    graph: &PathGraph,
    config: &GuidanceConfig,
) -> Result<Route, Error> {
    let name = destination.name();
    let target = destination.representative_coord().ok_or_else(|| {
        Error::Validation(format!("{name} has no coordinate to route to"))
    })?;

    let (start_node, start_gap) = graph.nearest_node(start).ok_or(Error::EmptyGraph)?;
    if start_gap > config.max_snap_distance {
        return Err(Error::Unreachable(format!(
            "current position is {start_gap:.0} m from the nearest path"
        )));
    }

    let (target_node, target_gap) = graph.nearest_node(target).ok_or(Error::EmptyGraph)?;
    if target_gap > config.max_snap_distance {
        return Err(Error::Unreachable(format!(
            "{name} is {target_gap:.0} m from the nearest path"
        )));
    }

    let path = dijkstra_path(
        graph,
        start_node,
        target_node,
        config.straight_tolerance_deg,
        config.plan_timeout,
    )?
    .ok_or_else(|| Error::Unreachable(format!("no path leads to {name}")))?;

    debug!(
        "Planned {} nodes with {} turns to {name} ({})",
        path.cost.nodes, path.cost.turns, destination.id
    );

    let mut coordinates = Vec::with_capacity(path.nodes.len() + 2);
    coordinates.push(start);
    coordinates.extend(
        path.nodes
            .iter()
            .filter_map(|idx| graph.node(*idx))
            .map(|node| node.coord()),
    );
    coordinates.push(target);
    coordinates.dedup();

    let steps = derive_steps(
        &coordinates,
        name,
        config.straight_tolerance_deg,
        config.arrival_tolerance,
    );
    let total_distance = polyline_length(&coordinates);

    Ok(Route {
        destination_feature_id: destination.id,
        destination_name: name.to_string(),
        coordinates,
        steps,
        total_distance,
    })
}
