use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    time::{Duration, Instant},
};

use hashbrown::HashMap;
use petgraph::{graph::NodeIndex, visit::EdgeRef};

use crate::{
    Error,
    geometry::{bearing, turn_angle},
    model::PathGraph,
};

/// Lexicographic path cost: length first, then turns, then vertex count
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) struct Cost {
    /// Length in millimeters, so equal lengths compare equal
    pub(crate) distance_mm: u64,
    pub(crate) turns: u32,
    pub(crate) nodes: u32,
}

/// Search state: a node together with the node it was entered from.
/// The predecessor is part of the key because turn counts depend on it.
type Key = (NodeIndex, Option<NodeIndex>);

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    cost: Cost,
    node: NodeIndex,
    from: Option<NodeIndex>,
}

// Implement Ord for State to use in BinaryHeap
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by cost (reversed from standard Rust BinaryHeap), then by
        // node index so ties pop in a fixed order
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
            .then_with(|| other.from.cmp(&self.from))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TracedPath {
    pub(crate) nodes: Vec<NodeIndex>,
    pub(crate) cost: Cost,
}

/// Dijkstra's algorithm between two nodes of the path network
///
/// Among equally long paths the one with fewer heading changes larger than
/// `straight_tolerance_deg` wins, then the one with fewer vertices.
/// Returns `Ok(None)` if `target` cannot be reached from `start`.
///
/// # Errors
///
/// Returns [`Error::PlanTimeout`] if the search runs longer than `timeout`
pub(crate) fn dijkstra_path(
    graph: &PathGraph,
    start: NodeIndex,
    target: NodeIndex,
    straight_tolerance_deg: f64,
    timeout: Duration,
) -> Result<Option<TracedPath>, Error> {
    let deadline = Instant::now() + timeout;

    let estimated_nodes = graph.node_count().min(1000);
    let mut best: HashMap<Key, Cost> = HashMap::with_capacity(estimated_nodes);
    let mut predecessors: HashMap<Key, Key> = HashMap::with_capacity(estimated_nodes);
    let mut heap = BinaryHeap::with_capacity(estimated_nodes / 4);

    let start_cost = Cost {
        nodes: 1,
        ..Cost::default()
    };
    heap.push(State {
        cost: start_cost,
        node: start,
        from: None,
    });
    best.insert((start, None), start_cost);

    while let Some(State { cost, node, from }) = heap.pop() {
        if Instant::now() >= deadline {
            return Err(Error::PlanTimeout(timeout));
        }

        // The first target state popped is the cheapest one
        if node == target {
            return Ok(Some(TracedPath {
                nodes: trace_back(&predecessors, (node, from)),
                cost,
            }));
        }

        // Skip if we've found a better path
        if let Some(&known) = best.get(&(node, from))
            && cost > known
        {
            continue;
        }

        let here = graph.node(node).map(|n| n.coord());
        let incoming = from
            .and_then(|prev| graph.node(prev))
            .zip(here)
            .map(|(prev, here)| bearing(prev.coord(), here));

        for edge in graph.edges_from(node) {
            let next = edge.target();
            // Never walk straight back along the segment we came from
            if Some(next) == from {
                continue;
            }

            let turned = match (incoming, here, graph.node(next)) {
                (Some(incoming), Some(here), Some(next_node)) => {
                    let outgoing = bearing(here, next_node.coord());
                    turn_angle(incoming, outgoing).abs() > straight_tolerance_deg
                }
                _ => false,
            };

            let next_cost = Cost {
                distance_mm: cost.distance_mm + to_millimeters(edge.weight().distance),
                turns: cost.turns + u32::from(turned),
                nodes: cost.nodes + 1,
            };
            let key = (next, Some(node));

            // Add or update the label if better using Entry API
            match best.entry(key) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost >= *entry.get() {
                        continue;
                    }
                    *entry.get_mut() = next_cost;
                }
            }
            predecessors.insert(key, (node, from));
            heap.push(State {
                cost: next_cost,
                node: next,
                from: Some(node),
            });
        }
    }

    Ok(None)
}

fn trace_back(predecessors: &HashMap<Key, Key>, end: Key) -> Vec<NodeIndex> {
    let mut nodes = vec![end.0];
    let mut current = end;
    while let Some(&prev) = predecessors.get(&current) {
        nodes.push(prev.0);
        current = prev;
    }
    nodes.reverse();
    nodes
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_millimeters(meters: f64) -> u64 {
    (meters * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use geo::{Coord, coord};

    use super::*;
    use crate::{
        geometry::{LocalProjection, haversine_distance},
        model::{FeatureId, PathEdge},
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn graph(coords: &[Coord<f64>], edges: &[(usize, usize)]) -> (PathGraph, Vec<NodeIndex>) {
        let mut graph = PathGraph::new(LocalProjection::new(0.0));
        let nodes: Vec<_> = coords.iter().map(|c| graph.add_node(*c)).collect();
        for &(a, b) in edges {
            let distance = haversine_distance(coords[a], coords[b]);
            graph.add_edge(
                nodes[a],
                nodes[b],
                PathEdge {
                    distance,
                    feature: FeatureId(1),
                },
            );
        }
        (graph, nodes)
    }

    #[test]
    fn finds_the_shorter_branch() {
        // 0 -> 1 -> 3 is direct, 0 -> 2 -> 3 detours east
        let (graph, n) = graph(
            &[
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 0.0, y: 0.001 },
                coord! { x: 0.002, y: 0.001 },
                coord! { x: 0.0, y: 0.002 },
            ],
            &[(0, 1), (1, 3), (0, 2), (2, 3)],
        );
        let path = dijkstra_path(&graph, n[0], n[3], 20.0, TIMEOUT)
            .unwrap()
            .unwrap();
        assert_eq!(path.nodes, vec![n[0], n[1], n[3]]);
        assert_eq!(path.cost.turns, 0);
        assert_eq!(path.cost.nodes, 3);
    }

    #[test]
    fn equal_cost_ties_resolve_the_same_way() {
        // A square block: going around either side is equally long and
        // bends once
        //
        //   3 ---- 4
        //   |      |
        //   2      5
        //   |      |
        //   0 ---- 1
        let (graph, n) = graph(
            &[
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 0.001, y: 0.0 },
                coord! { x: 0.0, y: 0.0005 },
                coord! { x: 0.0, y: 0.001 },
                coord! { x: 0.001, y: 0.001 },
                coord! { x: 0.001, y: 0.0005 },
            ],
            &[(0, 1), (1, 5), (5, 4), (0, 2), (2, 3), (3, 4)],
        );
        let path = dijkstra_path(&graph, n[0], n[4], 20.0, TIMEOUT)
            .unwrap()
            .unwrap();
        // Node count ties as well, so node order decides and must not vary
        assert_eq!(path.cost.turns, 1);
        let again = dijkstra_path(&graph, n[0], n[4], 20.0, TIMEOUT)
            .unwrap()
            .unwrap();
        assert_eq!(path, again);
    }

    #[test]
    fn a_straight_path_beats_an_equal_zig_zag() {
        // Both routes weigh 200 m; only the one through `side` bends
        let mut g = PathGraph::new(LocalProjection::new(0.0));
        let a = g.add_node(coord! { x: 0.0, y: 0.0 });
        let b = g.add_node(coord! { x: 0.0, y: 0.001 });
        let c = g.add_node(coord! { x: 0.0, y: 0.002 });
        let side = g.add_node(coord! { x: 0.0005, y: 0.001 });
        let edge = |distance| PathEdge {
            distance,
            feature: FeatureId(1),
        };
        g.add_edge(a, b, edge(100.0));
        g.add_edge(b, c, edge(100.0));
        g.add_edge(a, side, edge(100.0));
        g.add_edge(side, c, edge(100.0));

        let path = dijkstra_path(&g, a, c, 20.0, TIMEOUT).unwrap().unwrap();
        assert_eq!(path.nodes, vec![a, b, c]);
        assert_eq!(path.cost.turns, 0);
    }

    #[test]
    fn disconnected_target_is_none() {
        let (graph, n) = graph(
            &[
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 0.0, y: 0.001 },
                coord! { x: 0.01, y: 0.0 },
                coord! { x: 0.01, y: 0.001 },
            ],
            &[(0, 1), (2, 3)],
        );
        assert_eq!(
            dijkstra_path(&graph, n[0], n[3], 20.0, TIMEOUT).unwrap(),
            None
        );
    }

    #[test]
    fn start_equal_to_target_is_a_single_node() {
        let (graph, n) = graph(
            &[coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 0.001 }],
            &[(0, 1)],
        );
        let path = dijkstra_path(&graph, n[1], n[1], 20.0, TIMEOUT)
            .unwrap()
            .unwrap();
        assert_eq!(path.nodes, vec![n[1]]);
    }

    #[test]
    fn zero_budget_times_out() {
        let (graph, n) = graph(
            &[coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 0.001 }],
            &[(0, 1)],
        );
        assert_eq!(
            dijkstra_path(&graph, n[0], n[1], 20.0, Duration::ZERO).unwrap_err(),
            Error::PlanTimeout(Duration::ZERO)
        );
    }
}
