use std::{
    cmp,
    collections::BinaryHeap,
    hash::BuildHasherDefault,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use tracing::info;

use crate::{
    config::PathfindingConfig,
    error::NavError,
    graph::scoring::edge_cost,
    math::haversine_distance,
    model::{NavigationEdge, NavigationGraph, NavigationNode, NodeId, Position, Route},
};

pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

pub type Cost = f64;

#[derive(Debug, Clone, PartialEq)]
struct NodeData {
    came_from: u32,
    g_score: Cost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct WeightedNode {
    index: u32,
    g_score: Cost,
    f_score: Cost,
}

impl Eq for WeightedNode {}
impl Ord for WeightedNode {
    #[inline]
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        // intentionally inverted to make the BinaryHeap a min-heap
        other.f_score.total_cmp(&self.f_score)
    }
}
impl PartialOrd for WeightedNode {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds the node nearest to `position` by haversine distance. `None` for an
/// empty graph.
fn snap_to_nearest(graph: &NavigationGraph, position: Position) -> Option<NodeId> {
    graph
        .nodes
        .values()
        .min_by(|a, b| {
            haversine_distance(a.position, position)
                .total_cmp(&haversine_distance(b.position, position))
        })
        .map(|n| n.id)
}

/// Weighted shortest path search over `graph` from `start` to `goal` (C10).
///
/// The heuristic is haversine distance to the goal, scaled by
/// `min(1, weights.distance)` so it stays admissible and consistent even
/// when the distance weight is below 1 (see the design notes on the
/// unscaled-heuristic open question).
pub fn find_route(
    graph: &NavigationGraph,
    start: Position,
    goal: Position,
    config: &PathfindingConfig,
) -> Result<Route, NavError> {
    let Some(start_id) = snap_to_nearest(graph, start) else {
        return Err(NavError::NoRoute {
            from: format!("{start}"),
            to: format!("{goal}"),
        });
    };
    let Some(goal_id) = snap_to_nearest(graph, goal) else {
        return Err(NavError::NoRoute {
            from: format!("{start}"),
            to: format!("{goal}"),
        });
    };

    if start_id == goal_id {
        let node = graph.nodes[&start_id].clone();
        return Ok(Route::trivial(node));
    }

    let w = &config.cost_weights;
    let heuristic_factor = w.distance.min(1.0).max(0.0);
    let goal_position = graph.nodes[&goal_id].position;

    let heuristic = |pos: Position| haversine_distance(pos, goal_position) * heuristic_factor;

    let mut nodes: FxIndexMap<NodeId, NodeData> = IndexMap::default();
    nodes.insert(
        start_id,
        NodeData {
            came_from: u32::MAX,
            g_score: 0.0,
        },
    );

    let mut open_set = BinaryHeap::new();
    open_set.push(WeightedNode {
        index: 0,
        g_score: 0.0,
        f_score: heuristic(graph.nodes[&start_id].position),
    });

    let timeout = Duration::from_millis(config.route_calculation_timeout_ms);
    let started = Instant::now();

    while let Some(WeightedNode { index, g_score, .. }) = open_set.pop() {
        if started.elapsed() > timeout {
            return Err(NavError::Timeout {
                component: "astar_router".into(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let (current_id, node_data) = nodes.get_index(index as usize).expect("heap index always refers to an inserted node");
        if *current_id == goal_id {
            info!(nodes_considered = nodes.len(), "route found");
            return Ok(reconstruct_route(graph, &nodes, index, w.distance, w.visibility, w.safety));
        }

        if g_score > node_data.g_score {
            continue;
        }

        let current_id = *current_id;
        for edge in graph.outgoing_edges(current_id) {
            let cost = edge_cost(edge, w.distance, w.visibility, w.safety);
            let tentative_g_score = g_score + cost;

            let neighbor_heuristic;
            let neighbor_index;

            match nodes.entry(edge.to) {
                indexmap::map::Entry::Occupied(mut e) => {
                    if tentative_g_score < e.get().g_score {
                        neighbor_heuristic = heuristic(graph.nodes[e.key()].position);
                        neighbor_index = e.index() as u32;
                        e.insert(NodeData {
                            came_from: index,
                            g_score: tentative_g_score,
                        });
                    } else {
                        continue;
                    }
                }
                indexmap::map::Entry::Vacant(e) => {
                    neighbor_heuristic = heuristic(graph.nodes[e.key()].position);
                    neighbor_index = e.index() as u32;
                    e.insert(NodeData {
                        came_from: index,
                        g_score: tentative_g_score,
                    });
                }
            }

            open_set.push(WeightedNode {
                index: neighbor_index,
                g_score: tentative_g_score,
                f_score: tentative_g_score + neighbor_heuristic,
            });
        }
    }

    Err(NavError::NoRoute {
        from: format!("{start}"),
        to: format!("{goal}"),
    })
}

fn reconstruct_route(
    graph: &NavigationGraph,
    nodes: &FxIndexMap<NodeId, NodeData>,
    mut current: u32,
    w_d: f64,
    w_v: f64,
    w_s: f64,
) -> Route {
    let mut node_ids = Vec::new();
    while let Some((node_id, node_data)) = nodes.get_index(current as usize) {
        node_ids.push(*node_id);
        if node_data.came_from == u32::MAX {
            break;
        }
        current = node_data.came_from;
    }
    node_ids.reverse();

    let route_nodes: Vec<NavigationNode> = node_ids
        .iter()
        .map(|id| graph.nodes[id].clone())
        .collect();

    let mut route_edges: Vec<NavigationEdge> = Vec::with_capacity(node_ids.len().saturating_sub(1));
    for pair in node_ids.windows(2) {
        let edge = graph
            .outgoing_edges(pair[0])
            .find(|e| e.to == pair[1])
            .expect("edge used during expansion must still be outgoing from its source");
        route_edges.push(edge.clone());
    }

    let total_distance: f64 = route_edges.iter().map(|e| e.distance).sum();
    let total_cost: f64 = route_edges.iter().map(|e| edge_cost(e, w_d, w_v, w_s)).sum();

    Route {
        nodes: route_nodes,
        edges: route_edges,
        total_distance,
        total_cost,
        estimated_time_seconds: total_distance / crate::model::WALKING_SPEED_M_PER_S,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, NavigationNode};

    fn node_at(graph: &mut NavigationGraph, lat: f64, lng: f64) -> NodeId {
        let pos = Position::new_deg(lat, lng);
        let id = NodeId::from_position(pos);
        graph.add_node(NavigationNode {
            id,
            position: pos,
            metadata: Metadata::new(),
        });
        id
    }

    #[test]
    fn test_trivial_route_when_start_equals_goal() {
        let mut graph = NavigationGraph::new();
        node_at(&mut graph, 0., 0.);
        let config = PathfindingConfig::default();
        let route = find_route(&graph, Position::new_deg(0., 0.), Position::new_deg(0., 0.), &config).unwrap();
        assert_eq!(route.nodes.len(), 1);
        assert_eq!(route.total_distance, 0.0);
        assert_eq!(route.total_cost, 0.0);
    }

    #[test]
    fn test_distance_only_routing_matches_known_distance() {
        let mut graph = NavigationGraph::new();
        let a = node_at(&mut graph, 0., 0.);
        let b = node_at(&mut graph, 0., 0.001);
        let c = node_at(&mut graph, 0., 0.002);
        graph.add_edge(a, b, 111.195, 1.0, 1.0, Metadata::new());
        graph.add_edge(b, c, 111.195, 1.0, 1.0, Metadata::new());

        let mut config = PathfindingConfig::default();
        config.cost_weights = crate::config::CostWeights {
            distance: 1.0,
            visibility: 0.0,
            safety: 0.0,
        };

        let route = find_route(&graph, Position::new_deg(0., 0.), Position::new_deg(0., 0.002), &config).unwrap();
        assert!((route.total_distance - 222.39).abs() < 0.1, "got {}", route.total_distance);
        assert!((route.total_cost - 222.39).abs() < 0.1, "got {}", route.total_cost);
    }

    #[test]
    fn test_visibility_penalty_avoids_worse_detour() {
        let mut graph = NavigationGraph::new();
        let a = node_at(&mut graph, 0., 0.);
        let b = node_at(&mut graph, 0., 0.001);
        let c = node_at(&mut graph, 0., 0.002);
        let d = node_at(&mut graph, 0.0005, 0.001);
        graph.add_edge(a, b, 111.195, 1.0, 1.0, Metadata::new());
        graph.add_edge(b, c, 111.195, 1.0, 1.0, Metadata::new());
        graph.add_edge(a, d, 55.6, 0.0, 1.0, Metadata::new());
        graph.add_edge(d, c, 55.6, 0.0, 1.0, Metadata::new());

        let mut config = PathfindingConfig::default();
        config.cost_weights = crate::config::CostWeights {
            distance: 1.0,
            visibility: 10.0,
            safety: 0.0,
        };

        let route = find_route(&graph, Position::new_deg(0., 0.), Position::new_deg(0., 0.002), &config).unwrap();
        assert_eq!(route.nodes.len(), 3);
        assert_eq!(route.nodes[1].id, b);
    }

    #[test]
    fn test_zero_weights_yield_zero_total_cost() {
        let mut graph = NavigationGraph::new();
        let a = node_at(&mut graph, 0., 0.);
        let b = node_at(&mut graph, 0., 0.001);
        graph.add_edge(a, b, 111.195, 0.2, 0.3, Metadata::new());

        let mut config = PathfindingConfig::default();
        config.cost_weights = crate::config::CostWeights {
            distance: 0.0,
            visibility: 0.0,
            safety: 0.0,
        };

        let route = find_route(&graph, Position::new_deg(0., 0.), Position::new_deg(0., 0.001), &config).unwrap();
        assert_eq!(route.total_cost, 0.0);
    }

    #[test]
    fn test_empty_graph_returns_no_route() {
        let graph = NavigationGraph::new();
        let config = PathfindingConfig::default();
        let err = find_route(&graph, Position::new_deg(0., 0.), Position::new_deg(1., 1.), &config).unwrap_err();
        assert!(matches!(err, NavError::NoRoute { .. }));
    }
}
