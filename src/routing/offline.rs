use std::collections::{HashMap, HashSet};

use crate::{
    config::PathfindingConfig,
    error::NavError,
    math::padded_bounding_box,
    model::{CachedRegion, GeoBounds, NavigationGraph, Position, Route},
};

use super::astar::find_route;

/// Padding applied around the start/goal bounding box when selecting
/// cached regions to merge, per §4.12.
const REGION_QUERY_PADDING_METERS: f64 = 1000.0;

/// Maintains a cache of `CachedRegion`s and routes over their merged graphs
/// without a live map-data source (C12).
#[derive(Debug, Default)]
pub struct OfflineRouter {
    regions: HashMap<String, CachedRegion>,
}

impl OfflineRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_region(&mut self, region: CachedRegion) {
        self.regions.insert(region.id.clone(), region);
    }

    pub fn remove_region(&mut self, id: &str) {
        self.regions.remove(id);
    }

    pub fn regions_intersecting(&self, bounds: &GeoBounds) -> Vec<&CachedRegion> {
        self.regions
            .values()
            .filter(|r| r.bounds.intersects(bounds))
            .collect()
    }

    /// Routes using only cached region data. Returns `Ok(None)` when no
    /// cached region covers the query bounds, or when A* finds no route
    /// over the merged graph. Other failures (e.g. a timeout) propagate.
    pub fn route(
        &self,
        start: Position,
        goal: Position,
        config: &PathfindingConfig,
    ) -> Result<Option<Route>, NavError> {
        let Some((north, south, east, west)) =
            padded_bounding_box(&[start, goal], REGION_QUERY_PADDING_METERS)
        else {
            return Ok(None);
        };
        let query_bounds = GeoBounds {
            north,
            south,
            east,
            west,
        };

        let mut region_ids: Vec<&CachedRegion> = self.regions_intersecting(&query_bounds);
        if region_ids.is_empty() {
            return Ok(None);
        }
        // deterministic merge order so "first-writer-wins" is reproducible.
        region_ids.sort_by(|a, b| a.id.cmp(&b.id));

        let merged = merge_graphs(&region_ids);

        match find_route(&merged, start, goal, config) {
            Ok(route) => Ok(Some(route)),
            Err(NavError::NoRoute { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

fn merge_graphs(regions: &[&CachedRegion]) -> NavigationGraph {
    let mut merged = NavigationGraph::new();
    let mut seen_edges = HashSet::new();

    for region in regions {
        for node in region.graph.nodes.values() {
            if !merged.nodes.contains_key(&node.id) {
                merged.add_node(node.clone());
            }
        }
    }
    for region in regions {
        for edge in region.graph.edges.values() {
            let key = (edge.from, edge.to);
            if seen_edges.insert(key) {
                merged.add_edge(
                    edge.from,
                    edge.to,
                    edge.distance,
                    edge.visibility_score,
                    edge.safety_score,
                    edge.metadata.clone(),
                );
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, NavigationNode, NodeId};

    fn region_with_edge(id: &str, bounds: GeoBounds, a: Position, b: Position) -> CachedRegion {
        let mut graph = NavigationGraph::new();
        let a_id = NodeId::from_position(a);
        let b_id = NodeId::from_position(b);
        graph.add_node(NavigationNode {
            id: a_id,
            position: a,
            metadata: Metadata::new(),
        });
        graph.add_node(NavigationNode {
            id: b_id,
            position: b,
            metadata: Metadata::new(),
        });
        graph.add_edge(a_id, b_id, 111.195, 1.0, 1.0, Metadata::new());
        CachedRegion {
            id: id.to_string(),
            bounds,
            graph,
            timestamp: 0,
            source: "test".into(),
        }
    }

    #[test]
    fn test_no_regions_yields_no_route() {
        let router = OfflineRouter::new();
        let result = router
            .route(Position::new_deg(0., 0.), Position::new_deg(0., 0.001), &PathfindingConfig::default())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_routes_over_a_single_covering_region() {
        let mut router = OfflineRouter::new();
        let bounds = GeoBounds {
            north: 1.0,
            south: -1.0,
            east: 1.0,
            west: -1.0,
        };
        router.upsert_region(region_with_edge(
            "r1",
            bounds,
            Position::new_deg(0., 0.),
            Position::new_deg(0., 0.001),
        ));

        let result = router
            .route(Position::new_deg(0., 0.), Position::new_deg(0., 0.001), &PathfindingConfig::default())
            .unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn test_regions_outside_query_bounds_are_ignored() {
        let mut router = OfflineRouter::new();
        let far_bounds = GeoBounds {
            north: 50.0,
            south: 49.0,
            east: 50.0,
            west: 49.0,
        };
        router.upsert_region(region_with_edge(
            "far",
            far_bounds,
            Position::new_deg(49.5, 49.5),
            Position::new_deg(49.5, 49.501),
        ));

        let result = router
            .route(Position::new_deg(0., 0.), Position::new_deg(0., 0.001), &PathfindingConfig::default())
            .unwrap();
        assert!(result.is_none());
    }
}
