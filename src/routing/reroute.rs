use std::time::{Duration, Instant};

use crate::{
    config::{PathfindingConfig, ReroutingConfig},
    error::NavError,
    graph::scoring::refresh_edge_scores,
    model::{EnvironmentalState, NavigationGraph, Position, Route},
};

use super::astar::find_route;

/// `reroute`'s internal target; exceeding it only logs a warning, per
/// the "no second timeout" rule — A* still enforces its own.
const REROUTE_SOFT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Detects significant environmental change and drives recomputation of
/// the current route (C11).
pub struct RerouteManager {
    config: ReroutingConfig,
    current_route: Option<Route>,
    last_environmental_state: Option<EnvironmentalState>,
    last_reroute_time: Option<Instant>,
}

impl RerouteManager {
    pub fn new(config: ReroutingConfig) -> Self {
        Self {
            config,
            current_route: None,
            last_environmental_state: None,
            last_reroute_time: None,
        }
    }

    pub fn current_route(&self) -> Option<&Route> {
        self.current_route.as_ref()
    }

    pub fn set_current_route(&mut self, route: Route) {
        self.current_route = Some(route);
    }

    /// `position` is part of the interface contract but, per the decision
    /// rules, hazard proximity is measured against the route's own nodes,
    /// not the caller's current position.
    pub fn should_reroute(&mut self, current: &EnvironmentalState, _position: Position) -> bool {
        if self.current_route.is_none() {
            return false;
        }

        if let Some(last_reroute_time) = self.last_reroute_time {
            if last_reroute_time.elapsed() < Duration::from_millis(self.config.min_reroute_interval_ms) {
                return false;
            }
        }

        let Some(previous) = &self.last_environmental_state else {
            self.last_environmental_state = Some(current.clone());
            return false;
        };

        let light_delta = (current.light.unified_light_level - previous.light.unified_light_level).abs();
        if light_delta >= self.config.light_change_threshold {
            return true;
        }

        let previous_hazard_ids: std::collections::HashSet<u32> =
            previous.hazards.iter().map(|h| h.id).collect();
        let route_nodes = self.current_route.as_ref().expect("checked above");

        for hazard in &current.hazards {
            if previous_hazard_ids.contains(&hazard.id) {
                continue;
            }
            let Some(world) = hazard.world_position else {
                continue;
            };
            let hazard_pos = Position::new_deg(world.lat, world.lon);
            let near_route = route_nodes.nodes.iter().any(|node| {
                crate::math::haversine_distance(node.position, hazard_pos)
                    <= self.config.hazard_proximity_threshold_m
            });
            if near_route {
                return true;
            }
        }

        false
    }

    /// Refreshes every edge's visibility/safety score from `state` on a
    /// fresh derived copy of `graph` (never mutating the canonical graph),
    /// then recomputes a route. Updates internal bookkeeping on success.
    pub fn reroute(
        &mut self,
        position: Position,
        destination: Position,
        graph: &NavigationGraph,
        pathfinding_config: &PathfindingConfig,
        state: &EnvironmentalState,
    ) -> Result<Route, NavError> {
        let started = Instant::now();

        let mut scored = graph.snapshot();
        refresh_edge_scores(&mut scored, &state.light, &state.hazards);

        let route = find_route(&scored, position, destination, pathfinding_config)?;

        if started.elapsed() > REROUTE_SOFT_TIMEOUT {
            tracing::warn!(elapsed_ms = started.elapsed().as_millis() as u64, "reroute exceeded its soft timeout");
        }

        self.current_route = Some(route.clone());
        self.last_reroute_time = Some(Instant::now());
        self.last_environmental_state = Some(state.clone());

        Ok(route)
    }
}
