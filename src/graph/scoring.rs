use crate::{
    math::haversine_distance,
    model::{HazardDetection, LightMetrics, NavigationEdge, NavigationGraph, NavigationNode},
};

/// Hazards further than this from either endpoint do not affect an edge's
/// safety score.
const HAZARD_PROXIMITY_THRESHOLD_M: f64 = 20.0;

/// `visibility(edge, lightMetrics)` (C9): how well-lit an edge is, derated
/// by shadow coverage. Independent of the specific edge.
pub fn visibility_score(light: &LightMetrics) -> f64 {
    (light.unified_light_level * (1.0 - 0.5 * light.shadow_coverage)).clamp(0.0, 1.0)
}

/// `safety(edge, from, to, hazards, threshold)` (C9): derated by the density
/// and average confidence of nearby hazards; 1.0 when none are nearby.
pub fn safety_score(from: &NavigationNode, to: &NavigationNode, hazards: &[HazardDetection]) -> f64 {
    let nearby: Vec<f64> = hazards
        .iter()
        .filter_map(|hazard| {
            let world = hazard.world_position?;
            let hazard_pos = crate::model::Position::new_deg(world.lat, world.lon);
            let near_from = haversine_distance(from.position, hazard_pos) <= HAZARD_PROXIMITY_THRESHOLD_M;
            let near_to = haversine_distance(to.position, hazard_pos) <= HAZARD_PROXIMITY_THRESHOLD_M;
            (near_from || near_to).then_some(hazard.confidence)
        })
        .collect();

    if nearby.is_empty() {
        return 1.0;
    }

    let average_confidence = nearby.iter().sum::<f64>() / nearby.len() as f64;
    let density = nearby.len() as f64 / 10.0;
    (1.0 - (density * average_confidence).min(1.0)).clamp(0.0, 1.0)
}

/// Recomputes `visibilityScore`/`safetyScore` for every edge, in place.
/// Called on a graph snapshot, never on the canonical graph directly, so
/// routing/rerouting never observes a partially-rescored graph.
pub fn refresh_edge_scores(graph: &mut NavigationGraph, light: &LightMetrics, hazards: &[HazardDetection]) {
    let visibility = visibility_score(light);
    let edge_ids: Vec<_> = graph.edges.keys().copied().collect();
    for id in edge_ids {
        let (from_id, to_id) = {
            let edge = &graph.edges[&id];
            (edge.from, edge.to)
        };
        let (Some(from), Some(to)) = (graph.nodes.get(&from_id), graph.nodes.get(&to_id)) else {
            continue;
        };
        let safety = safety_score(from, to, hazards);
        if let Some(edge) = graph.edges.get_mut(&id) {
            edge.visibility_score = visibility;
            edge.safety_score = safety;
        }
    }
}

/// The total, non-heuristic cost of traversing a single edge under the
/// configured weights (C10's edge-cost formula, shared with C9's scoring
/// consumers so both stay in lock-step).
pub fn edge_cost(edge: &NavigationEdge, w_d: f64, w_v: f64, w_s: f64) -> f64 {
    edge.distance * w_d
        + (1.0 - edge.visibility_score) * edge.distance * w_v
        + (1.0 - edge.safety_score) * edge.distance * w_s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HazardKind, Metadata, NodeId, PixelRect, Position, WorldPosition};

    fn node(lat: f64, lng: f64) -> NavigationNode {
        let pos = Position::new_deg(lat, lng);
        NavigationNode {
            id: NodeId::from_position(pos),
            position: pos,
            metadata: Metadata::new(),
        }
    }

    fn hazard_at(lat: f64, lon: f64, confidence: f64) -> HazardDetection {
        HazardDetection {
            id: 0,
            kind: HazardKind::Obstacle,
            confidence,
            bbox: PixelRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            world_position: Some(WorldPosition {
                lat,
                lon,
                distance_meters: 0.0,
            }),
        }
    }

    #[test]
    fn test_visibility_score_in_unit_interval() {
        let light = LightMetrics {
            mean_luminance: 50.0,
            ambient_lux: 10.0,
            shadow_coverage: 0.3,
            unified_light_level: 0.9,
            timestamp: 0,
        };
        let score = visibility_score(&light);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_safety_is_full_with_no_hazards() {
        let a = node(0.0, 0.0);
        let b = node(0.0, 0.001);
        assert_eq!(safety_score(&a, &b, &[]), 1.0);
    }

    #[test]
    fn test_safety_degrades_with_nearby_hazard() {
        let a = node(0.0, 0.0);
        let b = node(0.0, 0.001);
        let hazards = [hazard_at(0.0, 0.0, 0.9)];
        let score = safety_score(&a, &b, &hazards);
        assert!(score < 1.0);
    }

    #[test]
    fn test_distant_hazard_does_not_affect_safety() {
        let a = node(0.0, 0.0);
        let b = node(0.0, 0.001);
        let hazards = [hazard_at(10.0, 10.0, 0.9)];
        assert_eq!(safety_score(&a, &b, &hazards), 1.0);
    }

    #[test]
    fn test_zero_weights_yield_zero_edge_cost() {
        let edge = NavigationEdge {
            id: crate::model::EdgeId(0),
            from: NodeId::from_position(Position::new_deg(0., 0.)),
            to: NodeId::from_position(Position::new_deg(0., 0.001)),
            distance: 111.195,
            visibility_score: 0.2,
            safety_score: 0.3,
            metadata: Metadata::new(),
        };
        assert_eq!(edge_cost(&edge, 0.0, 0.0, 0.0), 0.0);
    }
}
