use simd_json::prelude::*;
use simd_json::OwnedValue;

use crate::{
    error::NavError,
    math::haversine_distance,
    model::{Metadata, NavigationGraph, NavigationNode, NodeId, Position, ValidationError},
};

const DEFAULT_SCORE: f64 = 0.5;

/// Ingests a GeoJSON `FeatureCollection` into `graph`. Per-feature failures
/// are collected and returned rather than aborting the whole batch; a
/// malformed top-level document, or ingestion that would push the graph
/// past `max_graph_nodes`, fails the whole call.
pub fn ingest_geojson(
    graph: &mut NavigationGraph,
    json: &mut [u8],
    max_graph_nodes: usize,
) -> Result<Vec<ValidationError>, NavError> {
    let root: OwnedValue = simd_json::to_owned_value(json).map_err(|err| NavError::InvalidArgument {
        field: "root".into(),
        message: format!("not valid JSON: {err}"),
    })?;

    let features = root
        .get("features")
        .and_then(|v| v.as_array())
        .ok_or_else(|| NavError::InvalidArgument {
            field: "features".into(),
            message: "expected a FeatureCollection with a `features` array".into(),
        })?;

    let mut errors = Vec::new();

    for (i, feature) in features.iter().enumerate() {
        let path = format!("features[{i}]");
        if let Err(err) = ingest_feature(graph, feature, &path, max_graph_nodes) {
            match err {
                FeatureError::Validation(v) => errors.push(v),
                FeatureError::LimitExceeded(e) => return Err(e),
            }
        }
    }

    Ok(errors)
}

enum FeatureError {
    Validation(ValidationError),
    LimitExceeded(NavError),
}

fn ingest_feature(
    graph: &mut NavigationGraph,
    feature: &OwnedValue,
    path: &str,
    max_graph_nodes: usize,
) -> Result<(), FeatureError> {
    let geometry = feature.get("geometry").ok_or_else(|| {
        FeatureError::Validation(ValidationError {
            field: format!("{path}.geometry"),
            message: "missing geometry".into(),
        })
    })?;
    let kind = geometry
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            FeatureError::Validation(ValidationError {
                field: format!("{path}.geometry.type"),
                message: "missing geometry type".into(),
            })
        })?;
    let coordinates = geometry.get("coordinates").ok_or_else(|| {
        FeatureError::Validation(ValidationError {
            field: format!("{path}.geometry.coordinates"),
            message: "missing coordinates".into(),
        })
    })?;

    match kind {
        "Point" => {
            let pos = parse_coordinate(coordinates, &format!("{path}.geometry.coordinates"))?;
            ensure_node_capacity(graph, 1, max_graph_nodes)?;
            insert_node(graph, pos);
            Ok(())
        }
        "MultiPoint" => {
            let coords = coordinates.as_array().ok_or_else(|| {
                validation(path, "geometry.coordinates", "expected an array of points")
            })?;
            for (j, coord) in coords.iter().enumerate() {
                let field = format!("{path}.geometry.coordinates[{j}]");
                let pos = parse_coordinate(coord, &field)?;
                ensure_node_capacity(graph, 1, max_graph_nodes)?;
                insert_node(graph, pos);
            }
            Ok(())
        }
        "LineString" => {
            let positions = parse_line(coordinates, &format!("{path}.geometry.coordinates"), 2)?;
            chain_edges(graph, &positions, max_graph_nodes)
        }
        "MultiLineString" => {
            let lines = coordinates.as_array().ok_or_else(|| {
                validation(path, "geometry.coordinates", "expected an array of linestrings")
            })?;
            for (j, line) in lines.iter().enumerate() {
                let field = format!("{path}.geometry.coordinates[{j}]");
                let positions = parse_line(line, &field, 2)?;
                chain_edges(graph, &positions, max_graph_nodes)?;
            }
            Ok(())
        }
        "Polygon" => {
            let rings = coordinates.as_array().ok_or_else(|| {
                validation(path, "geometry.coordinates", "expected an array of rings")
            })?;
            for (j, ring) in rings.iter().enumerate() {
                let field = format!("{path}.geometry.coordinates[{j}]");
                let positions = parse_line(ring, &field, 4)?;
                chain_edges(graph, &positions, max_graph_nodes)?;
            }
            Ok(())
        }
        "MultiPolygon" => {
            let polygons = coordinates.as_array().ok_or_else(|| {
                validation(path, "geometry.coordinates", "expected an array of polygons")
            })?;
            for (j, polygon) in polygons.iter().enumerate() {
                let rings = polygon.as_array().ok_or_else(|| {
                    validation(
                        path,
                        &format!("geometry.coordinates[{j}]"),
                        "expected an array of rings",
                    )
                })?;
                for (k, ring) in rings.iter().enumerate() {
                    let field = format!("{path}.geometry.coordinates[{j}][{k}]");
                    let positions = parse_line(ring, &field, 4)?;
                    chain_edges(graph, &positions, max_graph_nodes)?;
                }
            }
            Ok(())
        }
        other => Err(validation(
            path,
            "geometry.type",
            &format!("unsupported geometry type `{other}`"),
        )),
    }
}

fn validation(path: &str, suffix: &str, message: &str) -> FeatureError {
    FeatureError::Validation(ValidationError {
        field: format!("{path}.{suffix}"),
        message: message.to_string(),
    })
}

fn parse_coordinate(value: &OwnedValue, field: &str) -> Result<Position, FeatureError> {
    let arr = value.as_array().ok_or_else(|| {
        FeatureError::Validation(ValidationError {
            field: field.to_string(),
            message: "expected a [lon, lat] or [lon, lat, alt] array".into(),
        })
    })?;
    if arr.len() < 2 {
        return Err(FeatureError::Validation(ValidationError {
            field: field.to_string(),
            message: "coordinate must have at least longitude and latitude".into(),
        }));
    }
    let lon = arr[0].as_f64().ok_or_else(|| {
        FeatureError::Validation(ValidationError {
            field: format!("{field}[0]"),
            message: "longitude must be numeric".into(),
        })
    })?;
    let lat = arr[1].as_f64().ok_or_else(|| {
        FeatureError::Validation(ValidationError {
            field: format!("{field}[1]"),
            message: "latitude must be numeric".into(),
        })
    })?;
    if !(-180.0..=180.0).contains(&lon) {
        return Err(FeatureError::Validation(ValidationError {
            field: format!("{field}[0]"),
            message: format!("longitude {lon} out of range [-180,180]"),
        }));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(FeatureError::Validation(ValidationError {
            field: format!("{field}[1]"),
            message: format!("latitude {lat} out of range [-90,90]"),
        }));
    }
    let mut pos = Position::new_deg(lat, lon);
    if let Some(alt) = arr.get(2).and_then(|v| v.as_f64()) {
        pos = pos.with_altitude(alt);
    }
    Ok(pos)
}

fn parse_line(
    value: &OwnedValue,
    field: &str,
    min_len: usize,
) -> Result<Vec<Position>, FeatureError> {
    let arr = value.as_array().ok_or_else(|| {
        FeatureError::Validation(ValidationError {
            field: field.to_string(),
            message: "expected an array of coordinates".into(),
        })
    })?;
    if arr.len() < min_len {
        return Err(FeatureError::Validation(ValidationError {
            field: field.to_string(),
            message: format!("expected at least {min_len} coordinates, got {}", arr.len()),
        }));
    }
    arr.iter()
        .enumerate()
        .map(|(i, coord)| parse_coordinate(coord, &format!("{field}[{i}]")))
        .collect()
}

fn ensure_node_capacity(
    graph: &NavigationGraph,
    additional: usize,
    max_graph_nodes: usize,
) -> Result<(), FeatureError> {
    if graph.nodes.len() + additional > max_graph_nodes {
        return Err(FeatureError::LimitExceeded(NavError::LimitExceeded {
            component: "graph_builder".into(),
            limit: max_graph_nodes,
            actual: graph.nodes.len() + additional,
        }));
    }
    Ok(())
}

fn insert_node(graph: &mut NavigationGraph, pos: Position) -> NodeId {
    let id = NodeId::from_position(pos);
    if !graph.nodes.contains_key(&id) {
        graph.add_node(NavigationNode {
            id,
            position: pos,
            metadata: Metadata::new(),
        });
    }
    id
}

fn chain_edges(
    graph: &mut NavigationGraph,
    positions: &[Position],
    max_graph_nodes: usize,
) -> Result<(), FeatureError> {
    let mut ids = Vec::with_capacity(positions.len());
    for &pos in positions {
        let id = NodeId::from_position(pos);
        if !graph.nodes.contains_key(&id) {
            ensure_node_capacity(graph, 1, max_graph_nodes)?;
        }
        ids.push(insert_node(graph, pos));
    }
    for window in positions.windows(2).zip(ids.windows(2)) {
        let (pos_pair, id_pair) = window;
        let distance = haversine_distance(pos_pair[0], pos_pair[1]);
        graph.add_edge(
            id_pair[0],
            id_pair[1],
            distance,
            DEFAULT_SCORE,
            DEFAULT_SCORE,
            Metadata::new(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_feature_becomes_a_node() {
        let mut graph = NavigationGraph::new();
        let mut json = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[-74.006,40.7128]}}
        ]}"#
        .to_vec();
        let errors = ingest_geojson(&mut graph, &mut json, 10_000).unwrap();
        assert!(errors.is_empty());
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn test_linestring_produces_chained_edges() {
        let mut graph = NavigationGraph::new();
        let mut json = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[0,0.001],[0,0.002]]}}
        ]}"#
        .to_vec();
        let errors = ingest_geojson(&mut graph, &mut json, 10_000).unwrap();
        assert!(errors.is_empty());
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_coordinate_is_rejected_but_others_continue() {
        let mut graph = NavigationGraph::new();
        let mut json = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[200,40.7128]}},
            {"type":"Feature","geometry":{"type":"Point","coordinates":[-74.006,40.7128]}}
        ]}"#
        .to_vec();
        let errors = ingest_geojson(&mut graph, &mut json, 10_000).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn test_ingestion_past_node_cap_fails_with_limit_exceeded() {
        let mut graph = NavigationGraph::new();
        let mut json = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]}},
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,1]}}
        ]}"#
        .to_vec();
        let err = ingest_geojson(&mut graph, &mut json, 1).unwrap_err();
        assert!(matches!(err, NavError::LimitExceeded { .. }));
    }
}
