use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::math::angle::Angle;

/// A geographic position. Immutable once constructed, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: Angle,
    pub lng: Angle,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Position {
    #[inline]
    pub fn new_deg(lat: f64, lng: f64) -> Self {
        Self {
            lat: Angle::from_deg(lat),
            lng: Angle::from_deg(lng),
            altitude: None,
            accuracy: None,
        }
    }

    #[inline]
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    #[inline]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    #[inline]
    pub fn lat_deg(&self) -> f64 {
        self.lat.to_deg()
    }

    #[inline]
    pub fn lng_deg(&self) -> f64 {
        self.lng.to_deg()
    }

    /// Rounds lon/lat to 6 decimal places, matching the GeoJSON node-identity
    /// rule in §4.8 of the spec.
    pub fn rounded_key(&self) -> (i64, i64) {
        let round6 = |v: f64| (v * 1_000_000.).round() as i64;
        (round6(self.lng_deg()), round6(self.lat_deg()))
    }
}
impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat_deg(), self.lng_deg())
    }
}

/// A rectangular grid of RGBA pixels. Read-only within the core; never
/// retained beyond a single processing tick.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, RGBA order.
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn expected_len(&self) -> usize {
        self.pixel_count() * 4
    }
}

/// A 256-bin luminance histogram (C1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrightnessHistogram {
    pub bins: Box<[u32; 256]>,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
}

/// A pixel-space rectangle, always fully inside the frame it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
impl PixelRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x + self.width <= frame_width
            && self.y + self.height <= frame_height
    }
}

/// Shadow coverage fraction and the regions it was derived from (C2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowReport {
    pub coverage: f64,
    pub regions: Vec<PixelRect>,
}

/// The fused lighting state of the scene (C4's output, used by C9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightMetrics {
    pub mean_luminance: f64,
    pub ambient_lux: f64,
    pub shadow_coverage: f64,
    pub unified_light_level: f64,
    pub timestamp: u64,
}

/// A dense width*height map of Sobel-magnitude contrast values in [0,1] (C5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}
impl ContrastMap {
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }
}

/// Hazard classification tags (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardKind {
    Obstacle,
    UnevenSurface,
    DropOff,
    Unknown,
}

/// A hazard's position in the world, used by edge scoring (C9) for distance
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    pub lat: f64,
    pub lon: f64,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardDetection {
    pub id: u32,
    pub kind: HazardKind,
    pub confidence: f64,
    pub bbox: PixelRect,
    pub world_position: Option<WorldPosition>,
}

/// An opaque key/value bag carried by nodes and edges, analogous to the
/// teacher's habit of keeping ancillary data alongside identity-bearing
/// structs rather than inventing a dedicated metadata type per caller.
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64, pub i64);
impl NodeId {
    pub fn from_position(pos: Position) -> Self {
        let (lng, lat) = pos.rounded_key();
        NodeId(lng, lat)
    }
}
impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}:{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);
impl Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationNode {
    pub id: NodeId,
    pub position: Position,
    pub metadata: Metadata,
}

/// Invariant I1: `from`/`to` must refer to nodes that exist in the same
/// graph. Enforced by `NavigationGraph::add_edge` and `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub distance: f64,
    pub visibility_score: f64,
    pub safety_score: f64,
    pub metadata: Metadata,
}

/// Nodes and edges of the navigation graph, plus the invariant they must
/// jointly satisfy (I1). Uses `IndexMap` (the teacher's choice in `astar.rs`)
/// so iteration order is deterministic, which the router relies on for
/// stable tie-breaking (S6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationGraph {
    pub nodes: IndexMap<NodeId, NavigationNode>,
    pub edges: IndexMap<EdgeId, NavigationEdge>,
    next_edge_id: u64,
}

impl NavigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NavigationNode) {
        self.nodes.insert(node.id, node);
    }

    /// Inserts an edge and returns its assigned id. Caller must ensure both
    /// endpoints already exist (checked by `validate`, not here, so that
    /// bulk ingestion can add nodes and edges in any order during a single
    /// build pass).
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        distance: f64,
        visibility_score: f64,
        safety_score: f64,
        metadata: Metadata,
    ) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.insert(
            id,
            NavigationEdge {
                id,
                from,
                to,
                distance,
                visibility_score,
                safety_score,
                metadata,
            },
        );
        id
    }

    /// Removes a node and every edge touching it, so no dangling edges
    /// remain afterwards.
    pub fn remove_node(&mut self, id: NodeId) {
        self.nodes.shift_remove(&id);
        self.edges.retain(|_, edge| edge.from != id && edge.to != id);
    }

    pub fn remove_edge(&mut self, id: EdgeId) {
        self.edges.shift_remove(&id);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.next_edge_id = 0;
    }

    /// A cheap copy-on-write snapshot: `IndexMap` clones are O(n) but share
    /// nothing mutable with the original, matching §5's "readers observe a
    /// consistent snapshot" requirement.
    pub fn snapshot(&self) -> NavigationGraph {
        self.clone()
    }

    /// I1: every edge's endpoints must exist as nodes in this graph.
    pub fn validate(&self) -> Result<(), crate::error::NavError> {
        for edge in self.edges.values() {
            if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
                return Err(crate::error::NavError::InvalidArgument {
                    field: format!("edge {}", edge.id),
                    message: "edge references a node that does not exist in the graph".into(),
                });
            }
        }
        Ok(())
    }

    pub fn connected_edges(&self, node: NodeId) -> Vec<&NavigationEdge> {
        self.edges
            .values()
            .filter(|e| e.from == node || e.to == node)
            .collect()
    }

    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = &NavigationEdge> {
        self.edges.values().filter(move |e| e.from == node)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// A computed walking route. `edges.len() == nodes.len() - 1`, except for the
/// trivial start==goal route where both are singletons/empty respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub nodes: Vec<NavigationNode>,
    pub edges: Vec<NavigationEdge>,
    pub total_distance: f64,
    pub total_cost: f64,
    pub estimated_time_seconds: f64,
}

/// Average adult walking speed in m/s, used to derive `estimatedTimeSeconds`.
pub const WALKING_SPEED_M_PER_S: f64 = 1.4;

impl Route {
    pub fn trivial(node: NavigationNode) -> Self {
        Self {
            nodes: vec![node],
            edges: Vec::new(),
            total_distance: 0.,
            total_cost: 0.,
            estimated_time_seconds: 0.,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalState {
    pub light: LightMetrics,
    pub hazards: Vec<HazardDetection>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}
impl GeoBounds {
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}

/// A single GeoJSON ingestion failure. Collected into a `Vec` rather than
/// aborting the whole batch, per §4.8's "other features continue" rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRegion {
    pub id: String,
    pub bounds: GeoBounds,
    pub graph: NavigationGraph,
    pub timestamp: u64,
    pub source: String,
}
