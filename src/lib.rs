//! Night-time pedestrian navigation: frame processing, sensor fusion,
//! hazard detection, a weighted navigation graph and A*-based routing with
//! dynamic rerouting.

pub mod config;
pub mod error;
pub mod graph;
pub mod math;
pub mod model;
pub mod routing;
pub mod sensors;
pub mod vision;

use parking_lot::Mutex;

use crate::{
    config::{CvConfig, FusionWeightings, PathfindingConfig, ReroutingConfig},
    error::NavError,
    graph::builder::ingest_geojson,
    model::{EnvironmentalState, NavigationGraph, Position, Route, ValidationError},
    routing::{astar::find_route, reroute::RerouteManager},
    sensors::fusion::{fuse, FusionInputs},
    vision::pipeline::CvPipeline,
};

/// Ties the CV pipeline (C7), the navigation graph (C8), the A* router
/// (C10) and the reroute manager (C11) together behind one handle, the way
/// a caller would actually use this system end to end.
///
/// The graph is the only long-lived shared mutable structure: write access
/// goes through `&mut NavigationGraph` under a single mutex, and readers
/// (routing, rerouting) work off a `snapshot()` taken at the start of their
/// computation, per the concurrency model.
pub struct NightShiftNavigator {
    graph: Mutex<NavigationGraph>,
    cv_pipeline: CvPipeline,
    reroute_manager: Mutex<RerouteManager>,
    fusion_weightings: FusionWeightings,
    pathfinding_config: PathfindingConfig,
}

impl NightShiftNavigator {
    pub fn new(
        cv_config: CvConfig,
        fusion_weightings: FusionWeightings,
        pathfinding_config: PathfindingConfig,
        rerouting_config: ReroutingConfig,
    ) -> Result<Self, NavError> {
        cv_config.validate()?;
        pathfinding_config.validate()?;
        rerouting_config.validate()?;

        let cv_pipeline = CvPipeline::new();
        cv_pipeline.initialize(cv_config)?;

        Ok(Self {
            graph: Mutex::new(NavigationGraph::new()),
            cv_pipeline,
            reroute_manager: Mutex::new(RerouteManager::new(rerouting_config)),
            fusion_weightings,
            pathfinding_config,
        })
    }

    /// Ingests a GeoJSON `FeatureCollection` into the shared graph. Holds
    /// the write lock for the duration of ingestion, since the builder is
    /// the graph's single writer.
    pub fn ingest_geojson(&self, json: &mut [u8]) -> Result<Vec<ValidationError>, NavError> {
        let mut graph = self.graph.lock();
        ingest_geojson(&mut graph, json, self.pathfinding_config.max_graph_nodes)
    }

    /// A cheap copy-on-write snapshot of the current graph.
    pub fn graph_snapshot(&self) -> NavigationGraph {
        self.graph.lock().snapshot()
    }

    /// Processes one camera frame through the CV pipeline (C7).
    pub async fn process_frame(
        &self,
        frame: crate::model::Frame,
    ) -> Result<vision::pipeline::FrameResult, NavError> {
        self.cv_pipeline.process_frame(frame).await
    }

    /// Fuses this tick's light signals into a unified light level (C4).
    pub fn fuse_light(&self, inputs: FusionInputs, timestamp: u64) -> crate::model::LightMetrics {
        fuse(inputs, self.fusion_weightings, timestamp)
    }

    /// Computes a fresh route over the current graph snapshot (C10).
    pub fn compute_route(&self, start: Position, goal: Position) -> Result<Route, NavError> {
        let snapshot = self.graph_snapshot();
        find_route(&snapshot, start, goal, &self.pathfinding_config)
    }

    /// Runs the reroute decision and, if warranted, recomputes a route
    /// (C11).
    pub fn maybe_reroute(
        &self,
        state: &EnvironmentalState,
        position: Position,
        destination: Position,
    ) -> Result<Option<Route>, NavError> {
        let mut manager = self.reroute_manager.lock();
        if !manager.should_reroute(state, position) {
            return Ok(None);
        }
        let snapshot = self.graph_snapshot();
        manager
            .reroute(position, destination, &snapshot, &self.pathfinding_config, state)
            .map(Some)
    }

    pub fn shutdown(&self) {
        self.cv_pipeline.shutdown();
    }
}
