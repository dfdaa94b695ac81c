use serde::{Deserialize, Serialize};

use crate::error::NavError;

fn invalid(field: &str, message: impl Into<String>) -> NavError {
    NavError::InvalidArgument {
        field: field.to_string(),
        message: message.into(),
    }
}

fn require_unit_interval(field: &str, value: f64) -> Result<(), NavError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("must be within [0,1], got {value}")));
    }
    Ok(())
}

/// Weights for C4's weighted average. Missing components (set to `None`) are
/// excluded and the remaining weights are renormalized to the original sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeightings {
    pub camera: f64,
    pub light_sensor: f64,
    pub shadow_detection: f64,
}

impl Default for FusionWeightings {
    fn default() -> Self {
        Self {
            camera: 0.4,
            light_sensor: 0.4,
            shadow_detection: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorFusionConfig {
    pub update_frequency_hz: f64,
    pub weightings: FusionWeightings,
}

impl Default for SensorFusionConfig {
    fn default() -> Self {
        Self {
            update_frequency_hz: 5.0,
            weightings: FusionWeightings::default(),
        }
    }
}

impl SensorFusionConfig {
    pub fn validate(&self) -> Result<(), NavError> {
        if self.update_frequency_hz < 5.0 {
            return Err(invalid(
                "sensor_fusion.update_frequency_hz",
                format!("must be >= 5, got {}", self.update_frequency_hz),
            ));
        }
        require_unit_interval("sensor_fusion.weightings.camera", self.weightings.camera)?;
        require_unit_interval(
            "sensor_fusion.weightings.light_sensor",
            self.weightings.light_sensor,
        )?;
        require_unit_interval(
            "sensor_fusion.weightings.shadow_detection",
            self.weightings.shadow_detection,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvConfig {
    pub target_fps: f64,
    pub max_memory_mb: u32,
    pub hazard_detection_enabled: bool,
    pub contrast_map_enabled: bool,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            target_fps: 15.0,
            max_memory_mb: 150,
            hazard_detection_enabled: true,
            contrast_map_enabled: true,
        }
    }
}

impl CvConfig {
    pub fn validate(&self) -> Result<(), NavError> {
        if self.target_fps < 10.0 {
            return Err(invalid(
                "cv.target_fps",
                format!("must be >= 10, got {}", self.target_fps),
            ));
        }
        if self.max_memory_mb > 150 {
            return Err(invalid(
                "cv.max_memory_mb",
                format!("must be <= 150, got {}", self.max_memory_mb),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    pub distance: f64,
    pub visibility: f64,
    pub safety: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            distance: 1.0,
            visibility: 0.0,
            safety: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathfindingConfig {
    pub max_graph_nodes: usize,
    pub route_calculation_timeout_ms: u64,
    pub cost_weights: CostWeights,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            max_graph_nodes: 10_000,
            route_calculation_timeout_ms: 3_000,
            cost_weights: CostWeights::default(),
        }
    }
}

impl PathfindingConfig {
    pub fn validate(&self) -> Result<(), NavError> {
        if self.max_graph_nodes > 10_000 {
            return Err(invalid(
                "pathfinding.max_graph_nodes",
                format!("must be <= 10000, got {}", self.max_graph_nodes),
            ));
        }
        if self.route_calculation_timeout_ms > 3_000 {
            return Err(invalid(
                "pathfinding.route_calculation_timeout_ms",
                format!(
                    "must be <= 3000, got {}",
                    self.route_calculation_timeout_ms
                ),
            ));
        }
        let w = &self.cost_weights;
        if w.distance < 0.0 || w.visibility < 0.0 || w.safety < 0.0 {
            return Err(invalid(
                "pathfinding.cost_weights",
                "distance, visibility and safety weights must each be >= 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReroutingConfig {
    pub light_change_threshold: f64,
    pub hazard_proximity_threshold_m: f64,
    pub min_reroute_interval_ms: u64,
}

impl Default for ReroutingConfig {
    fn default() -> Self {
        Self {
            light_change_threshold: 0.2,
            hazard_proximity_threshold_m: 20.0,
            min_reroute_interval_ms: 5_000,
        }
    }
}

impl ReroutingConfig {
    pub fn validate(&self) -> Result<(), NavError> {
        if self.light_change_threshold < 0.0 {
            return Err(invalid(
                "rerouting.light_change_threshold",
                "must be >= 0",
            ));
        }
        if self.hazard_proximity_threshold_m < 0.0 {
            return Err(invalid(
                "rerouting.hazard_proximity_threshold_m",
                "must be >= 0",
            ));
        }
        Ok(())
    }
}
