use crate::{config::FusionWeightings, model::LightMetrics};

/// Ceiling used to scale a raw lux reading into [0,1]. Readings above this
/// are treated as fully lit.
const LUX_FULL_SCALE: f64 = 1000.0;

/// The subset of per-frame/per-tick light signals available this update.
/// A component is `None` when its upstream collaborator didn't report this
/// tick (e.g. the camera dropped a frame); fusion reweights around it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusionInputs {
    pub mean_luminance: Option<f64>,
    pub ambient_lux: Option<f64>,
    pub shadow_coverage: Option<f64>,
}

/// Combines C1 (mean luminance), C3 (ambient lux) and C2 (shadow coverage)
/// into a single `unifiedLightLevel` (C4).
///
/// Missing components are dropped from both the numerator and the
/// denominator of the weighted average, which is equivalent to
/// reweighting the remaining components so they still sum to the
/// original total.
pub fn fuse(inputs: FusionInputs, weights: FusionWeightings, timestamp: u64) -> LightMetrics {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    if let Some(mean_luminance) = inputs.mean_luminance {
        let camera_norm = (mean_luminance / 255.0).clamp(0.0, 1.0);
        weighted_sum += camera_norm * weights.camera;
        weight_total += weights.camera;
    }
    if let Some(lux) = inputs.ambient_lux {
        let light_norm = (lux / LUX_FULL_SCALE).clamp(0.0, 1.0);
        weighted_sum += light_norm * weights.light_sensor;
        weight_total += weights.light_sensor;
    }
    if let Some(coverage) = inputs.shadow_coverage {
        let shadow_norm = (1.0 - coverage).clamp(0.0, 1.0);
        weighted_sum += shadow_norm * weights.shadow_detection;
        weight_total += weights.shadow_detection;
    }

    let unified_light_level = if weight_total > 0.0 {
        (weighted_sum / weight_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    LightMetrics {
        mean_luminance: inputs.mean_luminance.unwrap_or(0.0),
        ambient_lux: inputs.ambient_lux.unwrap_or(0.0),
        shadow_coverage: inputs.shadow_coverage.unwrap_or(0.0),
        unified_light_level,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal_weights() -> FusionWeightings {
        FusionWeightings {
            camera: 1.0,
            light_sensor: 1.0,
            shadow_detection: 1.0,
        }
    }

    #[test]
    fn test_fully_lit_inputs_saturate_to_one() {
        let inputs = FusionInputs {
            mean_luminance: Some(255.0),
            ambient_lux: Some(LUX_FULL_SCALE),
            shadow_coverage: Some(0.0),
        };
        let metrics = fuse(inputs, equal_weights(), 0);
        assert!((metrics.unified_light_level - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fully_dark_inputs_go_to_zero() {
        let inputs = FusionInputs {
            mean_luminance: Some(0.0),
            ambient_lux: Some(0.0),
            shadow_coverage: Some(1.0),
        };
        let metrics = fuse(inputs, equal_weights(), 0);
        assert!(metrics.unified_light_level.abs() < 1e-9);
    }

    #[test]
    fn test_missing_component_reweights_rather_than_zeroing() {
        let full = fuse(
            FusionInputs {
                mean_luminance: Some(255.0),
                ambient_lux: Some(LUX_FULL_SCALE),
                shadow_coverage: Some(0.0),
            },
            equal_weights(),
            0,
        );
        let missing_lux = fuse(
            FusionInputs {
                mean_luminance: Some(255.0),
                ambient_lux: None,
                shadow_coverage: Some(0.0),
            },
            equal_weights(),
            0,
        );
        // still fully lit: the two present components are both saturated.
        assert!((missing_lux.unified_light_level - full.unified_light_level).abs() < 1e-9);
    }

    #[test]
    fn test_no_inputs_yields_zero_without_panicking() {
        let metrics = fuse(FusionInputs::default(), equal_weights(), 0);
        assert_eq!(metrics.unified_light_level, 0.0);
    }

    #[test]
    fn test_output_always_in_unit_interval() {
        let inputs = FusionInputs {
            mean_luminance: Some(300.0),
            ambient_lux: Some(5000.0),
            shadow_coverage: Some(-1.0),
        };
        let metrics = fuse(inputs, equal_weights(), 0);
        assert!((0.0..=1.0).contains(&metrics.unified_light_level));
    }
}
