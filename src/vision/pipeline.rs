use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::{
    config::CvConfig,
    error::NavError,
    model::{ContrastMap, Frame, HazardDetection},
};

use super::{contrast::compute_contrast_map, hazards::detect_hazards, histogram::compute_histogram};

const FPS_WINDOW: usize = 30;
const CONSECUTIVE_FAILURE_LIMIT: u32 = 5;
/// Backpressure engages once more than this many frames are already waiting.
const BACKPRESSURE_QUEUE_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Idle,
    Processing,
}

/// Per-frame output of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub histogram: crate::model::BrightnessHistogram,
    pub hazards: Vec<HazardDetection>,
    pub contrast_map: ContrastMap,
    pub processing_time_ms: f64,
}

struct QueuedFrame {
    frame: Frame,
    responder: oneshot::Sender<Result<FrameResult, NavError>>,
}

struct FpsEstimator {
    intervals: VecDeque<Duration>,
    last_submission: Option<Instant>,
}

impl FpsEstimator {
    fn new() -> Self {
        Self {
            intervals: VecDeque::with_capacity(FPS_WINDOW),
            last_submission: None,
        }
    }

    fn record_submission(&mut self, now: Instant) {
        if let Some(prev) = self.last_submission {
            if self.intervals.len() == FPS_WINDOW {
                self.intervals.pop_front();
            }
            self.intervals.push_back(now.duration_since(prev));
        }
        self.last_submission = Some(now);
    }

    /// `None` until enough samples exist to estimate anything.
    fn estimated_fps(&self) -> Option<f64> {
        if self.intervals.is_empty() {
            return None;
        }
        let total: Duration = self.intervals.iter().sum();
        let avg = total.as_secs_f64() / self.intervals.len() as f64;
        if avg <= 0.0 {
            None
        } else {
            Some(1.0 / avg)
        }
    }
}

struct PipelineInner {
    state: PipelineState,
    config: Option<CvConfig>,
    queue: VecDeque<QueuedFrame>,
    fps: FpsEstimator,
}

/// Orchestrates C1 (histogram), C5 (contrast) and C6 (hazards) per frame,
/// with a FIFO queue, FPS tracking and transient-error recovery (C7).
pub struct CvPipeline {
    inner: Mutex<PipelineInner>,
    /// Serializes frame execution so only one frame is ever being computed
    /// at a time, matching the single-threaded-cooperative scheduling model.
    processing_slot: AsyncMutex<()>,
    consecutive_errors: AtomicU32,
}

impl Default for CvPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CvPipeline {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PipelineInner {
                state: PipelineState::Uninitialized,
                config: None,
                queue: VecDeque::new(),
                fps: FpsEstimator::new(),
            }),
            processing_slot: AsyncMutex::new(()),
            consecutive_errors: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock().state
    }

    /// Idempotent: a second call with the same config is a no-op.
    pub fn initialize(&self, config: CvConfig) -> Result<(), NavError> {
        config.validate()?;
        let mut inner = self.inner.lock();
        if inner.state != PipelineState::Uninitialized && inner.config == Some(config) {
            return Ok(());
        }
        inner.config = Some(config);
        inner.state = PipelineState::Idle;
        tracing::info!(?config, "cv pipeline initialized");
        Ok(())
    }

    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        for queued in inner.queue.drain(..) {
            let _ = queued.responder.send(Err(NavError::Cancelled {
                component: "cv_pipeline".into(),
            }));
        }
        inner.state = PipelineState::Uninitialized;
        inner.config = None;
        self.consecutive_errors.store(0, Ordering::SeqCst);
        tracing::info!("cv pipeline shut down");
    }

    /// Processes a frame. Runs synchronously when the pipeline is idle;
    /// otherwise enqueues behind in-flight work and awaits its turn, subject
    /// to the backpressure rule.
    pub async fn process_frame(&self, frame: Frame) -> Result<FrameResult, NavError> {
        let config = {
            let mut inner = self.inner.lock();
            match inner.state {
                PipelineState::Uninitialized => {
                    return Err(NavError::NotInitialized {
                        component: "cv_pipeline".into(),
                    });
                }
                _ => {}
            }
            inner.fps.record_submission(Instant::now());
            inner.config.expect("state != Uninitialized implies config is set")
        };

        // Fast path: nobody else is processing, run inline.
        if let Ok(_guard) = self.processing_slot.try_lock() {
            self.inner.lock().state = PipelineState::Processing;
            let result = self.run_one(&config, frame).await;
            self.inner.lock().state = PipelineState::Idle;
            self.drain_queue(&config).await;
            return result;
        }

        let should_drop = {
            let inner = self.inner.lock();
            let fps_low = inner
                .fps
                .estimated_fps()
                .is_some_and(|fps| fps < config.target_fps);
            fps_low && inner.queue.len() > BACKPRESSURE_QUEUE_DEPTH
        };

        if should_drop {
            let mut inner = self.inner.lock();
            for stale in inner.queue.drain(..) {
                let _ = stale.responder.send(Err(NavError::QueueDropped {
                    component: "cv_pipeline".into(),
                    queue_len: 0,
                }));
            }
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            inner.queue.push_back(QueuedFrame {
                frame,
                responder: tx,
            });
        }

        // The task currently holding `processing_slot` drains the queue
        // after its own frame; just await our turn.
        rx.await.unwrap_or(Err(NavError::Cancelled {
            component: "cv_pipeline".into(),
        }))
    }

    async fn drain_queue(&self, config: &CvConfig) {
        loop {
            let Ok(_guard) = self.processing_slot.try_lock() else {
                return;
            };
            let queued = {
                let mut inner = self.inner.lock();
                inner.queue.pop_front()
            };
            let Some(queued) = queued else {
                return;
            };
            self.inner.lock().state = PipelineState::Processing;
            let result = self.run_one(config, queued.frame).await;
            self.inner.lock().state = PipelineState::Idle;
            let _ = queued.responder.send(result);
        }
    }

    async fn run_one(&self, config: &CvConfig, frame: Frame) -> Result<FrameResult, NavError> {
        let started = Instant::now();

        let histogram = match compute_histogram(&frame) {
            Ok(h) => h,
            Err(err) => {
                // a malformed frame buffer is the caller's fault, not a
                // transient sub-step failure; it is not recoverable with an
                // empty artifact substitution.
                return Err(err);
            }
        };

        let mut frame_failed = false;

        let contrast_map = if config.contrast_map_enabled {
            match compute_contrast_map(&frame) {
                Ok(map) => map,
                Err(err) => {
                    self.record_substep_failure("contrast_map", &frame, &err);
                    frame_failed = true;
                    ContrastMap::zeroed(frame.width, frame.height)
                }
            }
        } else {
            ContrastMap::zeroed(frame.width, frame.height)
        };

        let hazards = if config.hazard_detection_enabled {
            let (hazards, failed_detectors) = detect_hazards(&frame, &contrast_map);
            for detector in &failed_detectors {
                let err = NavError::TransientProcessingError {
                    component: format!("hazard_{detector}"),
                    message: "detector failed, substituting empty result for this frame".into(),
                };
                self.record_substep_failure(detector, &frame, &err);
                frame_failed = true;
            }
            hazards
        } else {
            Vec::new()
        };

        if frame_failed {
            let count = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
            if count >= CONSECUTIVE_FAILURE_LIMIT {
                self.inner.lock().state = PipelineState::Uninitialized;
                return Err(NavError::Fatal {
                    component: "cv_pipeline".into(),
                    message: format!(
                        "{CONSECUTIVE_FAILURE_LIMIT} consecutive frame sub-step failures"
                    ),
                });
            }
        } else {
            self.consecutive_errors.store(0, Ordering::SeqCst);
        }

        Ok(FrameResult {
            histogram,
            hazards,
            contrast_map,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    fn record_substep_failure(&self, substep: &str, frame: &Frame, err: &NavError) {
        tracing::warn!(
            substep,
            frame_width = frame.width,
            frame_height = frame.height,
            queue_len = self.inner.lock().queue.len(),
            %err,
            "cv pipeline sub-step failed, substituting empty artifact"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, gray: u8) -> Frame {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&[gray, gray, gray, 255]);
        }
        Frame::new(width, height, pixels)
    }

    #[tokio::test]
    async fn test_process_frame_before_initialize_is_not_initialized() {
        let pipeline = CvPipeline::new();
        let err = pipeline
            .process_frame(solid_frame(4, 4, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::NotInitialized { .. }));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent_for_same_config() {
        let pipeline = CvPipeline::new();
        let config = CvConfig::default();
        pipeline.initialize(config).unwrap();
        pipeline.initialize(config).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_process_frame_returns_result_and_pipeline_goes_idle() {
        let pipeline = CvPipeline::new();
        pipeline.initialize(CvConfig::default()).unwrap();
        let result = pipeline.process_frame(solid_frame(8, 8, 200)).await.unwrap();
        assert_eq!(result.contrast_map.width, 8);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_work() {
        let pipeline = CvPipeline::new();
        pipeline.initialize(CvConfig::default()).unwrap();
        pipeline.shutdown();
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    }

    #[tokio::test]
    async fn test_disabling_hazard_detection_yields_empty_hazards() {
        let pipeline = CvPipeline::new();
        let mut config = CvConfig::default();
        config.hazard_detection_enabled = false;
        pipeline.initialize(config).unwrap();
        let result = pipeline.process_frame(solid_frame(16, 16, 5)).await.unwrap();
        assert!(result.hazards.is_empty());
    }

    /// A full-frame checkerboard drives the obstacle detector's region
    /// growth past its iteration budget every time, so five frames in a
    /// row should each count as a sub-step failure and the fifth should
    /// escalate to `Fatal`.
    fn checkerboard_frame(size: u32) -> Frame {
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let g = if (x + y) % 2 == 0 { 0 } else { 255 };
                pixels.extend_from_slice(&[g as u8, g as u8, g as u8, 255]);
            }
        }
        Frame::new(size, size, pixels)
    }

    #[tokio::test]
    async fn test_five_consecutive_substep_failures_escalate_to_fatal() {
        let pipeline = CvPipeline::new();
        pipeline.initialize(CvConfig::default()).unwrap();

        for _ in 0..CONSECUTIVE_FAILURE_LIMIT - 1 {
            let result = pipeline.process_frame(checkerboard_frame(256)).await;
            assert!(result.is_ok(), "expected frame to still succeed with a substituted artifact");
        }

        let err = pipeline
            .process_frame(checkerboard_frame(256))
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::Fatal { .. }));
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    }
}
