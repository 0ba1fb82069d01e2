//! Cooperative frame scheduler.
//!
//! The host calls [`FrameScheduler::on_tick`] from its display-refresh (or
//! timer) callback. Each tick does at most one step of work: finish the
//! in-flight pass, or accept a new frame. While a detection is in flight,
//! ticks are skipped rather than queued, which is the backpressure
//! mechanism: a slow detector lowers the output frame rate instead of
//! growing a backlog.

use std::time::Instant;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::detection::domain::result_cache::CacheKey;
use crate::effects::domain::region_effect::RegionEffect;
use crate::effects::infrastructure::effect_factory::effect_for_config;
use crate::pipeline::anonymize_frame_use_case::{elapsed_ms, AnonymizeFrameUseCase};
use crate::pipeline::infrastructure::detector_worker::{
    DetectionOutcome, DetectorWorker, WorkerError,
};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::processing_stats::{ProcessingStats, StatsAccumulator};
use crate::shared::config::{AnonymizerConfig, ConfigError};
use crate::shared::frame::Frame;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The scheduler is stopped.
    Idle,
    /// A detection is still in flight; this tick was dropped.
    Skipped,
    /// Too early for the next frame at the target rate.
    Throttled,
    /// A frame was handed to the detector.
    Dispatched,
    /// A frame was anonymized and presented.
    Completed,
    /// A frame was lost to a source, detector or sink failure.
    Dropped,
    /// The source has no more frames.
    Exhausted,
}

pub type StatsCallback = Box<dyn FnMut(&ProcessingStats) + Send>;

struct InFlightPass {
    ticket: u64,
    key: CacheKey,
    started: Instant,
}

pub struct FrameScheduler {
    config: AnonymizerConfig,
    use_case: AnonymizeFrameUseCase,
    worker: DetectorWorker,
    sink: Box<dyn FrameSink>,
    source: Option<Box<dyn FrameSource>>,
    logger: Box<dyn PipelineLogger>,
    stats: StatsAccumulator,
    on_stats: Option<StatsCallback>,
    running: bool,
    in_flight: Option<InFlightPass>,
    last_accepted_ms: Option<f64>,
    next_ticket: u64,
}

impl FrameScheduler {
    /// Validates `config` and starts the detector worker. The scheduler
    /// starts out idle.
    pub fn new(
        config: AnonymizerConfig,
        detector: Box<dyn FaceDetector>,
        sink: Box<dyn FrameSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let effect = effect_for_config(&config)?;
        Ok(Self {
            use_case: AnonymizeFrameUseCase::new(&config, effect),
            worker: DetectorWorker::spawn(detector),
            sink,
            source: None,
            logger: Box::new(NullPipelineLogger),
            stats: StatsAccumulator::default(),
            on_stats: None,
            running: false,
            in_flight: None,
            last_accepted_ms: None,
            next_ticket: 0,
            config,
        })
    }

    /// Replaces the effect derived from the config.
    pub fn with_effect(mut self, effect: Box<dyn RegionEffect>) -> Self {
        self.use_case = AnonymizeFrameUseCase::new(&self.config, effect);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AnonymizerConfig {
        &self.config
    }

    /// Registers the callback that receives a snapshot each time a stats
    /// window closes.
    pub fn on_stats(&mut self, callback: impl FnMut(&ProcessingStats) + Send + 'static) {
        self.on_stats = Some(Box::new(callback));
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True while a detection is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn start(&mut self, source: Box<dyn FrameSource>) {
        if self.running {
            log::warn!("Frame scheduler already running; start ignored");
            return;
        }
        self.source = Some(source);
        self.running = true;
        self.last_accepted_ms = None;
        self.logger.info(&format!(
            "Anonymizing at {} fps ({} mode, intensity {})",
            self.config.target_fps, self.config.anonymization_mode, self.config.intensity
        ));
    }

    /// Stops scheduling and resets stats and tracking. A detection still in
    /// flight finishes on the worker and its result is discarded.
    pub fn stop(&mut self) {
        let was_running = self.running;
        let live_tracks = self.use_case.live_tracks();
        self.running = false;
        self.source = None;
        self.in_flight = None;
        self.last_accepted_ms = None;
        self.stats.reset();
        self.use_case.reset_tracking();

        if was_running {
            if let Err(e) = self.sink.finish() {
                log::warn!("Failed to finish frame sink: {e}");
            }
            self.logger.summary();
            log::info!("Frame scheduler stopped with {live_tracks} live tracks");
        }
    }

    /// Swaps in a new detector, for example after a model change or when
    /// the old worker was lost.
    ///
    /// The old worker is retired without waiting for a detection it may
    /// still be running, and that result is never read. Cached detections
    /// came from the old detector and are cleared; tracking continues.
    pub fn reinitialize_detector(&mut self, detector: Box<dyn FaceDetector>) {
        let old = std::mem::replace(&mut self.worker, DetectorWorker::spawn(detector));
        old.retire();
        self.in_flight = None;
        self.use_case.clear_cache();
        log::info!("Face detector reinitialized");
    }

    /// Advances the pipeline by one step. `now_ms` is a monotonic timestamp
    /// in milliseconds.
    pub fn on_tick(&mut self, now_ms: f64) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        self.stats.observe(now_ms);

        if let Some(ticket) = self.in_flight.as_ref().map(|p| p.ticket) {
            return match self.poll_worker(ticket) {
                Ok(Some(outcome)) => match self.in_flight.take() {
                    Some(pass) => self.finish_detected(pass, outcome, now_ms),
                    None => TickOutcome::Skipped,
                },
                Ok(None) => TickOutcome::Skipped,
                Err(e) => {
                    self.in_flight = None;
                    self.drop_frame(&format!("detection lost: {e}"))
                }
            };
        }

        if !self.accept_at(now_ms) {
            return TickOutcome::Throttled;
        }

        let Some(source) = self.source.as_mut() else {
            return TickOutcome::Exhausted;
        };
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return TickOutcome::Exhausted,
            Err(e) => return self.drop_frame(&format!("frame source error: {e}")),
        };
        if let Err(e) = frame.validate() {
            return self.drop_frame(&format!("frame source error: {e}"));
        }

        let started = Instant::now();
        let key = CacheKey::for_frame(&frame, now_ms);
        let t0 = Instant::now();
        let cached = self.use_case.cached(&key, now_ms);
        self.logger.timing("cache", elapsed_ms(t0));
        if let Some(faces) = cached {
            return self.finish(frame, &faces, started, now_ms);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        match self.worker.submit(ticket, frame) {
            Ok(()) => {
                self.in_flight = Some(InFlightPass {
                    ticket,
                    key,
                    started,
                });
                TickOutcome::Dispatched
            }
            Err(e) => {
                if e == WorkerError::Lost {
                    log::error!("Detector worker is gone; reinitialize the detector to resume");
                }
                self.drop_frame(&format!("cannot dispatch frame: {e}"))
            }
        }
    }

    /// Throttles to the target rate. The reference time advances by whole
    /// intervals so the cadence does not drift with tick jitter.
    fn accept_at(&mut self, now_ms: f64) -> bool {
        let interval = self.config.frame_interval_ms();
        match self.last_accepted_ms {
            None => {
                self.last_accepted_ms = Some(now_ms);
                true
            }
            Some(last) => {
                let elapsed = now_ms - last;
                if elapsed < interval {
                    return false;
                }
                self.last_accepted_ms = Some(now_ms - elapsed % interval);
                true
            }
        }
    }

    /// Returns the outcome for `ticket`, discarding answers to passes that
    /// were abandoned by `stop`.
    fn poll_worker(&mut self, ticket: u64) -> Result<Option<DetectionOutcome>, WorkerError> {
        while let Some(outcome) = self.worker.try_receive()? {
            if outcome.ticket == ticket {
                return Ok(Some(outcome));
            }
            log::debug!("Discarding stale detection for frame {}", outcome.frame.index());
        }
        Ok(None)
    }

    fn finish_detected(
        &mut self,
        pass: InFlightPass,
        outcome: DetectionOutcome,
        now_ms: f64,
    ) -> TickOutcome {
        self.logger.timing("detect", elapsed_ms(pass.started));
        let faces: Vec<DetectedFace> = match outcome.result {
            Ok(faces) => {
                self.use_case.remember(pass.key, faces.clone(), now_ms);
                faces
            }
            Err(DetectionError::Unavailable(reason)) => {
                log::debug!("Detector unavailable ({reason}); frame passes through");
                Vec::new()
            }
            Err(e @ DetectionError::Failed(_)) => {
                return self.drop_frame(&format!("frame {}: {e}", outcome.frame.index()));
            }
        };
        self.finish(outcome.frame, &faces, pass.started, now_ms)
    }

    fn finish(
        &mut self,
        mut frame: Frame,
        faces: &[DetectedFace],
        started: Instant,
        now_ms: f64,
    ) -> TickOutcome {
        self.use_case
            .anonymize(&mut frame, faces, now_ms, self.logger.as_mut());

        let t0 = Instant::now();
        if let Err(e) = self.sink.present(&frame) {
            return self.drop_frame(&format!("frame {}: {e}", frame.index()));
        }
        self.logger.timing("present", elapsed_ms(t0));

        let published = self.stats.record_completed(elapsed_ms(started), now_ms);
        self.logger.frame_completed(self.stats.snapshot().frame_count);
        if let (Some(stats), Some(callback)) = (published, self.on_stats.as_mut()) {
            callback(&stats);
        }
        TickOutcome::Completed
    }

    fn drop_frame(&mut self, reason: &str) -> TickOutcome {
        log::warn!("Dropped frame: {reason}");
        self.stats.record_dropped();
        TickOutcome::Dropped
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
