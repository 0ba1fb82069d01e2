use std::time::Instant;

use crate::detection::domain::detected_face::{filter_by_confidence, DetectedFace};
use crate::detection::domain::identity_tracker::{IdentityTracker, TrackedFace};
use crate::detection::domain::result_cache::{CacheKey, ResultCache};
use crate::effects::domain::region_effect::RegionEffect;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::config::AnonymizerConfig;
use crate::shared::frame::Frame;
use crate::shared::region::PixelRect;

/// Per-frame anonymization: cache → confidence filter → tracker → effect.
///
/// Owns all cross-frame state except scheduling. Detection itself happens
/// elsewhere; this use case receives its output.
pub struct AnonymizeFrameUseCase {
    cache: ResultCache,
    tracker: IdentityTracker,
    effect: Box<dyn RegionEffect>,
    confidence_threshold: f64,
}

impl AnonymizeFrameUseCase {
    pub fn new(config: &AnonymizerConfig, effect: Box<dyn RegionEffect>) -> Self {
        Self {
            cache: ResultCache::new(config.cache_ttl_ms, config.cache_capacity),
            tracker: IdentityTracker::new(config.match_threshold, config.max_silent_frames),
            effect,
            confidence_threshold: config.detection_confidence_threshold,
        }
    }

    pub fn cached(&mut self, key: &CacheKey, now_ms: f64) -> Option<Vec<DetectedFace>> {
        self.cache.lookup(key, now_ms)
    }

    pub fn remember(&mut self, key: CacheKey, faces: Vec<DetectedFace>, now_ms: f64) {
        self.cache.store(key, faces, now_ms);
    }

    /// Filters, tracks and paints `detections` onto `frame`.
    pub fn anonymize(
        &mut self,
        frame: &mut Frame,
        detections: &[DetectedFace],
        now_ms: f64,
        logger: &mut dyn PipelineLogger,
    ) -> Vec<TrackedFace> {
        let t0 = Instant::now();
        let confident = filter_by_confidence(detections, self.confidence_threshold);
        let tracked = self.tracker.reconcile(&confident, now_ms);
        logger.timing("track", elapsed_ms(t0));
        logger.metric("faces", confident.len() as f64);
        logger.metric("tracks", self.tracker.live_count() as f64);

        let t1 = Instant::now();
        let (width, height) = (frame.width(), frame.height());
        for face in &tracked {
            let region = PixelRect::from_normalized(&face.face.bounding_box, width, height);
            self.effect.apply(frame, region);
        }
        logger.timing("effect", elapsed_ms(t1));

        tracked
    }

    /// Forgets every identity. The cache survives, since entries expire on
    /// their own.
    pub fn reset_tracking(&mut self) {
        self.tracker.clear();
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn live_tracks(&self) -> usize {
        self.tracker.live_count()
    }
}

pub(crate) fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
