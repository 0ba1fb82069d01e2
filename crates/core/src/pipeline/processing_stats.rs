use crate::shared::constants::STATS_WINDOW_MS;

/// Throughput snapshot published by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProcessingStats {
    pub frame_count: u64,
    pub dropped_frames: u64,
    pub average_processing_time_ms: f64,
    pub current_fps: f64,
}

/// Folds completed and dropped frames into [`ProcessingStats`].
///
/// `current_fps` is recomputed once per rolling window of at least
/// [`STATS_WINDOW_MS`]; between windows it keeps the last value.
#[derive(Debug)]
pub struct StatsAccumulator {
    stats: ProcessingStats,
    window_ms: f64,
    window_start_ms: Option<f64>,
    window_frames: u64,
}

impl StatsAccumulator {
    pub fn new(window_ms: f64) -> Self {
        Self {
            stats: ProcessingStats::default(),
            window_ms,
            window_start_ms: None,
            window_frames: 0,
        }
    }

    pub fn snapshot(&self) -> ProcessingStats {
        self.stats
    }

    /// Opens the first window if none is open yet.
    pub fn observe(&mut self, now_ms: f64) {
        if self.window_start_ms.is_none() {
            self.window_start_ms = Some(now_ms);
        }
    }

    /// Records a completed frame. Returns a snapshot when this frame closed
    /// a window, for publication.
    pub fn record_completed(&mut self, processing_ms: f64, now_ms: f64) -> Option<ProcessingStats> {
        let stats = &mut self.stats;
        stats.frame_count += 1;
        stats.average_processing_time_ms +=
            (processing_ms - stats.average_processing_time_ms) / stats.frame_count as f64;

        self.window_frames += 1;
        let start = *self.window_start_ms.get_or_insert(now_ms);
        let elapsed = now_ms - start;
        if elapsed < self.window_ms {
            return None;
        }
        self.stats.current_fps = self.window_frames as f64 * 1000.0 / elapsed;
        self.window_start_ms = Some(now_ms);
        self.window_frames = 0;
        Some(self.stats)
    }

    pub fn record_dropped(&mut self) {
        self.stats.dropped_frames += 1;
    }

    pub fn reset(&mut self) {
        self.stats = ProcessingStats::default();
        self.window_start_ms = None;
        self.window_frames = 0;
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new(STATS_WINDOW_MS)
    }
}
