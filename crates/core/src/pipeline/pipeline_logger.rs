use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for per-frame pipeline events.
///
/// Lets hosts observe stage timings without the scheduler knowing where the
/// numbers end up.
pub trait PipelineLogger: Send {
    /// Called once per completed frame with the running total.
    fn frame_completed(&mut self, frame_count: u64);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (faces detected, live tracks...).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary and start counting a new run.
    /// Default: no-op.
    fn summary(&mut self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_completed(&mut self, _frame_count: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and peak of one stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Aggregate {
    count: u64,
    sum: f64,
    max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates stage timings and metrics and reports them through `log`.
///
/// Only running aggregates are kept, so memory stays flat on endless
/// streams. A progress line is emitted every `throttle_frames` completed
/// frames; [`PipelineLogger::summary`] reports the run and starts a new one.
pub struct LogPipelineLogger {
    throttle_frames: u64,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    frames: u64,
}

impl LogPipelineLogger {
    pub fn new(throttle_frames: u64) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Pipeline summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            lines.push(format!(
                "  {stage:8}: avg {:6.2}ms  max {:6.1}ms  total {:7.0}ms",
                agg.mean(),
                agg.max,
                agg.sum
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1}", agg.mean()));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    fn reset(&mut self) {
        self.timings.clear();
        self.metrics.clear();
        self.frames = 0;
        self.start_time = Instant::now();
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn frame_completed(&mut self, frame_count: u64) {
        self.frames = frame_count;
        if frame_count % self.throttle_frames == 0 {
            log::info!("Anonymized {frame_count} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.timings.get_mut(stage) {
            Some(agg) => agg.record(duration_ms),
            None => {
                let mut agg = Aggregate::default();
                agg.record(duration_ms);
                self.timings.insert(stage.to_string(), agg);
            }
        }
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&mut self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
        self.reset();
    }
}
