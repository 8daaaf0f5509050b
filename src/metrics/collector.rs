//! Metrics collection and registry.

use crate::background::BackgroundModel;
use crate::pipeline::RunStats;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Frames that went through the filter chain.
    pub frames_processed: u64,
    /// Frames rejected by the capture queue.
    pub frames_dropped: u64,
    /// Output frames rejected by the writer queue.
    pub output_dropped: u64,
    /// Frames persisted by the sink.
    pub frames_written: u64,
    /// Frames the sink failed to persist.
    pub write_failures: u64,
    /// Frames waiting in the capture queue.
    pub capture_queue_depth: usize,
    /// Frames waiting in the writer queue.
    pub writer_queue_depth: usize,
    /// Foreground share of the last estimated frame.
    pub foreground_ratio: Option<f64>,
    /// Whether the background model finished warm-up.
    pub background_ready: Option<bool>,
}

impl MetricsSnapshot {
    /// Creates a snapshot from run counters and the background model, if any.
    pub fn from_run(stats: &RunStats, background: Option<&BackgroundModel>) -> Self {
        Self {
            frames_processed: stats.frames_processed,
            frames_dropped: stats.frames_dropped,
            output_dropped: stats.output_dropped,
            frames_written: stats.frames_written,
            write_failures: stats.write_failures,
            capture_queue_depth: 0,
            writer_queue_depth: 0,
            foreground_ratio: background
                .filter(|model| model.is_warmed_up())
                .map(BackgroundModel::foreground_ratio),
            background_ready: background.map(BackgroundModel::is_warmed_up),
        }
    }
}

/// Prometheus metrics registry for the analysis pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Throughput
    frames_processed: IntCounter,
    frames_dropped: IntCounter,
    output_dropped: IntCounter,
    frames_written: IntCounter,
    write_failures: IntCounter,

    // Queues
    capture_queue_depth: IntGauge,
    writer_queue_depth: IntGauge,

    // Background model
    foreground_ratio: Gauge,
    background_ready: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_processed = IntCounter::new(
            "image_analyzer_frames_processed_total",
            "Frames run through the filter chain",
        )?;
        let frames_dropped = IntCounter::new(
            "image_analyzer_frames_dropped_total",
            "Captured frames rejected by a full capture queue",
        )?;
        let output_dropped = IntCounter::new(
            "image_analyzer_output_dropped_total",
            "Output frames rejected by a full writer queue",
        )?;
        let frames_written = IntCounter::new(
            "image_analyzer_frames_written_total",
            "Output frames persisted by the sink",
        )?;
        let write_failures = IntCounter::new(
            "image_analyzer_sink_errors_total",
            "Output frames the sink failed to persist",
        )?;

        let capture_queue_depth = IntGauge::new(
            "image_analyzer_capture_queue_depth",
            "Frames waiting in the capture queue",
        )?;
        let writer_queue_depth = IntGauge::new(
            "image_analyzer_writer_queue_depth",
            "Frames waiting in the writer queue",
        )?;

        let foreground_ratio = Gauge::new(
            "image_analyzer_foreground_ratio",
            "Share of pixels marked foreground in the last frame",
        )?;
        let background_ready = IntGauge::new(
            "image_analyzer_background_ready",
            "Background model warm-up finished (1=ready, 0=warming up)",
        )?;

        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(output_dropped.clone()))?;
        registry.register(Box::new(frames_written.clone()))?;
        registry.register(Box::new(write_failures.clone()))?;
        registry.register(Box::new(capture_queue_depth.clone()))?;
        registry.register(Box::new(writer_queue_depth.clone()))?;
        registry.register(Box::new(foreground_ratio.clone()))?;
        registry.register(Box::new(background_ready.clone()))?;

        Ok(Self {
            registry,
            frames_processed,
            frames_dropped,
            output_dropped,
            frames_written,
            write_failures,
            capture_queue_depth,
            writer_queue_depth,
            foreground_ratio,
            background_ready,
        })
    }

    /// Updates all metrics from a snapshot.
    ///
    /// Counters only move forward; a snapshot with smaller totals leaves
    /// them unchanged.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.frames_processed, snapshot.frames_processed);
        advance(&self.frames_dropped, snapshot.frames_dropped);
        advance(&self.output_dropped, snapshot.output_dropped);
        advance(&self.frames_written, snapshot.frames_written);
        advance(&self.write_failures, snapshot.write_failures);

        self.capture_queue_depth
            .set(snapshot.capture_queue_depth as i64);
        self.writer_queue_depth.set(snapshot.writer_queue_depth as i64);

        if let Some(ratio) = snapshot.foreground_ratio {
            self.foreground_ratio.set(ratio);
        }
        if let Some(ready) = snapshot.background_ready {
            self.background_ready.set(if ready { 1 } else { 0 });
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            frames_processed: 10,
            frames_dropped: 2,
            frames_written: 9,
            capture_queue_depth: 3,
            foreground_ratio: Some(0.25),
            background_ready: Some(true),
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("image_analyzer_frames_processed_total 10"));
        assert!(output.contains("image_analyzer_frames_dropped_total 2"));
        assert!(output.contains("image_analyzer_frames_written_total 9"));
        assert!(output.contains("image_analyzer_capture_queue_depth 3"));
        assert!(output.contains("image_analyzer_foreground_ratio 0.25"));
        assert!(output.contains("image_analyzer_background_ready 1"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&MetricsSnapshot {
            frames_processed: 7,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            frames_processed: 4,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("image_analyzer_frames_processed_total 7"));
    }

    #[test]
    fn test_snapshot_without_background() {
        let stats = RunStats {
            frames_processed: 5,
            ..Default::default()
        };
        let snapshot = MetricsSnapshot::from_run(&stats, None);
        assert_eq!(snapshot.frames_processed, 5);
        assert!(snapshot.foreground_ratio.is_none());
        assert!(snapshot.background_ready.is_none());
    }
}
