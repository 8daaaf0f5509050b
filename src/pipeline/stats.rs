//! Run statistics.

use std::time::Duration;

/// Counters collected over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    /// Frames that went through the filter chain.
    pub frames_processed: u64,
    /// Frames rejected by the capture queue.
    pub frames_dropped: u64,
    /// Output frames rejected by the writer queue.
    pub output_dropped: u64,
    /// Frames the sink persisted.
    pub frames_written: u64,
    /// Frames the sink failed to persist.
    pub write_failures: u64,
    /// Wall time of the tick loop.
    pub elapsed: Duration,
}

impl RunStats {
    /// Processed frames per second of loop time.
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_processed as f64 / secs
        } else {
            0.0
        }
    }

    pub(crate) fn log_summary(&self) {
        tracing::info!(
            processed = self.frames_processed,
            written = self.frames_written,
            elapsed_ms = self.elapsed.as_millis() as u64,
            fps = format_args!("{:.1}", self.fps()),
            "Run complete"
        );
        if self.frames_dropped > 0 || self.output_dropped > 0 {
            tracing::warn!(
                capture = self.frames_dropped,
                output = self.output_dropped,
                "Frames dropped by full queues"
            );
        }
        if self.write_failures > 0 {
            tracing::warn!(failures = self.write_failures, "Some frames were not written");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps() {
        let stats = RunStats {
            frames_processed: 50,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.fps() - 25.0).abs() < 1e-9);
        assert_eq!(RunStats::default().fps(), 0.0);
    }
}
