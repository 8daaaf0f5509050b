//! The per-frame analysis loop.

use super::{PipelineError, RunStats};
use crate::capture::{CaptureMessage, CaptureProducer, FileConfig, Frame, FrameSource};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::output::{OutputSink, OutputWriter};
use crate::queue::FrameQueue;
use crate::sequence::{FilterChain, SequenceContext, SequenceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Wires a frame source, the filter chain and an optional sink together.
///
/// ```text
/// source ─▶ [capture queue] ─▶ load → filters → submit → advance ─▶ [writer queue] ─▶ sink
/// ```
///
/// Capture and writing each run on their own thread; the filters run on
/// the caller's thread.
pub struct Pipeline {
    config: FileConfig,
    stop: Arc<AtomicBool>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Pipeline {
    /// Validates `config` and prepares a pipeline.
    pub fn new(config: FileConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
            metrics: None,
        })
    }

    /// Publishes per-frame counters to `registry`.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Flag that ends the run early when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The validated configuration.
    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    /// Runs until the source is exhausted, the frame limit is reached or
    /// the stop flag is set.
    ///
    /// Frames still queued for the sink are written before this returns.
    pub fn run(
        &self,
        mut source: Box<dyn FrameSource>,
        sink: Option<Box<dyn OutputSink>>,
    ) -> Result<RunStats, PipelineError> {
        let capture = &self.config.capture;
        let settings = &self.config.pipeline;

        source.open(capture)?;
        let chain = FilterChain::new(settings.filters.clone());
        let mut ctx = match chain.open(
            capture.width,
            capture.height,
            settings.reference_frames,
            &self.config.bhatta,
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                source.close();
                return Err(e.into());
            }
        };

        let writer = sink
            .map(|sink| {
                OutputWriter::spawn(sink, settings.writer_queue_capacity, settings.writer_policy)
            })
            .transpose()?;

        let queue = Arc::new(FrameQueue::new(settings.capture_queue_capacity));
        let producer_stop = Arc::new(AtomicBool::new(false));
        let producer = match CaptureProducer::spawn(
            source,
            Arc::clone(&queue),
            settings.capture_policy,
            producer_stop,
        ) {
            Ok(producer) => producer,
            Err(e) => {
                if let Some(writer) = writer {
                    writer.finish();
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            width = capture.width,
            height = capture.height,
            filters = ?settings.filters,
            frame_limit = settings.frame_limit,
            "Pipeline started"
        );

        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut ended = false;
        let mut failure = None;

        loop {
            if settings.limit_reached(stats.frames_processed) {
                tracing::info!(frames = stats.frames_processed, "Frame limit reached");
                break;
            }
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!(frames = stats.frames_processed, "Stop requested");
                break;
            }

            let frame = match queue.pop() {
                CaptureMessage::Frame(frame) => frame,
                CaptureMessage::EndOfStream => {
                    ended = true;
                    break;
                }
            };

            if let Err(e) = tick(&chain, &mut ctx, frame, writer.as_ref(), &mut stats) {
                tracing::error!(frame = ctx.frame_index(), error = %e, "Frame processing failed");
                failure = Some(e);
                break;
            }

            if let Some(registry) = &self.metrics {
                stats.frames_dropped = producer.stats().dropped;
                if let Some(writer) = &writer {
                    let written = writer.stats();
                    stats.frames_written = written.written;
                    stats.write_failures = written.failed;
                }
                let mut snapshot = MetricsSnapshot::from_run(&stats, ctx.background());
                snapshot.capture_queue_depth = queue.len();
                snapshot.writer_queue_depth = writer.as_ref().map_or(0, OutputWriter::pending);
                registry.update(&snapshot);
            }
        }
        stats.elapsed = started.elapsed();

        producer.request_stop();
        if !ended {
            let discarded = drain(&queue);
            tracing::debug!(discarded, "Capture queue drained");
        }
        let produced = producer.join();
        stats.frames_dropped = produced.dropped;

        if let Some(writer) = writer {
            let written = writer.finish();
            stats.frames_written = written.written;
            stats.write_failures = written.failed;
        }

        if let Some(registry) = &self.metrics {
            registry.update(&MetricsSnapshot::from_run(&stats, ctx.background()));
        }
        chain.close(ctx);

        if let Some(e) = failure {
            return Err(e.into());
        }
        stats.log_summary();
        Ok(stats)
    }
}

/// Processes one frame: load, run every operator, hand the output to the
/// writer, then advance the sequence.
fn tick(
    chain: &FilterChain,
    ctx: &mut SequenceContext,
    frame: Frame,
    writer: Option<&OutputWriter>,
    stats: &mut RunStats,
) -> Result<(), SequenceError> {
    let sequence = frame.sequence();
    ctx.load(frame)?;
    let phase = chain.apply(ctx)?;

    if let Some(writer) = writer {
        if !writer.submit(ctx.output()) {
            stats.output_dropped += 1;
            tracing::warn!(sequence, "Writer queue full, output frame dropped");
        }
    }

    tracing::debug!(frame = ctx.frame_index(), sequence, phase = ?phase, "Frame processed");
    ctx.advance();
    stats.frames_processed += 1;
    Ok(())
}

/// Pops until the end-of-stream marker, returning how many frames were
/// thrown away.
fn drain(queue: &FrameQueue<CaptureMessage>) -> u64 {
    let mut discarded = 0;
    while let CaptureMessage::Frame(_) = queue.pop() {
        discarded += 1;
    }
    discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, SyntheticSource};
    use crate::output::SinkError;
    use crate::queue::AdmissionPolicy;
    use crate::sequence::Filter;
    use parking_lot::Mutex;

    struct Recording(Arc<Mutex<Vec<Frame>>>);

    impl OutputSink for Recording {
        fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
            self.0.lock().push(frame.clone());
            Ok(())
        }
    }

    fn small_config(filters: Vec<Filter>) -> FileConfig {
        let mut config = FileConfig::default();
        config.capture = CaptureConfig::with_dimensions(16, 12);
        config.bhatta.size_patch = 3;
        config.bhatta.num_bins = [4, 4, 4];
        config.bhatta.num_bg_frames = 2;
        config.pipeline.filters = filters;
        config
    }

    #[test]
    fn test_run_until_exhausted() {
        let pipeline = Pipeline::new(small_config(vec![Filter::Copy])).unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));

        let stats = pipeline
            .run(
                Box::new(SyntheticSource::new().with_limit(6)),
                Some(Box::new(Recording(Arc::clone(&frames)))),
            )
            .unwrap();

        assert_eq!(stats.frames_processed, 6);
        assert_eq!(stats.frames_written, 6);
        assert_eq!(stats.frames_dropped, 0);
        let sequences: Vec<u64> = frames.lock().iter().map(Frame::sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_frame_limit_stops_endless_source() {
        let mut config = small_config(vec![Filter::Grayscale]);
        config.pipeline.frame_limit = 4;
        let pipeline = Pipeline::new(config).unwrap();

        let stats = pipeline
            .run(Box::new(SyntheticSource::new()), None)
            .unwrap();

        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.frames_written, 0);
    }

    #[test]
    fn test_stop_flag_ends_run() {
        let pipeline = Pipeline::new(small_config(vec![Filter::Copy])).unwrap();
        pipeline.stop_handle().store(true, Ordering::Relaxed);

        let stats = pipeline
            .run(Box::new(SyntheticSource::new()), None)
            .unwrap();
        assert_eq!(stats.frames_processed, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = small_config(Vec::new());
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_metrics_follow_run() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let pipeline = Pipeline::new(small_config(vec![Filter::Bhatta]))
            .unwrap()
            .with_metrics(Arc::clone(&registry));

        pipeline
            .run(Box::new(SyntheticSource::new().with_limit(3)), None)
            .unwrap();

        let text = registry.encode().unwrap();
        assert!(text.contains("image_analyzer_frames_processed_total 3"));
        assert!(text.contains("image_analyzer_background_ready 1"));
    }

    /// Records the written-frames counter the registry shows as each frame
    /// reaches the sink.
    struct CounterWatch {
        registry: Arc<MetricsRegistry>,
        seen: Arc<Mutex<Vec<u64>>>,
    }

    impl OutputSink for CounterWatch {
        fn write(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            let text = self.registry.encode().unwrap();
            let written = text
                .lines()
                .find_map(|line| line.strip_prefix("image_analyzer_frames_written_total "))
                .and_then(|value| value.parse().ok())
                .unwrap_or(0);
            self.seen.lock().push(written);
            Ok(())
        }
    }

    #[test]
    fn test_metrics_count_writes_during_run() {
        let registry = Arc::new(MetricsRegistry::new().unwrap());
        let mut config = small_config(vec![Filter::Copy]);
        config.pipeline.writer_queue_capacity = 1;
        config.pipeline.writer_policy = AdmissionPolicy::Push;
        let pipeline = Pipeline::new(config)
            .unwrap()
            .with_metrics(Arc::clone(&registry));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = CounterWatch {
            registry: Arc::clone(&registry),
            seen: Arc::clone(&seen),
        };
        pipeline
            .run(Box::new(SyntheticSource::new().with_limit(8)), Some(Box::new(sink)))
            .unwrap();

        // With a one-slot writer queue, frame 7 is only submitted after the
        // tick that saw frames 0..=4 written.
        let seen = seen.lock();
        assert_eq!(seen.len(), 8);
        assert!(seen[7] >= 5, "written counter lagged: {:?}", *seen);
    }
}
