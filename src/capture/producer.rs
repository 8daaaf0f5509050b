//! Capture thread feeding a [`FrameQueue`].

use super::{Frame, FrameSource, SourceError};
use crate::queue::{AdmissionPolicy, FrameQueue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Item carried from the capture thread to the analysis loop.
#[derive(Debug)]
pub enum CaptureMessage {
    /// A freshly captured frame.
    Frame(Frame),
    /// The source has no more frames; nothing follows this marker.
    EndOfStream,
}

/// Counters reported by the capture thread when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Frames accepted by the queue.
    pub captured: u64,
    /// Frames rejected by a full queue under [`AdmissionPolicy::Tap`].
    pub dropped: u64,
}

/// Counters shared between the capture thread and its handle.
#[derive(Debug, Default)]
struct Counters {
    captured: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ProducerStats {
        ProducerStats {
            captured: self.captured.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running capture thread.
pub struct CaptureProducer {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl CaptureProducer {
    /// Spawns a thread that captures from an opened `source` until it is
    /// exhausted, fails, or [`request_stop`](Self::request_stop) is called.
    ///
    /// The thread always finishes by shoving [`CaptureMessage::EndOfStream`],
    /// so a consumer popping until the marker never waits forever.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        queue: Arc<FrameQueue<CaptureMessage>>,
        policy: AdmissionPolicy,
        stop: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let thread_stop = Arc::clone(&stop);
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);
        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    let frame = match source.capture() {
                        Ok(frame) => frame,
                        Err(SourceError::Exhausted) => {
                            tracing::info!(
                                captured = thread_counters.captured.load(Ordering::Relaxed),
                                "Frame source exhausted"
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "No frame available, ending capture");
                            break;
                        }
                    };

                    let sequence = frame.sequence();
                    match queue.admit(policy, CaptureMessage::Frame(frame)) {
                        Ok(()) => {
                            thread_counters.captured.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            thread_counters.dropped.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(sequence, "Capture queue full, frame dropped");
                        }
                    }
                }

                source.close();
                queue.shove(CaptureMessage::EndOfStream);
            })?;

        Ok(Self {
            handle,
            stop,
            counters,
        })
    }

    /// Counters so far; the thread keeps updating them while it runs.
    pub fn stats(&self) -> ProducerStats {
        self.counters.snapshot()
    }

    /// Asks the capture thread to stop after its current frame.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Waits for the capture thread and returns its counters.
    pub fn join(self) -> ProducerStats {
        if self.handle.join().is_err() {
            tracing::error!("Capture thread panicked");
        }
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, SyntheticSource};

    fn opened_source(limit: u64) -> Box<dyn FrameSource> {
        let mut source = SyntheticSource::new().with_limit(limit);
        source.open(&CaptureConfig::with_dimensions(8, 8)).unwrap();
        Box::new(source)
    }

    #[test]
    fn test_producer_delivers_all_frames_then_marker() {
        let queue = Arc::new(FrameQueue::new(2));
        let stop = Arc::new(AtomicBool::new(false));
        let producer =
            CaptureProducer::spawn(opened_source(5), Arc::clone(&queue), AdmissionPolicy::Push, stop)
                .unwrap();

        let mut sequences = Vec::new();
        loop {
            match queue.pop() {
                CaptureMessage::Frame(frame) => sequences.push(frame.sequence()),
                CaptureMessage::EndOfStream => break,
            }
        }

        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(
            producer.join(),
            ProducerStats {
                captured: 5,
                dropped: 0
            }
        );
    }

    #[test]
    fn test_producer_stops_on_request() {
        let queue = Arc::new(FrameQueue::new(1));
        let stop = Arc::new(AtomicBool::new(false));
        let producer = CaptureProducer::spawn(
            Box::new({
                let mut source = SyntheticSource::new();
                source.open(&CaptureConfig::with_dimensions(8, 8)).unwrap();
                source
            }),
            Arc::clone(&queue),
            AdmissionPolicy::Push,
            stop,
        )
        .unwrap();

        assert!(matches!(queue.pop(), CaptureMessage::Frame(_)));
        producer.request_stop();

        while !matches!(queue.pop(), CaptureMessage::EndOfStream) {}
        assert!(producer.join().captured >= 1);
    }

    #[test]
    fn test_stats_visible_while_running() {
        let queue = Arc::new(FrameQueue::new(1));
        let stop = Arc::new(AtomicBool::new(false));
        let producer = CaptureProducer::spawn(
            opened_source(1_000),
            Arc::clone(&queue),
            AdmissionPolicy::Tap,
            stop,
        )
        .unwrap();

        // Nothing pops, so every frame after the first is dropped.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while producer.stats().dropped == 0 && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        let live = producer.stats();
        assert_eq!(live.captured, 1);
        assert!(live.dropped > 0);

        producer.request_stop();
        while !matches!(queue.pop(), CaptureMessage::EndOfStream) {}
        let done = producer.join();
        assert_eq!(done.captured, 1);
        assert!(done.dropped >= live.dropped);
    }
}
