//! Background thread persisting output frames.

use super::OutputSink;
use crate::capture::Frame;
use crate::queue::{AdmissionPolicy, FrameQueue};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Item carried from the analysis loop to the writer thread.
#[derive(Debug)]
pub enum WriterMessage {
    /// An output canvas to persist.
    Frame(Frame),
    /// Ends the writer thread once everything before it is written.
    Shutdown,
}

/// Counters reported by the writer thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Frames the sink persisted.
    pub written: u64,
    /// Frames the sink failed to persist, including panics.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WriterStats {
        WriterStats {
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Owns the writer thread and the queue feeding it.
pub struct OutputWriter {
    queue: Arc<FrameQueue<WriterMessage>>,
    policy: AdmissionPolicy,
    handle: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl OutputWriter {
    /// Spawns the writer thread with a queue of `capacity` frames.
    pub fn spawn(
        mut sink: Box<dyn OutputSink>,
        capacity: usize,
        policy: AdmissionPolicy,
    ) -> std::io::Result<Self> {
        let queue = Arc::new(FrameQueue::new(capacity));
        let thread_queue = Arc::clone(&queue);
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name("writer".into())
            .spawn(move || loop {
                let frame = match thread_queue.pop() {
                    WriterMessage::Frame(frame) => frame,
                    WriterMessage::Shutdown => break,
                };
                // Sink panics count as failures; the queue keeps draining.
                match panic::catch_unwind(AssertUnwindSafe(|| sink.write(&frame))) {
                    Ok(Ok(())) => {
                        thread_counters.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        thread_counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            sequence = frame.sequence(),
                            error = %e,
                            "Failed to write frame"
                        );
                    }
                    Err(_) => {
                        thread_counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(sequence = frame.sequence(), "Output sink panicked");
                    }
                }
            })?;

        Ok(Self {
            queue,
            policy,
            handle,
            counters,
        })
    }

    /// Hands a snapshot of `frame` to the writer.
    ///
    /// Returns false if the queue rejected it under
    /// [`AdmissionPolicy::Tap`], or if the writer thread is gone.
    pub fn submit(&self, frame: &Frame) -> bool {
        if self.handle.is_finished() {
            return false;
        }
        self.queue
            .admit(self.policy, WriterMessage::Frame(frame.clone()))
            .is_ok()
    }

    /// Frames waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Counters so far; the thread keeps updating them while it runs.
    pub fn stats(&self) -> WriterStats {
        self.counters.snapshot()
    }

    /// Writes everything still queued, stops the thread and returns its
    /// counters.
    pub fn finish(self) -> WriterStats {
        self.queue.shove(WriterMessage::Shutdown);
        if self.handle.join().is_err() {
            tracing::error!("Writer thread panicked");
        }
        self.counters.snapshot()
    }
}
