//! Prometheus metrics for the analysis pipeline.
//!
//! The registry is always available; the HTTP exporter is compiled in
//! with the `metrics` feature.
//!
//! # Metrics Exposed
//!
//! ## Throughput
//! - `image_analyzer_frames_processed_total` - Frames run through the filter chain
//! - `image_analyzer_frames_dropped_total` - Frames rejected by the capture queue
//! - `image_analyzer_output_dropped_total` - Output frames rejected by the writer queue
//! - `image_analyzer_frames_written_total` - Output frames persisted
//! - `image_analyzer_sink_errors_total` - Output frames that failed to persist
//!
//! ## Queues
//! - `image_analyzer_capture_queue_depth` - Frames waiting for analysis
//! - `image_analyzer_writer_queue_depth` - Frames waiting to be written
//!
//! ## Background model
//! - `image_analyzer_foreground_ratio` - Foreground share of the last frame
//! - `image_analyzer_background_ready` - Warm-up finished (1) or not (0)
//!
//! # Example
//!
//! ```no_run
//! use image_analyzer::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&MetricsSnapshot {
//!     frames_processed: 120,
//!     frames_written: 118,
//!     foreground_ratio: Some(0.04),
//!     background_ready: Some(true),
//!     ..Default::default()
//! });
//!
//! println!("{}", registry.encode().expect("Failed to encode"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
