//! Image Analyzer Library
//!
//! A frame-by-frame video analysis pipeline. Frames from a source are run
//! through a configurable chain of image operators, the centrepiece of
//! which is a patch-histogram background subtraction model scored with
//! the Bhattacharyya coefficient.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture ──▶ queue ──▶ sequence (filters, background) ──▶ queue ──▶ output
//!                              │
//!                           metrics
//! ```
//!
//! Capture and output each run on their own thread; the two sides meet in
//! bounded [`queue::FrameQueue`]s whose admission policy decides whether a
//! full queue blocks, drops or grows.
//!
//! # Design Principles
//!
//! - **Validate first**: all configuration is checked before any model
//!   memory is allocated
//! - **One canvas**: every operator overwrites the whole output frame
//! - **Bounded history**: temporal operators read a capped list of previous outputs
//! - **Fixed background**: the model is learned once during warm-up and never updated
//!
//! # Example
//!
//! ```no_run
//! use image_analyzer::{
//!     capture::{CaptureConfig, FileConfig, SyntheticSource},
//!     pipeline::Pipeline,
//!     sequence::Filter,
//! };
//!
//! let mut config = FileConfig::default();
//! config.capture = CaptureConfig::with_dimensions(160, 120);
//! config.pipeline.filters = vec![Filter::Bhatta, Filter::BestBox];
//! config.pipeline.frame_limit = 50;
//!
//! let pipeline = Pipeline::new(config).unwrap();
//! let source = SyntheticSource::new().with_motion_after(20);
//! let stats = pipeline.run(Box::new(source), None).unwrap();
//! println!("processed {} frames", stats.frames_processed);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod background;
pub mod capture;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod sequence;

// Re-export commonly used types at crate root
pub use background::{BackgroundModel, BhattaSettings, TickPhase};
pub use capture::{
    CaptureConfig, FileConfig, FileListSource, Frame, FrameSource, SyntheticSource,
};
pub use output::{DiskSink, OutputConfig, OutputSink};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunStats};
pub use queue::{AdmissionPolicy, FrameQueue};
pub use sequence::{Filter, FilterChain, SequenceContext};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
