//! Frame acquisition and run configuration.
//!
//! This module provides the frame type shared by the whole pipeline,
//! abstractions for frame sources, the capture thread that feeds the
//! analysis loop, and the configuration file format.

mod config;
mod frame;
mod producer;
mod source;

pub use config::{CaptureConfig, ConfigError, FileConfig, SourceKind};
pub use frame::{Frame, CHANNELS};
pub use producer::{CaptureMessage, CaptureProducer, ProducerStats};
pub use source::{FileListSource, FrameSource, SourceError, SyntheticSource};
