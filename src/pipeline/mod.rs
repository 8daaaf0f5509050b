//! Per-frame analysis loop.
//!
//! A [`Pipeline`] owns one run: it opens the source and the filter chain,
//! starts the capture and writer threads, drives one tick per frame and
//! tears everything down in order.

mod config;
mod runner;
mod stats;

pub use config::PipelineConfig;
pub use runner::Pipeline;
pub use stats::RunStats;

use crate::background::ModelError;
use crate::capture::{ConfigError, SourceError};
use crate::output::SinkError;
use crate::sequence::SequenceError;
use thiserror::Error;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The background model could not be created.
    #[error("background model error: {0}")]
    Model(#[from] ModelError),
    /// The source failed to open.
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    /// The output sink could not be set up.
    #[error("output error: {0}")]
    Sink(#[from] SinkError),
    /// A frame could not be processed.
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),
    /// The capture or writer thread did not start.
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
