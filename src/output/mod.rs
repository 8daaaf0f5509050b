//! Persisting processed frames.
//!
//! Output frames are handed to an [`OutputSink`] on a dedicated writer
//! thread so that disk encoding does not stall the analysis loop.

mod sink;
mod writer;

pub use sink::{DiskSink, OutputSink, SinkError};
pub use writer::{OutputWriter, WriterMessage, WriterStats};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for written frames; no frames are written when unset.
    pub directory: Option<PathBuf>,
    /// File name prefix.
    pub prefix: String,
    /// File extension, which also selects the image format.
    pub extension: String,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: "frame".into(),
            extension: "png".into(),
            metrics_port: 0,
        }
    }
}

impl OutputConfig {
    /// Builds the disk sink if a directory is configured.
    pub fn disk_sink(&self) -> Result<Option<DiskSink>, SinkError> {
        self.directory
            .as_ref()
            .map(|dir| DiskSink::new(dir, self.prefix.clone(), self.extension.clone()))
            .transpose()
    }
}
