//! Output sinks for processed frames.

use crate::capture::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting a frame.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The frame's buffer does not fit its dimensions.
    #[error("frame buffer does not match {width}x{height}")]
    BadBuffer {
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// Encoding or writing the image file failed.
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// Target file.
        path: PathBuf,
        /// Encoder message.
        reason: String,
    },
}

/// Receives one output frame per tick.
///
/// Implementations must not keep references into the frame after the
/// call returns.
pub trait OutputSink: Send {
    /// Persists `frame`.
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;
}

/// Writes each frame as an 8-bit image file.
///
/// Files are named `<prefix><sequence:06>.<extension>`; the extension
/// selects the encoder.
#[derive(Debug)]
pub struct DiskSink {
    directory: PathBuf,
    prefix: String,
    extension: String,
}

impl DiskSink {
    /// Creates the sink, creating `directory` if needed.
    pub fn new(
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|source| SinkError::CreateDir {
            path: directory.clone(),
            source,
        })?;
        Ok(Self {
            directory,
            prefix: prefix.into(),
            extension: extension.into(),
        })
    }

    /// Path the frame with `sequence` is written to.
    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.directory
            .join(format!("{}{:06}.{}", self.prefix, sequence, self.extension))
    }

    /// Directory the files land in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl OutputSink for DiskSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let path = self.path_for(frame.sequence());
        let image = image::RgbImage::from_raw(frame.width(), frame.height(), frame.to_bytes())
            .ok_or(SinkError::BadBuffer {
                width: frame.width(),
                height: frame.height(),
            })?;
        image.save(&path).map_err(|e| SinkError::WriteFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        tracing::trace!(path = %path.display(), "Frame written");
        Ok(())
    }
}
