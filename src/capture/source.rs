//! Frame source abstraction.
//!
//! This module provides a trait-based abstraction over frame producers,
//! allowing file lists and synthetic generators to be swapped freely.
//! Device capture and pixel-format conversion live outside this crate.

use super::frame::CHANNELS;
use super::{CaptureConfig, Frame};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while acquiring frames.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened.
    #[error("failed to open source: {0}")]
    OpenFailed(String),
    /// A listed image could not be read or decoded.
    #[error("failed to decode {path}: {reason}")]
    DecodeFailed {
        /// The listed file.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },
    /// A decoded image does not match the configured dimensions.
    #[error("frame is {got_width}x{got_height}, expected {width}x{height}")]
    DimensionMismatch {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
        /// Width of the decoded image.
        got_width: u32,
        /// Height of the decoded image.
        got_height: u32,
    },
    /// The source has delivered its last frame.
    #[error("no more frames")]
    Exhausted,
    /// `capture` was called before `open`.
    #[error("source not initialized")]
    NotInitialized,
}

/// Trait for frame sources.
///
/// A source delivers one fully decoded 3-channel frame of the configured
/// dimensions per call, or signals that no frame is available.
pub trait FrameSource: Send {
    /// Opens and initializes the source with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError>;

    /// Captures a single frame.
    fn capture(&mut self) -> Result<Frame, SourceError>;

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases resources.
    fn close(&mut self);
}

/// Synthetic source that generates a static textured scene.
///
/// Optionally a bright square starts sliding across the scene after a
/// given number of frames, which gives background subtraction something
/// to find.
#[derive(Debug, Default)]
pub struct SyntheticSource {
    config: Option<CaptureConfig>,
    sequence: u64,
    motion_after: Option<u64>,
    limit: Option<u64>,
}

impl SyntheticSource {
    /// Static scene with no frame limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a moving square at frame index `frame`.
    pub fn with_motion_after(mut self, frame: u64) -> Self {
        self.motion_after = Some(frame);
        self
    }

    /// Reports exhaustion after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    fn background_sample(row: usize, col: usize, channel: usize) -> u8 {
        // Coarse blocks so neighbouring pixels share colours.
        let block = (row / 8) * 31 + (col / 8) * 17 + channel * 59;
        (block % 200 + 20) as u8
    }

    fn square_bounds(&self, width: usize, height: usize) -> Option<(usize, usize, usize)> {
        let start = self.motion_after?;
        if self.sequence < start {
            return None;
        }
        let side = (width.min(height) / 4).max(1);
        let travel = width.saturating_sub(side).max(1);
        let left = ((self.sequence - start) as usize * 2) % travel;
        let top = height.saturating_sub(side) / 2;
        Some((top, left, side))
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::OpenFailed(e.to_string()))?;
        if self.motion_after.is_none() {
            self.motion_after = config.motion_after;
        }
        self.config = Some(config.clone());
        self.sequence = 0;
        tracing::info!(
            width = config.width,
            height = config.height,
            motion_after = ?self.motion_after,
            "Synthetic source opened"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, SourceError> {
        let config = self.config.as_ref().ok_or(SourceError::NotInitialized)?;
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(SourceError::Exhausted);
        }

        let width = config.width as usize;
        let height = config.height as usize;
        let square = self.square_bounds(width, height);

        let mut bytes = Vec::with_capacity(width * height * CHANNELS);
        for row in 0..height {
            for col in 0..width {
                let inside = square.is_some_and(|(top, left, side)| {
                    (top..top + side).contains(&row) && (left..left + side).contains(&col)
                });
                for channel in 0..CHANNELS {
                    bytes.push(if inside {
                        255
                    } else {
                        Self::background_sample(row, col, channel)
                    });
                }
            }
        }

        let frame = Frame::from_bytes(&bytes, config.width, config.height, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        tracing::info!("Synthetic source closed");
    }
}

/// Reads frames from a text file listing one image path per line.
#[derive(Debug)]
pub struct FileListSource {
    list_path: PathBuf,
    paths: Vec<PathBuf>,
    next: usize,
    dimensions: Option<(u32, u32)>,
}

impl FileListSource {
    /// Source reading the image paths listed in `list_path`, one per line.
    pub fn new(list_path: impl Into<PathBuf>) -> Self {
        Self {
            list_path: list_path.into(),
            paths: Vec::new(),
            next: 0,
            dimensions: None,
        }
    }

    /// Returns the dimensions of the first image on the list.
    pub fn probe(list_path: impl AsRef<Path>) -> Result<(u32, u32), SourceError> {
        let paths = read_list(list_path.as_ref())?;
        let first = paths
            .first()
            .ok_or_else(|| SourceError::OpenFailed("image list is empty".into()))?;
        image::image_dimensions(first).map_err(|e| SourceError::DecodeFailed {
            path: first.clone(),
            reason: e.to_string(),
        })
    }

    /// Number of frames not yet delivered.
    pub fn remaining(&self) -> usize {
        self.paths.len().saturating_sub(self.next)
    }
}

fn read_list(list_path: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let content = std::fs::read_to_string(list_path)
        .map_err(|e| SourceError::OpenFailed(format!("{}: {}", list_path.display(), e)))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

impl FrameSource for FileListSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        self.paths = read_list(&self.list_path)?;
        self.next = 0;
        self.dimensions = Some((config.width, config.height));
        tracing::info!(
            list = %self.list_path.display(),
            images = self.paths.len(),
            "File list source opened"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, SourceError> {
        let (width, height) = self.dimensions.ok_or(SourceError::NotInitialized)?;
        let path = self.paths.get(self.next).ok_or(SourceError::Exhausted)?;
        let sequence = self.next as u64;
        self.next += 1;

        let image = image::open(path)
            .map_err(|e| SourceError::DecodeFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        let (got_width, got_height) = image.dimensions();
        if (got_width, got_height) != (width, height) {
            return Err(SourceError::DimensionMismatch {
                width,
                height,
                got_width,
                got_height,
            });
        }

        tracing::trace!(path = %path.display(), sequence, "Decoded image");
        Ok(Frame::from_bytes(image.as_raw(), width, height, sequence))
    }

    fn is_open(&self) -> bool {
        self.dimensions.is_some()
    }

    fn close(&mut self) {
        self.dimensions = None;
        self.paths.clear();
        tracing::info!("File list source closed");
    }
}
