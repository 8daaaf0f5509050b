//! Capture and run configuration.
//!
//! All configuration is checked by `validate()` before any model
//! buffers are allocated, so a bad file is rejected up front rather
//! than partway through a run.

use crate::background::BhattaSettings;
use crate::output::OutputConfig;
use crate::pipeline::PipelineConfig;
use crate::sequence::Filter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Deterministic generated frames.
    #[default]
    Synthetic,
    /// A text file listing one image path per line.
    FileList,
}

/// Configuration for frame capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame source.
    pub source: SourceKind,
    /// Image list for [`SourceKind::FileList`].
    pub input_list: Option<PathBuf>,
    /// Synthetic source only: frame index at which a moving square appears.
    pub motion_after: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            source: SourceKind::Synthetic,
            input_list: None,
            motion_after: None,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.source == SourceKind::FileList && self.input_list.is_none() {
            return Err(ConfigError::MissingInputList);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// `source = "file_list"` without `input_list`.
    #[error("file list source selected but no input list given")]
    MissingInputList,
    /// Even or zero patch size.
    #[error("patch size {0} must be odd and at least 1")]
    InvalidPatchSize(u32),
    /// The patch is wider or taller than the frame.
    #[error("patch size {size} does not fit in a {width}x{height} frame")]
    PatchLargerThanFrame {
        /// Patch edge length.
        size: u32,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// A channel's bin count is out of range or does not divide 256.
    #[error("bin count {bins} on channel {channel} must be in 1..=256 and divide 256 evenly")]
    InvalidBinCount {
        /// Channel index, 0 to 2.
        channel: usize,
        /// The rejected count.
        bins: u32,
    },
    /// `num_bg_frames` is zero.
    #[error("number of background frames must be at least 1")]
    InvalidBackgroundFrames,
    /// A uniform patch over every warm-up frame would overflow a `u32` bin.
    #[error("patch size {size} over {frames} background frames overflows a histogram bin")]
    BackgroundCountOverflow {
        /// Patch edge length.
        size: u32,
        /// Warm-up frame count.
        frames: u32,
    },
    /// `filters` is empty.
    #[error("no filters selected")]
    EmptyFilterList,
    /// A filter name did not parse.
    #[error("unknown filter: {0}")]
    UnknownFilter(String),
    /// A policy name did not parse.
    #[error("unknown admission policy: {0}")]
    UnknownPolicy(String),
    /// A queue capacity of zero.
    #[error("queue capacity must be at least 1")]
    InvalidQueueCapacity,
    /// `reference_frames` is smaller than what a selected filter reads.
    #[error("filter {filter} needs {required} reference frames, only {configured} kept")]
    InsufficientReferences {
        /// Name of the filter.
        filter: &'static str,
        /// References it reads.
        required: usize,
        /// References the config keeps.
        configured: usize,
    },
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[capture]`: frame source and dimensions.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// `[bhatta]`: background model settings.
    #[serde(default)]
    pub bhatta: BhattaSettings,
    /// `[pipeline]`: filters, queues and limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// `[output]`: where output frames go.
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Only the file format is checked here; call [`FileConfig::validate`]
    /// once command-line overrides and probed dimensions are applied.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates every section against each other.
    ///
    /// `[bhatta]` is only checked when the Bhatta filter is selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        if self.pipeline.filters.contains(&Filter::Bhatta) {
            self.bhatta
                .validate(self.capture.width, self.capture.height)?;
        }
        self.pipeline.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_file_list_requires_path() {
        let config = CaptureConfig {
            source: SourceKind::FileList,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingInputList)
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            width = 64
            height = 48

            [bhatta]
            size_patch = 3
            num_bins = [4, 4, 4]

            [pipeline]
            filters = ["copy", "bhatta", "best_box"]
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.width, 64);
        assert_eq!(config.bhatta.size_patch, 3);
        assert_eq!(config.bhatta.num_bg_frames, BhattaSettings::default().num_bg_frames);
        assert_eq!(
            config.pipeline.filters,
            vec![Filter::Copy, Filter::Bhatta, Filter::BestBox]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_patch_larger_than_frame_rejected() {
        let mut config = FileConfig::default();
        config.capture = CaptureConfig::with_dimensions(4, 4);
        config.bhatta.size_patch = 5;
        config.pipeline.filters = vec![Filter::Bhatta];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PatchLargerThanFrame { .. })
        ));
    }

    #[test]
    fn test_background_settings_ignored_without_bhatta() {
        let mut config = FileConfig::default();
        config.capture = CaptureConfig::with_dimensions(3, 3);
        config.pipeline.filters = vec![Filter::Copy, Filter::BestBox];
        assert!(config.validate().is_ok());

        config.pipeline.filters.push(Filter::Bhatta);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PatchLargerThanFrame { .. })
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[capture]\nwidth = \"wide\""),
            Err(ConfigError::ParseError(_))
        ));
    }
}
