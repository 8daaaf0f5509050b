//! Background model settings.

use crate::capture::ConfigError;
use serde::{Deserialize, Serialize};

/// Settings for the histogram background model.
///
/// Fixed when the model is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BhattaSettings {
    /// Side length of the square patch around each pixel (odd).
    pub size_patch: u32,
    /// Histogram bins per channel.
    pub num_bins: [u32; 3],
    /// Number of warm-up frames accumulated into the background.
    pub num_bg_frames: u32,
    /// Diff values above this are foreground.
    pub threshold: u8,
}

impl Default for BhattaSettings {
    fn default() -> Self {
        Self {
            size_patch: 5,
            num_bins: [8, 8, 8],
            num_bg_frames: 10,
            threshold: 100,
        }
    }
}

impl BhattaSettings {
    /// Checks the settings against the frame dimensions they will run on.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), ConfigError> {
        if self.size_patch == 0 || self.size_patch % 2 == 0 {
            return Err(ConfigError::InvalidPatchSize(self.size_patch));
        }
        if self.size_patch > width || self.size_patch > height {
            return Err(ConfigError::PatchLargerThanFrame {
                size: self.size_patch,
                width,
                height,
            });
        }
        for (channel, &bins) in self.num_bins.iter().enumerate() {
            if bins == 0 || bins > 256 || 256 % bins != 0 {
                return Err(ConfigError::InvalidBinCount { channel, bins });
            }
        }
        if self.num_bg_frames == 0 {
            return Err(ConfigError::InvalidBackgroundFrames);
        }
        // One background bin can collect every sample of every warm-up patch.
        let area = u64::from(self.size_patch) * u64::from(self.size_patch);
        if area * u64::from(self.num_bg_frames) > u64::from(u32::MAX) {
            return Err(ConfigError::BackgroundCountOverflow {
                size: self.size_patch,
                frames: self.num_bg_frames,
            });
        }
        Ok(())
    }

    /// Number of counters in one 3-D histogram.
    #[inline]
    pub fn bins_per_histogram(&self) -> usize {
        self.num_bins.iter().map(|&b| b as usize).product()
    }

    /// Score normalizer `1 / (size_patch^4 * num_bg_frames)`.
    pub fn normalizer(&self) -> f64 {
        let area = f64::from(self.size_patch) * f64::from(self.size_patch);
        1.0 / (area * area * f64::from(self.num_bg_frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        assert!(BhattaSettings::default().validate(320, 240).is_ok());
    }

    #[test]
    fn test_even_patch_rejected() {
        let settings = BhattaSettings {
            size_patch: 4,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(64, 64),
            Err(ConfigError::InvalidPatchSize(4))
        ));
    }

    #[test]
    fn test_non_divisor_bins_rejected() {
        let settings = BhattaSettings {
            num_bins: [8, 12, 8],
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(64, 64),
            Err(ConfigError::InvalidBinCount {
                channel: 1,
                bins: 12
            })
        ));
    }

    #[test]
    fn test_zero_bg_frames_rejected() {
        let settings = BhattaSettings {
            num_bg_frames: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(64, 64),
            Err(ConfigError::InvalidBackgroundFrames)
        ));
    }

    #[test]
    fn test_bin_count_overflow_rejected() {
        let settings = BhattaSettings {
            size_patch: 255,
            num_bg_frames: 66_052,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(512, 512),
            Err(ConfigError::BackgroundCountOverflow {
                size: 255,
                frames: 66_052
            })
        ));

        let largest = BhattaSettings {
            num_bg_frames: 66_051,
            ..settings
        };
        assert!(largest.validate(512, 512).is_ok());
    }

    #[test]
    fn test_normalizer() {
        let settings = BhattaSettings {
            size_patch: 3,
            num_bg_frames: 2,
            ..Default::default()
        };
        assert!((settings.normalizer() - 1.0 / 162.0).abs() < 1e-12);
        assert_eq!(settings.bins_per_histogram(), 512);
    }
}
