//! Per-frame image operators.
//!
//! Every operator writes the whole output canvas. When several are
//! selected for one run they all write the same canvas in order, so a
//! later operator replaces what an earlier one produced; there is no
//! blending between them.

use crate::capture::{ConfigError, Frame, CHANNELS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The operators a pipeline can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Output := input.
    Copy,
    /// Output := luminance replicated into all channels.
    Grayscale,
    /// Output := normalized 3x3 gradient magnitude per channel.
    Derivative,
    /// Output := |input - previous output|.
    Difference,
    /// Output := normalized 2x2 temporal difference against the output
    /// two ticks back.
    Flow,
    /// Output := background model diff image.
    Bhatta,
    /// Output := white box around pixels >= 128 on black.
    BestBox,
}

impl Filter {
    /// Every operator, in declaration order.
    pub const ALL: [Filter; 7] = [
        Filter::Copy,
        Filter::Grayscale,
        Filter::Derivative,
        Filter::Difference,
        Filter::Flow,
        Filter::Bhatta,
        Filter::BestBox,
    ];

    /// Config-file name.
    pub fn name(self) -> &'static str {
        match self {
            Filter::Copy => "copy",
            Filter::Grayscale => "grayscale",
            Filter::Derivative => "derivative",
            Filter::Difference => "difference",
            Filter::Flow => "flow",
            Filter::Bhatta => "bhatta",
            Filter::BestBox => "best_box",
        }
    }

    /// Number of reference frames the operator reads.
    pub fn required_references(self) -> usize {
        match self {
            Filter::Difference => 1,
            Filter::Flow => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "copy" => Ok(Filter::Copy),
            "grayscale" | "gray" => Ok(Filter::Grayscale),
            "derivative" | "deriv" => Ok(Filter::Derivative),
            "difference" | "diff" => Ok(Filter::Difference),
            "flow" => Ok(Filter::Flow),
            "bhatta" => Ok(Filter::Bhatta),
            "best_box" | "bestbox" | "mbox" => Ok(Filter::BestBox),
            _ => Err(ConfigError::UnknownFilter(name)),
        }
    }
}

/// Inclusive pixel bounds of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// First row.
    pub top: usize,
    /// First column.
    pub left: usize,
    /// Last row.
    pub bottom: usize,
    /// Last column.
    pub right: usize,
}

/// Output := input.
pub fn copy(input: &Frame, output: &mut Frame) {
    output.copy_from(input);
}

/// Output := `0.30 R + 0.59 G + 0.11 B` in every channel.
pub fn grayscale(input: &Frame, output: &mut Frame) {
    for (src, dst) in input
        .pixels()
        .chunks_exact(CHANNELS)
        .zip(output.pixels_mut().chunks_exact_mut(CHANNELS))
    {
        let gray = 0.30 * src[0] + 0.59 * src[1] + 0.11 * src[2];
        dst.fill(gray);
    }
}

/// 3x3 first derivative, border pixels set to zero.
pub fn derivative(input: &Frame, output: &mut Frame) {
    // Largest possible magnitude maps to 255.
    let scale = 255.0 / ((255.0f64 * 3.0).powi(2) * 2.0).sqrt();
    let (width, height) = (input.width() as usize, input.height() as usize);

    for row in 0..height {
        for col in 0..width {
            if row == 0 || col == 0 || row == height - 1 || col == width - 1 {
                output.set_pixel(row, col, [0.0; CHANNELS]);
                continue;
            }

            let mut value = [0.0f32; CHANNELS];
            for (channel, v) in value.iter_mut().enumerate() {
                let s = |r: usize, c: usize| f64::from(input.sample(r, c, channel));
                let dx = (s(row - 1, col + 1) + s(row, col + 1) + s(row + 1, col + 1))
                    - (s(row - 1, col - 1) + s(row, col - 1) + s(row + 1, col - 1));
                let dy = (s(row - 1, col - 1) + s(row - 1, col) + s(row - 1, col + 1))
                    - (s(row + 1, col - 1) + s(row + 1, col) + s(row + 1, col + 1));
                *v = ((dx * dx + dy * dy).sqrt() * scale) as f32;
            }
            output.set_pixel(row, col, value);
        }
    }
}

/// Absolute difference against `previous`; all zero without one.
pub fn difference(input: &Frame, previous: Option<&Frame>, output: &mut Frame) {
    let Some(previous) = previous else {
        output.clear();
        return;
    };
    for ((out, &a), &b) in output
        .pixels_mut()
        .iter_mut()
        .zip(input.pixels())
        .zip(previous.pixels())
    {
        *out = (a - b).abs();
    }
}

/// Temporal gradient over the 2x2 block ending at each pixel, compared
/// with `reference`; all zero without one, border pixels zero.
pub fn flow(input: &Frame, reference: Option<&Frame>, output: &mut Frame) {
    let Some(reference) = reference else {
        output.clear();
        return;
    };

    let lmin = -255.0 * 9.0;
    let scale = 255.0 / (255.0 * 9.0 * 2.0);
    let (width, height) = (input.width() as usize, input.height() as usize);

    for row in 0..height {
        for col in 0..width {
            if row == 0 || col == 0 || row == height - 1 || col == width - 1 {
                output.set_pixel(row, col, [0.0; CHANNELS]);
                continue;
            }

            let mut dz = [0.0f64; CHANNELS];
            for r in row - 1..=row {
                for c in col - 1..=col {
                    for (channel, d) in dz.iter_mut().enumerate() {
                        *d += f64::from(input.sample(r, c, channel))
                            - f64::from(reference.sample(r, c, channel));
                    }
                }
            }
            output.set_pixel(row, col, dz.map(|d| ((d - lmin) * scale) as f32));
        }
    }
}

/// Draws a solid white rectangle spanning every pixel with any channel
/// >= 128, on black. Without such pixels the output is all black.
pub fn best_box(input: &Frame, output: &mut Frame) -> Option<BoundingBox> {
    let (width, height) = (input.width() as usize, input.height() as usize);
    let mut bounds: Option<BoundingBox> = None;

    for row in 0..height {
        for col in 0..width {
            let at = input.offset(row, col, 0);
            if input.pixels()[at..at + CHANNELS].iter().any(|&v| v >= 128.0) {
                let b = bounds.get_or_insert(BoundingBox {
                    top: row,
                    left: col,
                    bottom: row,
                    right: col,
                });
                b.top = b.top.min(row);
                b.left = b.left.min(col);
                b.bottom = b.bottom.max(row);
                b.right = b.right.max(col);
            }
        }
    }

    output.clear();
    if let Some(b) = bounds {
        for row in b.top..=b.bottom {
            for col in b.left..=b.right {
                output.set_pixel(row, col, [255.0; CHANNELS]);
            }
        }
    }
    bounds
}
