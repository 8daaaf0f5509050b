//! Frame type representing a 3-channel floating-point image with metadata.

use std::time::Instant;

/// Number of interleaved channels per pixel.
pub const CHANNELS: usize = 3;

/// A single 3-channel frame.
///
/// Samples are stored row-major and interleaved (`c0 c1 c2 c0 c1 c2 ...`)
/// as `f32` in the byte range `[0, 255]`. The same type is used for the
/// captured input frame and for the output canvas written by filters; the
/// two differ only in role.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved samples, `width * height * CHANNELS` long.
    pixels: Vec<f32>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number assigned by the source.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame from interleaved samples.
    pub fn new(pixels: Vec<f32>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Creates an all-zero frame of the given dimensions.
    pub fn zeros(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * CHANNELS;
        Self::new(vec![0.0; len], width, height, 0)
    }

    /// Creates a frame from 8-bit interleaved samples.
    pub fn from_bytes(bytes: &[u8], width: u32, height: u32, sequence: u64) -> Self {
        let pixels = bytes.iter().map(|&b| f32::from(b)).collect();
        Self::new(pixels, width, height, sequence)
    }

    /// Returns the interleaved samples.
    #[inline]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Returns the interleaved samples mutably.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Sets the sequence number.
    #[inline]
    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Offset of channel `channel` of the pixel at (`row`, `col`).
    #[inline]
    pub fn offset(&self, row: usize, col: usize, channel: usize) -> usize {
        (row * self.width as usize + col) * CHANNELS + channel
    }

    /// Returns one sample.
    #[inline]
    pub fn sample(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.pixels[self.offset(row, col, channel)]
    }

    /// Sets all three channels of one pixel.
    #[inline]
    pub fn set_pixel(&mut self, row: usize, col: usize, value: [f32; CHANNELS]) {
        let at = self.offset(row, col, 0);
        self.pixels[at..at + CHANNELS].copy_from_slice(&value);
    }

    /// Sets every sample to zero.
    pub fn clear(&mut self) {
        self.pixels.fill(0.0);
    }

    /// Overwrites this frame's samples with another frame's.
    ///
    /// Both frames must have identical dimensions.
    pub fn copy_from(&mut self, other: &Frame) {
        self.pixels.copy_from_slice(&other.pixels);
    }

    /// Returns true if `other` has the same width and height.
    #[inline]
    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Converts the samples to bytes, rounding and clamping to [0, 255].
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Validates that the sample buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * CHANNELS
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("samples", &self.pixels.len())
            .finish()
    }
}
