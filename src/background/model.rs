//! Per-pixel histogram background model.
//!
//! During warm-up every frame's patch histograms are accumulated into a
//! per-pixel background database. Afterwards each frame's patch
//! histograms are scored against that database, producing a diff image
//! (0 = same as background, 255 = completely different) and a binary
//! foreground mask. The model is never updated after warm-up.
//!
//! Patch histograms are built with a sliding window along each row: the
//! leftmost patch is counted in full, then every step right removes the
//! column leaving the patch and adds the column entering it.

use super::histogram::{reflect, similarity, BinMapper, Histogram};
use super::BhattaSettings;
use crate::capture::{ConfigError, Frame, CHANNELS};
use thiserror::Error;

/// Errors raised while creating a background model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The settings failed validation.
    #[error("invalid background settings: {0}")]
    Config(#[from] ConfigError),
    /// The per-pixel histogram database could not be reserved.
    #[error("failed to allocate {bytes} bytes for the background model")]
    Allocation {
        /// Size of the rejected request.
        bytes: usize,
    },
}

/// What a call to [`BackgroundModel::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    /// The frame was accumulated into the background; no mask produced.
    WarmUp,
    /// Mask and diff image were recomputed for the frame.
    Estimated,
}

/// Histogram background subtraction engine.
pub struct BackgroundModel {
    settings: BhattaSettings,
    width: usize,
    height: usize,
    mapper: BinMapper,
    bins_per_pixel: usize,
    /// `width * height` histograms, each `bins_per_pixel` long.
    background: Vec<u32>,
    /// Reusable patch histogram.
    working: Histogram,
    mask: Vec<u8>,
    diff_image: Vec<u8>,
    normalizer: f64,
    frames_accumulated: u32,
    foreground_pixels: usize,
}

fn alloc_zeroed<T: Clone + Default>(len: usize, elem_bytes: usize) -> Result<Vec<T>, ModelError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| ModelError::Allocation {
        bytes: len.saturating_mul(elem_bytes),
    })?;
    buf.resize(len, T::default());
    Ok(buf)
}

impl BackgroundModel {
    /// Validates `settings` against the frame size and allocates the model.
    pub fn new(settings: BhattaSettings, width: u32, height: u32) -> Result<Self, ModelError> {
        settings.validate(width, height)?;

        let pixels = (width as usize) * (height as usize);
        let bins_per_pixel = settings.bins_per_histogram();
        let background_len = pixels
            .checked_mul(bins_per_pixel)
            .ok_or(ModelError::Allocation { bytes: usize::MAX })?;

        let background = alloc_zeroed::<u32>(background_len, std::mem::size_of::<u32>())?;
        let mask = alloc_zeroed::<u8>(pixels, 1)?;
        let diff_image = alloc_zeroed::<u8>(pixels * CHANNELS, 1)?;

        tracing::info!(
            width,
            height,
            size_patch = settings.size_patch,
            bins = ?settings.num_bins,
            bg_frames = settings.num_bg_frames,
            model_bytes = background_len * std::mem::size_of::<u32>(),
            "Background model allocated"
        );

        Ok(Self {
            mapper: BinMapper::new(settings.num_bins),
            normalizer: settings.normalizer(),
            working: Histogram::new(bins_per_pixel),
            settings,
            width: width as usize,
            height: height as usize,
            bins_per_pixel,
            background,
            mask,
            diff_image,
            frames_accumulated: 0,
            foreground_pixels: 0,
        })
    }

    /// Runs one frame: warm-up while `frame_index < num_bg_frames`,
    /// estimation afterwards. On estimation the diff image is copied into
    /// `output`; during warm-up `output` is left untouched.
    pub fn tick(&mut self, frame_index: u64, frame: &Frame, output: &mut Frame) -> TickPhase {
        if frame_index < u64::from(self.settings.num_bg_frames) {
            self.populate(frame);
            TickPhase::WarmUp
        } else {
            self.estimate(frame);
            for (out, &diff) in output.pixels_mut().iter_mut().zip(&self.diff_image) {
                *out = f32::from(diff);
            }
            TickPhase::Estimated
        }
    }

    /// Adds every pixel's patch histogram into its background histogram.
    pub fn populate(&mut self, frame: &Frame) {
        debug_assert_eq!(frame.pixel_count(), self.width * self.height);
        let Self {
            settings,
            mapper,
            working,
            background,
            bins_per_pixel,
            ..
        } = self;
        let bins = *bins_per_pixel;

        scan_patches(frame, mapper, settings.size_patch as usize, working, |pixel, hist| {
            let slot = &mut background[pixel * bins..(pixel + 1) * bins];
            for (acc, &count) in slot.iter_mut().zip(hist.counts()) {
                *acc += count;
            }
        });

        self.frames_accumulated += 1;
        tracing::debug!(
            accumulated = self.frames_accumulated,
            of = self.settings.num_bg_frames,
            "Background frame accumulated"
        );
    }

    /// Scores every pixel's patch histogram against the background and
    /// rebuilds the diff image and mask.
    pub fn estimate(&mut self, frame: &Frame) {
        debug_assert_eq!(frame.pixel_count(), self.width * self.height);
        let Self {
            settings,
            mapper,
            working,
            background,
            bins_per_pixel,
            mask,
            diff_image,
            normalizer,
            ..
        } = self;
        let bins = *bins_per_pixel;
        let threshold = settings.threshold;
        let normalizer = *normalizer;
        let mut foreground = 0usize;

        scan_patches(frame, mapper, settings.size_patch as usize, working, |pixel, hist| {
            let bg = &background[pixel * bins..(pixel + 1) * bins];
            let diff = diff_value(similarity(hist.counts(), bg, normalizer));

            diff_image[pixel * CHANNELS..(pixel + 1) * CHANNELS].fill(diff);
            if diff > threshold {
                mask[pixel] = 255;
                foreground += 1;
            } else {
                mask[pixel] = 0;
            }
        });

        self.foreground_pixels = foreground;
        tracing::debug!(
            foreground,
            ratio = self.foreground_ratio(),
            "Foreground estimated"
        );
    }

    /// Similarity of the patch at (`row`, `col`) of `frame` to the stored
    /// background at that pixel, computed without the sliding window.
    pub fn score(&self, frame: &Frame, row: usize, col: usize) -> f64 {
        let hist = patch_histogram(frame, &self.mapper, self.settings.size_patch as usize, row, col);
        similarity(
            hist.counts(),
            self.background_histogram(row * self.width + col),
            self.normalizer,
        )
    }

    /// Accumulated background histogram of pixel index `pixel`.
    pub fn background_histogram(&self, pixel: usize) -> &[u32] {
        &self.background[pixel * self.bins_per_pixel..(pixel + 1) * self.bins_per_pixel]
    }

    /// Foreground mask of the last estimate, one byte (0 or 255) per pixel.
    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    /// Diff image of the last estimate, 3 identical channels per pixel.
    pub fn diff_image(&self) -> &[u8] {
        &self.diff_image
    }

    /// Fraction of pixels marked foreground by the last estimate.
    pub fn foreground_ratio(&self) -> f64 {
        let pixels = self.width * self.height;
        if pixels == 0 {
            return 0.0;
        }
        self.foreground_pixels as f64 / pixels as f64
    }

    /// True once `num_bg_frames` frames have been accumulated.
    pub fn is_warmed_up(&self) -> bool {
        self.frames_accumulated >= self.settings.num_bg_frames
    }

    /// Frames accumulated into the background so far.
    pub fn frames_accumulated(&self) -> u32 {
        self.frames_accumulated
    }

    /// Settings the model was built with.
    pub fn settings(&self) -> &BhattaSettings {
        &self.settings
    }

    /// Releases the model.
    pub fn close(self) {
        tracing::info!(
            accumulated = self.frames_accumulated,
            "Background model released"
        );
    }
}

/// Maps a similarity score to an 8-bit difference (255 = very different).
#[inline]
fn diff_value(score: f64) -> u8 {
    (255.0 - (score * 255.0).round()).clamp(0.0, 255.0) as u8
}

#[inline]
fn pixel_bin(frame: &Frame, mapper: &BinMapper, row: usize, col: usize) -> usize {
    let at = frame.offset(row, col, 0);
    mapper.index(&frame.pixels()[at..at + CHANNELS])
}

/// Applies `op` to the bin of every pixel in column `col` (mirrored)
/// over the patch rows starting at `row_start` (mirrored).
#[inline]
fn for_column(
    frame: &Frame,
    mapper: &BinMapper,
    row_start: isize,
    patch: usize,
    col: isize,
    mut op: impl FnMut(usize),
) {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let col = reflect(col, width);
    for row in row_start..row_start + patch as isize {
        op(pixel_bin(frame, mapper, reflect(row, height), col));
    }
}

/// Builds the histogram of the patch centred on (`row`, `col`) from scratch.
fn patch_histogram(frame: &Frame, mapper: &BinMapper, patch: usize, row: usize, col: usize) -> Histogram {
    let offset = (patch / 2) as isize;
    let mut hist = Histogram::new(mapper.len());
    let col_start = col as isize - offset;
    for c in col_start..col_start + patch as isize {
        for_column(frame, mapper, row as isize - offset, patch, c, |bin| hist.add(bin));
    }
    hist
}

/// Visits every pixel in row-major order with its patch histogram,
/// maintained incrementally along each row in `working`.
fn scan_patches(
    frame: &Frame,
    mapper: &BinMapper,
    patch: usize,
    working: &mut Histogram,
    mut visit: impl FnMut(usize, &Histogram),
) {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let offset = (patch / 2) as isize;
    let patch_span = patch as isize;

    for row in 0..height {
        let row_start = row as isize - offset;

        working.clear();
        for c in -offset..patch_span - offset {
            for_column(frame, mapper, row_start, patch, c, |bin| working.add(bin));
        }
        visit(row * width, &*working);

        for col in 1..width as isize {
            for_column(frame, mapper, row_start, patch, col - offset - 1, |bin| {
                working.remove(bin)
            });
            for_column(frame, mapper, row_start, patch, col - offset + patch_span - 1, |bin| {
                working.add(bin)
            });
            visit(row * width + col as usize, &*working);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(size_patch: u32, bg_frames: u32) -> BhattaSettings {
        BhattaSettings {
            size_patch,
            num_bins: [4, 4, 4],
            num_bg_frames: bg_frames,
            threshold: 100,
        }
    }

    fn constant_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::from_bytes(&vec![value; (width * height) as usize * CHANNELS], width, height, 0)
    }

    fn textured_frame(width: u32, height: u32) -> Frame {
        let bytes: Vec<u8> = (0..(width * height) as usize * CHANNELS)
            .map(|i| ((i * 37 + i / 7 * 11) % 256) as u8)
            .collect();
        Frame::from_bytes(&bytes, width, height, 0)
    }

    #[test]
    fn test_rejects_invalid_settings_before_allocation() {
        let result = BackgroundModel::new(settings(9, 2), 8, 8);
        assert!(matches!(
            result,
            Err(ModelError::Config(ConfigError::PatchLargerThanFrame { .. }))
        ));
    }

    #[test]
    fn test_histogram_conservation_on_constant_frames() {
        let (w, h) = (12, 9);
        let mut model = BackgroundModel::new(settings(3, 4), w, h).unwrap();
        let frame = constant_frame(w, h, 100);
        let mut out = Frame::zeros(w, h);

        for f in 0..4 {
            assert_eq!(model.tick(f, &frame, &mut out), TickPhase::WarmUp);
        }
        assert!(model.is_warmed_up());

        // 100 / 64 = bin 1 on every channel
        let expected_bin = (4 + 1) * 4 + 1;
        for pixel in 0..(w * h) as usize {
            let hist = model.background_histogram(pixel);
            let total: u64 = hist.iter().map(|&c| u64::from(c)).sum();
            assert_eq!(total, 9 * 4);
            assert_eq!(hist[expected_bin], 9 * 4);
        }
    }

    #[test]
    fn test_warmup_leaves_output_untouched() {
        let mut model = BackgroundModel::new(settings(3, 2), 6, 6).unwrap();
        let frame = constant_frame(6, 6, 50);
        let mut out = Frame::new(vec![7.0; 6 * 6 * 3], 6, 6, 0);

        model.tick(0, &frame, &mut out);
        assert!(out.pixels().iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_self_similarity_gives_empty_mask() {
        let (w, h) = (16, 12);
        let mut model = BackgroundModel::new(settings(5, 3), w, h).unwrap();
        let frame = textured_frame(w, h);
        let mut out = Frame::zeros(w, h);

        for f in 0..3 {
            model.tick(f, &frame, &mut out);
        }
        assert_eq!(model.tick(3, &frame, &mut out), TickPhase::Estimated);

        for row in 0..h as usize {
            for col in 0..w as usize {
                assert!((model.score(&frame, row, col) - 1.0).abs() < 1e-9);
            }
        }
        assert!(model.mask().iter().all(|&m| m == 0));
        assert!(model.diff_image().iter().all(|&d| d == 0));
        assert!(out.pixels().iter().all(|&v| v == 0.0));
        assert_eq!(model.foreground_ratio(), 0.0);
    }

    #[test]
    fn test_changed_region_is_foreground() {
        let (w, h) = (20, 20);
        let mut model = BackgroundModel::new(settings(3, 2), w, h).unwrap();
        let background = constant_frame(w, h, 20);
        let mut out = Frame::zeros(w, h);
        model.tick(0, &background, &mut out);
        model.tick(1, &background, &mut out);

        let mut changed = background.clone();
        for row in 8..12 {
            for col in 8..12 {
                changed.set_pixel(row, col, [250.0, 250.0, 250.0]);
            }
        }
        model.tick(2, &changed, &mut out);

        assert_eq!(model.mask()[10 * w as usize + 10], 255);
        assert_eq!(model.mask()[0], 0);
        assert_eq!(out.sample(10, 10, 0), 255.0);
        assert!(model.foreground_ratio() > 0.0);
    }

    #[test]
    fn test_sliding_window_matches_fresh_histogram() {
        let (w, h) = (9, 7);
        let frame = textured_frame(w, h);
        let mapper = BinMapper::new([4, 4, 4]);
        let mut working = Histogram::new(mapper.len());
        let mut visited = 0;

        scan_patches(&frame, &mapper, 5, &mut working, |pixel, hist| {
            let (row, col) = (pixel / w as usize, pixel % w as usize);
            assert_eq!(*hist, patch_histogram(&frame, &mapper, 5, row, col));
            assert_eq!(hist.total(), 25);
            visited += 1;
        });
        assert_eq!(visited, (w * h) as usize);
    }

    #[test]
    fn test_diff_value_mapping() {
        assert_eq!(diff_value(1.0), 0);
        assert_eq!(diff_value(0.0), 255);
        assert_eq!(diff_value(0.5), 127);
        assert_eq!(diff_value(1.2), 0);
    }

    #[test]
    fn test_oversized_model_reports_allocation_failure() {
        let settings = BhattaSettings {
            size_patch: 5,
            num_bins: [256, 256, 256],
            num_bg_frames: 10,
            threshold: 100,
        };
        assert!(settings.validate(100_000, 100_000).is_ok());

        match BackgroundModel::new(settings, 100_000, 100_000) {
            Err(ModelError::Allocation { bytes }) => {
                assert_eq!(bytes, 100_000 * 100_000 * 256 * 256 * 256 * 4);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("allocation unexpectedly succeeded"),
        }
    }
}
