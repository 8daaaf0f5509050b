//! Frame sequence state shared by the operators of one run.

use super::filter::{self, Filter};
use super::history::ReferenceHistory;
use crate::background::{BackgroundModel, TickPhase};
use crate::capture::{Frame, CHANNELS};
use thiserror::Error;

/// Errors raised while running operators on a frame.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// The frame does not match the dimensions the context was opened with.
    #[error("frame is {got_width}x{got_height}, sequence expects {width}x{height}")]
    DimensionMismatch {
        /// Context width.
        width: u32,
        /// Context height.
        height: u32,
        /// Width of the loaded frame.
        got_width: u32,
        /// Height of the loaded frame.
        got_height: u32,
    },
    /// The frame's buffer does not hold three samples per pixel.
    #[error("frame {sequence} has {len} samples, expected {expected}")]
    MalformedFrame {
        /// Sequence number of the rejected frame.
        sequence: u64,
        /// Samples in the buffer.
        len: usize,
        /// Samples the dimensions call for.
        expected: usize,
    },
    /// [`Filter::Bhatta`] ran on a context without a background model.
    #[error("bhatta filter selected but no background model was created")]
    MissingBackgroundModel,
}

/// Current frame, output canvas, reference history and operator state.
///
/// One context is owned by the analysis loop for the whole run; operators
/// only borrow it.
pub struct SequenceContext {
    input: Frame,
    output: Frame,
    references: ReferenceHistory,
    frame_index: u64,
    keep_history: bool,
    background: Option<BackgroundModel>,
}

impl SequenceContext {
    /// Creates a context for `width` x `height` frames.
    ///
    /// When `keep_history` is set each tick's output is recorded into a
    /// history of at most `reference_capacity` frames.
    pub fn new(width: u32, height: u32, reference_capacity: usize, keep_history: bool) -> Self {
        Self {
            input: Frame::zeros(width, height),
            output: Frame::zeros(width, height),
            references: ReferenceHistory::new(if keep_history { reference_capacity } else { 0 }),
            frame_index: 0,
            keep_history,
            background: None,
        }
    }

    /// Attaches the background model used by [`Filter::Bhatta`].
    pub fn with_background(mut self, model: BackgroundModel) -> Self {
        self.background = Some(model);
        self
    }

    /// Makes `frame` the current input.
    pub fn load(&mut self, frame: Frame) -> Result<(), SequenceError> {
        if !frame.same_dimensions(&self.input) {
            return Err(SequenceError::DimensionMismatch {
                width: self.input.width(),
                height: self.input.height(),
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        if !frame.is_valid() {
            return Err(SequenceError::MalformedFrame {
                sequence: frame.sequence(),
                len: frame.pixels().len(),
                expected: frame.pixel_count() * CHANNELS,
            });
        }
        self.output.set_sequence(frame.sequence());
        self.input = frame;
        Ok(())
    }

    /// Runs one operator against the current input, writing the output
    /// canvas. Returns the background model phase for [`Filter::Bhatta`].
    pub fn run_filter(&mut self, selected: Filter) -> Result<Option<TickPhase>, SequenceError> {
        let Self {
            input,
            output,
            references,
            frame_index,
            background,
            ..
        } = self;

        match selected {
            Filter::Copy => filter::copy(input, output),
            Filter::Grayscale => filter::grayscale(input, output),
            Filter::Derivative => filter::derivative(input, output),
            Filter::Difference => filter::difference(input, references.get(0), output),
            Filter::Flow => filter::flow(input, references.get(1), output),
            Filter::BestBox => {
                let found = filter::best_box(input, output);
                tracing::trace!(frame = *frame_index, bounds = ?found, "Best box");
            }
            Filter::Bhatta => {
                let model = background
                    .as_mut()
                    .ok_or(SequenceError::MissingBackgroundModel)?;
                return Ok(Some(model.tick(*frame_index, input, output)));
            }
        }
        Ok(None)
    }

    /// Finishes the tick: advances the frame counter and records the
    /// output into the reference history when history is kept.
    pub fn advance(&mut self) {
        self.frame_index += 1;
        if self.keep_history {
            self.references.record(&self.output);
        }
    }

    /// The current input frame.
    pub fn input(&self) -> &Frame {
        &self.input
    }

    /// The output canvas.
    pub fn output(&self) -> &Frame {
        &self.output
    }

    /// Previous outputs, newest first.
    pub fn references(&self) -> &ReferenceHistory {
        &self.references
    }

    /// Zero-based index of the frame being processed.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The background model, if Bhatta is selected.
    pub fn background(&self) -> Option<&BackgroundModel> {
        self.background.as_ref()
    }

    /// Releases operator state.
    pub fn close(self) {
        if let Some(model) = self.background {
            model.close();
        }
        tracing::debug!(frames = self.frame_index, "Sequence closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(value: f32, sequence: u64) -> Frame {
        Frame::new(vec![value; 4 * 4 * 3], 4, 4, sequence)
    }

    #[test]
    fn test_load_rejects_wrong_size() {
        let mut ctx = SequenceContext::new(4, 4, 2, false);
        assert!(matches!(
            ctx.load(Frame::zeros(5, 4)),
            Err(SequenceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_short_buffer() {
        let mut ctx = SequenceContext::new(4, 4, 2, false);
        let result = ctx.load(Frame::new(vec![0.0; 10], 4, 4, 7));
        match result {
            Err(SequenceError::MalformedFrame {
                sequence,
                len,
                expected,
            }) => {
                assert_eq!(sequence, 7);
                assert_eq!(len, 10);
                assert_eq!(expected, 48);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(ctx.input().is_valid());
    }

    #[test]
    fn test_history_only_when_kept() {
        let mut ctx = SequenceContext::new(4, 4, 2, false);
        ctx.load(filled(1.0, 0)).unwrap();
        ctx.run_filter(Filter::Copy).unwrap();
        ctx.advance();

        assert_eq!(ctx.frame_index(), 1);
        assert!(ctx.references().is_empty());
    }

    #[test]
    fn test_difference_uses_previous_output() {
        let mut ctx = SequenceContext::new(4, 4, 2, true);

        ctx.load(filled(10.0, 0)).unwrap();
        ctx.run_filter(Filter::Difference).unwrap();
        assert!(ctx.output().pixels().iter().all(|&v| v == 0.0));
        ctx.advance();

        // Previous output was all zero.
        ctx.load(filled(30.0, 1)).unwrap();
        ctx.run_filter(Filter::Difference).unwrap();
        assert!(ctx.output().pixels().iter().all(|&v| v == 30.0));
        ctx.advance();

        assert_eq!(ctx.references().len(), 2);
    }

    #[test]
    fn test_flow_needs_two_references() {
        let mut ctx = SequenceContext::new(4, 4, 2, true);
        for i in 0..2 {
            ctx.load(filled(50.0, i)).unwrap();
            ctx.run_filter(Filter::Copy).unwrap();
            ctx.run_filter(Filter::Flow).unwrap();
            assert!(ctx.output().pixels().iter().all(|&v| v == 0.0));
            ctx.advance();
        }

        ctx.load(filled(50.0, 2)).unwrap();
        ctx.run_filter(Filter::Flow).unwrap();
        // Both references are all-zero flow outputs; interior is non-zero.
        assert!(ctx.output().sample(1, 1, 0) > 0.0);
    }

    #[test]
    fn test_later_filter_overwrites_earlier() {
        let mut ctx = SequenceContext::new(4, 4, 2, false);
        ctx.load(filled(200.0, 0)).unwrap();
        ctx.run_filter(Filter::Copy).unwrap();
        ctx.run_filter(Filter::Derivative).unwrap();
        assert!(ctx.output().pixels().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_bhatta_without_model_errors() {
        let mut ctx = SequenceContext::new(4, 4, 2, false);
        ctx.load(filled(1.0, 0)).unwrap();
        assert!(matches!(
            ctx.run_filter(Filter::Bhatta),
            Err(SequenceError::MissingBackgroundModel)
        ));
    }
}
