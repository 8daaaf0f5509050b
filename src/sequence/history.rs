//! Bounded history of previous output frames.

use crate::capture::Frame;
use std::collections::VecDeque;

/// Ring of previously produced output frames, newest first.
///
/// Index 0 is the output of the previous tick, index 1 the one before,
/// and so on. Once `capacity` frames are held the oldest is evicted and
/// its buffer reused for the incoming frame.
#[derive(Debug)]
pub struct ReferenceHistory {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl ReferenceHistory {
    /// Empty history keeping at most `capacity` references.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a copy of `frame` as the newest reference.
    pub fn record(&mut self, frame: &Frame) {
        if self.capacity == 0 {
            return;
        }
        let slot = if self.frames.len() >= self.capacity {
            self.frames.pop_back().map(|mut oldest| {
                oldest.copy_from(frame);
                oldest.set_sequence(frame.sequence());
                oldest
            })
        } else {
            None
        };
        self.frames.push_front(slot.unwrap_or_else(|| frame.clone()));
    }

    /// Reference `index` steps back (0 = most recent).
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// References currently held.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True before the first output is recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Most references kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets every reference.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
