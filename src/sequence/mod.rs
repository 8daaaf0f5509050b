//! Frame sequence context and operator dispatch.
//!
//! The context holds the current frame, the output canvas and a bounded
//! history of previous outputs. A [`FilterChain`] runs the configured
//! operators against it in order, once per frame.

mod chain;
mod context;
mod filter;
mod history;

pub use chain::FilterChain;
pub use context::{SequenceContext, SequenceError};
pub use filter::{best_box, copy, derivative, difference, flow, grayscale, BoundingBox, Filter};
pub use history::ReferenceHistory;
