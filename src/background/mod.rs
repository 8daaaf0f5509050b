//! Histogram background subtraction.
//!
//! Builds a per-pixel colour histogram model of a static scene over a
//! fixed warm-up window, then scores each new frame's local patch
//! histograms against it to produce a foreground mask.

mod histogram;
mod model;
mod settings;

pub use histogram::{reflect, similarity, BinMapper, Histogram};
pub use model::{BackgroundModel, ModelError, TickPhase};
pub use settings::BhattaSettings;
