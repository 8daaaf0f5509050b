//! Bounded frame queue.
//!
//! Decouples frame producers (capture) from consumers (analysis, disk
//! writer) running on separate threads. Each insertion picks an
//! admission policy that decides what happens when the queue is full.

mod bounded;

pub use bounded::{AdmissionPolicy, FrameQueue};
