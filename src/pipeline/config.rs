//! Tick loop configuration.

use crate::capture::ConfigError;
use crate::queue::AdmissionPolicy;
use crate::sequence::Filter;
use serde::{Deserialize, Serialize};

/// Configuration of the per-frame loop and its queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Operators run on every frame, in order.
    pub filters: Vec<Filter>,
    /// Number of previous outputs kept for temporal operators.
    pub reference_frames: usize,
    /// Stop after this many frames (0 for no limit).
    pub frame_limit: u64,
    /// Frames buffered between the capture thread and the loop.
    pub capture_queue_capacity: usize,
    /// How captured frames enter a full capture queue.
    pub capture_policy: AdmissionPolicy,
    /// Frames buffered between the loop and the writer thread.
    pub writer_queue_capacity: usize,
    /// How output frames enter a full writer queue.
    pub writer_policy: AdmissionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filters: vec![Filter::Copy],
            reference_frames: 2,
            frame_limit: 500,
            capture_queue_capacity: 4,
            capture_policy: AdmissionPolicy::Push,
            writer_queue_capacity: 4,
            writer_policy: AdmissionPolicy::Push,
        }
    }
}

impl PipelineConfig {
    /// Checks the filter list, queue capacities and reference depth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filters.is_empty() {
            return Err(ConfigError::EmptyFilterList);
        }
        if self.capture_queue_capacity == 0 || self.writer_queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        for filter in &self.filters {
            let required = filter.required_references();
            if required > self.reference_frames {
                return Err(ConfigError::InsufficientReferences {
                    filter: filter.name(),
                    required,
                    configured: self.reference_frames,
                });
            }
        }
        Ok(())
    }

    /// True once `processed` frames reach the configured limit.
    pub fn limit_reached(&self, processed: u64) -> bool {
        self.frame_limit != 0 && processed >= self.frame_limit
    }
}
