//! Ordered operator dispatch.

use super::context::{SequenceContext, SequenceError};
use super::filter::Filter;
use crate::background::{BackgroundModel, BhattaSettings, ModelError, TickPhase};

/// Ordered list of operators run against a [`SequenceContext`] each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    /// Chain running `filters` in order.
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Selected operators, in run order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// True if any operator reads the reference history.
    pub fn needs_history(&self) -> bool {
        self.required_references() > 0
    }

    /// Largest reference depth any operator reads.
    pub fn required_references(&self) -> usize {
        self.filters
            .iter()
            .map(|f| f.required_references())
            .max()
            .unwrap_or(0)
    }

    /// True if `filter` is selected.
    pub fn contains(&self, filter: Filter) -> bool {
        self.filters.contains(&filter)
    }

    /// Creates the sequence context and any stateful operators.
    pub fn open(
        &self,
        width: u32,
        height: u32,
        reference_capacity: usize,
        bhatta: &BhattaSettings,
    ) -> Result<SequenceContext, ModelError> {
        let ctx = SequenceContext::new(width, height, reference_capacity, self.needs_history());
        let ctx = if self.contains(Filter::Bhatta) {
            ctx.with_background(BackgroundModel::new(bhatta.clone(), width, height)?)
        } else {
            ctx
        };

        tracing::info!(
            filters = ?self.filters,
            history = self.needs_history(),
            "Filter chain opened"
        );
        Ok(ctx)
    }

    /// Runs every operator in order on the loaded frame.
    ///
    /// Operators share one output canvas; each overwrites it entirely.
    /// Returns the background model phase if [`Filter::Bhatta`] ran.
    pub fn apply(&self, ctx: &mut SequenceContext) -> Result<Option<TickPhase>, SequenceError> {
        let mut phase = None;
        for &filter in &self.filters {
            tracing::trace!(frame = ctx.frame_index(), %filter, "Running filter");
            if let Some(p) = ctx.run_filter(filter)? {
                phase = Some(p);
            }
        }
        Ok(phase)
    }

    /// Tears down the context and its stateful operators.
    pub fn close(&self, ctx: SequenceContext) {
        ctx.close();
        tracing::info!("Filter chain closed");
    }
}
