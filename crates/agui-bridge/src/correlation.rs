//! FIFO pairing of tool invocations with their results.
//!
//! Upstream invocations carry no id the client can see, so the bridge mints
//! its own and assumes results arrive in call order. Overlapping calls that
//! complete out of order will be mis-paired; the upstream offers nothing
//! better to correlate on.

use std::collections::VecDeque;

use agui_protocol::ToolCallId;

#[derive(Debug, Default)]
pub struct CorrelationQueue {
    pending: VecDeque<ToolCallId>,
}

impl CorrelationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: ToolCallId) {
        self.pending.push_back(id);
    }

    /// Pop the oldest outstanding id, or mint a fresh one when nothing is
    /// outstanding. A stray result never aborts the run.
    pub fn pop_oldest_or_new(&mut self) -> ToolCallId {
        self.pending.pop_front().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
