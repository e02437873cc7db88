use std::collections::VecDeque;
use std::sync::Arc;

use callfeed_core::CallEvent;

/// Fixed-capacity call history, newest first.
///
/// Not synchronised on its own; `CallLog` owns it behind a lock and is the
/// only writer.
pub struct HistoryRing {
    entries: VecDeque<Arc<CallEvent>>,
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend `event`, evicting the oldest entry once full.
    pub fn push(&mut self, event: Arc<CallEvent>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(event);
    }

    /// The first `min(limit, len)` entries, newest first. Clamping `limit`
    /// to a sensible range is the caller's job.
    pub fn recent(&self, limit: usize) -> Vec<Arc<CallEvent>> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
