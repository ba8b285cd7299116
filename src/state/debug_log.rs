use crate::types::AgentDebugPayload;
use std::collections::VecDeque;

pub const DEFAULT_DEBUG_LOG_CAPACITY: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct DebugEntry {
    pub ts: i64,
    pub payload: AgentDebugPayload,
}

/// Bounded log of agent debug events; only the newest `capacity` are kept.
#[derive(Debug, Clone)]
pub struct DebugLog {
    entries: VecDeque<DebugEntry>,
    capacity: usize,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUG_LOG_CAPACITY)
    }
}

impl DebugLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_DEBUG_LOG_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: DebugEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Oldest retained entry first.
    pub fn iter(&self) -> impl Iterator<Item = &DebugEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
