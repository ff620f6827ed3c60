//! Bounded most-recent-N buffer of decoded records.
//!
//! Append-then-trim only. Stored records are shared as `Arc`s and never
//! mutated in place, so a snapshot taken for one render stays valid.

use std::collections::VecDeque;
use std::sync::Arc;

use livesync_protocol::StreamRecord;

pub const DEFAULT_CAPACITY: usize = 50;
pub const MAX_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RecordBuffer {
    records: VecDeque<Arc<StreamRecord>>,
    capacity: usize,
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecordBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
        }
    }

    /// Append at the end, evicting from the front past capacity.
    /// Returns how many records were evicted.
    pub fn append(&mut self, record: StreamRecord) -> usize {
        self.records.push_back(Arc::new(record));
        let mut evicted = 0;
        while self.records.len() > self.capacity {
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Drop every record, returning the prior count.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full snapshot in storage (arrival) order.
    pub fn snapshot(&self) -> Vec<Arc<StreamRecord>> {
        self.records.iter().cloned().collect()
    }
}
