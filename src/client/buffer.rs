//! Bounded, timestamp-ordered snapshot history

use std::collections::VecDeque;

use crate::ws::protocol::PlayerMap;

/// One received `state_update`
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Server send time, unix millis
    pub timestamp: u64,
    pub players: PlayerMap,
}

/// Buffered snapshot history for interpolation
#[derive(Debug)]
pub struct SnapshotBuffer {
    history: VecDeque<Snapshot>,
    max: usize,
}

impl SnapshotBuffer {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            history: VecDeque::with_capacity(max),
            max,
        }
    }

    /// Insert in timestamp order, then evict the oldest beyond capacity.
    ///
    /// A snapshot that arrives late lands after any entries with an equal
    /// timestamp. When the buffer is full and the snapshot is older than
    /// everything retained it is discarded and `false` is returned.
    pub fn push(&mut self, snap: Snapshot) -> bool {
        let pos = self
            .history
            .partition_point(|s| s.timestamp <= snap.timestamp);

        if pos == 0 && self.history.len() >= self.max {
            return false;
        }

        self.history.insert(pos, snap);
        while self.history.len() > self.max {
            self.history.pop_front();
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.history.get(index)
    }

    /// Oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + ExactSizeIterator {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.history.back()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(20)
    }
}
