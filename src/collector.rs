//! Collector
//!
//! Bounded FIFO buffer of pending record lines, filled by the external
//! ingestion pipeline and drained by the REST surface.
//!
//! ## Concurrency
//! Not thread-safe. The server keeps exactly one instance behind an
//! `Rc<RefCell<_>>` that is only touched from scheduler-driven task steps,
//! so no lock is needed.

use std::collections::VecDeque;

/// Pending record lines awaiting persistence
#[derive(Debug, Clone)]
pub struct Collector {
    /// Number of entries at which the collector counts as full
    target: usize,

    /// Entries in arrival order
    entries: VecDeque<String>,
}

impl Collector {
    /// Create an empty collector that is full at `target` entries
    pub fn new(target: usize) -> Self {
        Self {
            target,
            entries: VecDeque::with_capacity(target),
        }
    }

    /// Store an entry unless it is already pending or the buffer is full
    ///
    /// Returns `true` if the entry was stored.
    pub fn collect(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if self.is_full() || self.entries.contains(&entry) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    /// Remove and return the oldest entry
    pub fn get_one_entry(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    /// Put an entry taken by [`get_one_entry`](Self::get_one_entry) back at the front
    pub fn requeue(&mut self, entry: impl Into<String>) {
        self.entries.push_front(entry.into());
    }

    /// Remove and return every pending entry, oldest first
    pub fn drain_all(&mut self) -> Vec<String> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over pending entries without draining them
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the configured target count has been reached
    pub fn is_full(&self) -> bool {
        self.entries.len() == self.target
    }

    pub fn target(&self) -> usize {
        self.target
    }
}
