//! Set of dispatched, not yet retired task ids

use crate::task::TaskId;

use std::collections::HashMap;
use std::time::Instant;

/// Liveness marker for one dispatched task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenEntry {
    /// Index of the owning queue
    pub queue: usize,
    /// Whether the open acknowledgment arrived
    pub acknowledged: bool,
    /// When the task was dispatched
    pub dispatched_at: Instant,
}

/// Tracks every task between dispatch and its terminal event
#[derive(Debug, Default)]
pub struct OpenSet {
    entries: HashMap<TaskId, OpenEntry>,
    unacknowledged: usize,
}

impl OpenSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` live; returns `false` if it already was
    pub fn insert(&mut self, id: TaskId, queue: usize, now: Instant) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(
            id,
            OpenEntry {
                queue,
                acknowledged: false,
                dispatched_at: now,
            },
        );
        self.unacknowledged += 1;
        true
    }

    /// Record the open acknowledgment
    ///
    /// Returns the entry the first time only; later or unknown ids give `None`.
    pub fn acknowledge(&mut self, id: &TaskId) -> Option<OpenEntry> {
        let entry = self.entries.get_mut(id)?;
        if entry.acknowledged {
            return None;
        }
        entry.acknowledged = true;
        self.unacknowledged -= 1;
        Some(*entry)
    }

    /// Clear `id`; returns the entry if it was live
    pub fn retire(&mut self, id: &TaskId) -> Option<OpenEntry> {
        let entry = self.entries.remove(id)?;
        if !entry.acknowledged {
            self.unacknowledged -= 1;
        }
        Some(entry)
    }

    /// Whether `id` is live
    pub fn contains(&self, id: &TaskId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of live ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no id is live
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live ids still waiting for their open acknowledgment
    pub fn unacknowledged(&self) -> usize {
        self.unacknowledged
    }
}
