//! Per-target admission control

use crate::task::ConnectionTask;

/// Maximum number of tasks the admission gate may let past `limit`
///
/// The control loop is the only code that touches `in_flight`, and every
/// release happens after the event that ends the counted phase, so the gate
/// is exact.
pub const CONCURRENCY_SLACK: usize = 0;

/// Lazily generates the tasks for one target and gates their dispatch
///
/// Tasks are created on demand by sequence number, so a queue for a large
/// amount holds no per-task memory until admission.
#[derive(Debug, Clone)]
pub struct BoundedTaskQueue {
    index: usize,
    target: String,
    total: usize,
    next_seq: usize,
    payload_size: usize,
    message_budget: usize,
    limit: usize,
    in_flight: usize,
}

impl BoundedTaskQueue {
    /// Create queue `index` of `total` tasks for `target`; `limit == 0` is unbounded
    pub fn new(
        index: usize,
        target: impl Into<String>,
        total: usize,
        payload_size: usize,
        message_budget: usize,
        limit: usize,
    ) -> Self {
        Self {
            index,
            target: target.into(),
            total,
            next_seq: 0,
            payload_size,
            message_budget,
            limit,
            in_flight: 0,
        }
    }

    /// Next task if the gate is open and tasks remain
    pub fn admit(&mut self) -> Option<ConnectionTask> {
        if self.is_drained() || !self.has_capacity() {
            return None;
        }
        let task = ConnectionTask::new(
            self.index,
            &self.target,
            self.next_seq,
            self.payload_size,
            self.message_budget,
        );
        self.next_seq += 1;
        self.in_flight += 1;
        Some(task)
    }

    /// Free one admission slot
    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Whether another task could be admitted right now
    pub fn has_capacity(&self) -> bool {
        self.limit == 0 || self.in_flight < self.limit + CONCURRENCY_SLACK
    }

    /// Whether every task has been generated
    pub fn is_drained(&self) -> bool {
        self.next_seq >= self.total
    }

    /// Whether the next `admit` would return a task
    pub fn is_ready(&self) -> bool {
        !self.is_drained() && self.has_capacity()
    }

    /// Target endpoint
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Tasks admitted so far
    pub fn dispatched(&self) -> usize {
        self.next_seq
    }

    /// Tasks not yet generated
    pub fn remaining(&self) -> usize {
        self.total - self.next_seq
    }

    /// Admitted tasks holding a slot
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Concurrency limit, 0 when unbounded
    pub fn limit(&self) -> usize {
        self.limit
    }
}
