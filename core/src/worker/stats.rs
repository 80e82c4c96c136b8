//! Worker statistics tracking

use std::time::Instant;

/// Statistics tracked by each worker
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Worker identifier
    pub worker_id: usize,

    /// Tasks received from the orchestrator
    pub tasks_received: usize,

    /// Connections that reached `open`
    pub opened: usize,

    /// Messages received
    pub messages: usize,

    /// Connections that ended with `close`
    pub closed: usize,

    /// Connections that ended with `error`
    pub errors: usize,

    /// Bytes read by closed connections
    pub bytes_read: u64,

    /// Bytes written by closed connections
    pub bytes_written: u64,

    /// Peak number of simultaneously held connections
    pub peak_concurrent: usize,

    /// Worker start time
    pub started_at: Option<Instant>,

    /// Worker end time
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Connections that reached a terminal state
    pub fn retired(&self) -> usize {
        self.closed + self.errors
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Record a newly accepted task and the resulting concurrency
    pub fn record_task(&mut self, concurrent: usize) {
        self.tasks_received += 1;
        self.peak_concurrent = self.peak_concurrent.max(concurrent);
    }

    /// Record a closed connection
    pub fn record_close(&mut self, bytes_read: u64, bytes_written: u64) {
        self.closed += 1;
        self.bytes_read += bytes_read;
        self.bytes_written += bytes_written;
    }

    /// Record a failed connection
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Merge stats from another worker
    pub fn merge(&mut self, other: &WorkerStats) {
        self.tasks_received += other.tasks_received;
        self.opened += other.opened;
        self.messages += other.messages;
        self.closed += other.closed;
        self.errors += other.errors;
        self.bytes_read += other.bytes_read;
        self.bytes_written += other.bytes_written;
        self.peak_concurrent = self.peak_concurrent.max(other.peak_concurrent);
    }
}
