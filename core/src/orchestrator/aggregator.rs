//! Streaming metrics aggregation

use std::time::{Duration, Instant};

use crate::message::ReportEvent;
use crate::metrics::{LatencyHistogram, RunSummary};
use crate::worker::WorkerStats;

/// Distinct error messages kept for the summary
pub const MAX_ERROR_SAMPLES: usize = 10;

/// Folds connection events into running statistics
///
/// All state is bounded: two HDR histograms, a handful of counters and at
/// most [`MAX_ERROR_SAMPLES`] error strings, regardless of run size. Events
/// may arrive in any order across workers.
#[derive(Debug)]
pub struct MetricsAggregator {
    started: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
    ended: Option<Instant>,
    established: Option<Duration>,

    handshake: LatencyHistogram,
    latency: LatencyHistogram,

    opened: u64,
    messages: u64,
    completed: u64,
    errors: u64,
    bytes_read: u64,
    bytes_written: u64,

    error_samples: Vec<String>,
}

impl MetricsAggregator {
    /// Create an aggregator; the run clock starts now
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: chrono::Utc::now(),
            ended: None,
            established: None,
            handshake: LatencyHistogram::new(),
            latency: LatencyHistogram::new(),
            opened: 0,
            messages: 0,
            completed: 0,
            errors: 0,
            bytes_read: 0,
            bytes_written: 0,
            error_samples: Vec::new(),
        }
    }

    /// Fold one report event
    pub fn record(&mut self, event: &ReportEvent) {
        match event {
            ReportEvent::Open { handshake } => self.on_handshake(*handshake),
            ReportEvent::Message { latency } => self.on_message(*latency),
            ReportEvent::Close {
                bytes_read,
                bytes_written,
            } => self.on_close(*bytes_read, *bytes_written),
            ReportEvent::Error { message } => self.on_error(message),
        }
    }

    /// A connection opened after `sample`
    pub fn on_handshake(&mut self, sample: Duration) {
        self.opened += 1;
        self.handshake.record(sample);
    }

    /// A reply arrived `sample` after the write
    pub fn on_message(&mut self, sample: Duration) {
        self.messages += 1;
        self.latency.record(sample);
    }

    /// A connection closed
    pub fn on_close(&mut self, bytes_read: u64, bytes_written: u64) {
        self.completed += 1;
        self.bytes_read += bytes_read;
        self.bytes_written += bytes_written;
    }

    /// A connection failed
    pub fn on_error(&mut self, message: &str) {
        self.errors += 1;
        if self.error_samples.len() < MAX_ERROR_SAMPLES
            && !self.error_samples.iter().any(|m| m == message)
        {
            self.error_samples.push(message.to_string());
        }
    }

    /// Every task has been dispatched and acknowledged; first call wins
    pub fn mark_established_phase_done(&mut self) -> bool {
        if self.established.is_some() {
            return false;
        }
        self.established = Some(self.started.elapsed());
        true
    }

    /// Stop the run clock; first call wins
    pub fn stop(&mut self) {
        if self.ended.is_none() {
            self.ended = Some(Instant::now());
        }
    }

    /// Elapsed run time, up to `stop` if it was called
    pub fn elapsed(&self) -> Duration {
        self.ended
            .map(|end| end.duration_since(self.started))
            .unwrap_or_else(|| self.started.elapsed())
    }

    /// Connections that reached a terminal state
    pub fn retired(&self) -> u64 {
        self.completed + self.errors
    }

    /// Build the summary from the current state
    pub fn summary(&self) -> RunSummary {
        let duration_secs = self.elapsed().as_secs_f64();
        let per_second = |count: u64| {
            if duration_secs > 0.0 {
                count as f64 / duration_secs
            } else {
                0.0
            }
        };
        let events = self.opened + self.messages + self.completed + self.errors;

        RunSummary {
            started_at: Some(self.started_at),
            opened: self.opened,
            messages: self.messages,
            completed: self.completed,
            errors: self.errors,
            bytes_read: self.bytes_read,
            bytes_written: self.bytes_written,
            handshake: self.handshake.percentiles(),
            latency: self.latency.percentiles(),
            established_secs: self.established.map(|d| d.as_secs_f64()),
            duration_secs,
            events_per_second: per_second(events),
            messages_per_second: per_second(self.messages),
            connections_per_second: per_second(self.retired()),
            error_samples: self.error_samples.clone(),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Totals across all workers
#[derive(Debug, Clone, Default)]
pub struct AggregatedStats {
    /// Number of workers that reported
    pub total_workers: usize,

    /// Merged counters
    pub totals: WorkerStats,

    /// Fewest tasks any worker received
    pub min_tasks: usize,

    /// Most tasks any worker received
    pub max_tasks: usize,

    /// Maximum duration across all workers
    pub total_duration: Duration,
}

/// Aggregate statistics from multiple workers
pub fn aggregate_worker_stats(stats: &[WorkerStats]) -> AggregatedStats {
    if stats.is_empty() {
        return AggregatedStats::default();
    }

    let mut totals = WorkerStats::default();
    for s in stats {
        totals.merge(s);
    }

    // Use the maximum elapsed time across all workers
    let total_duration = stats
        .iter()
        .filter_map(|s| s.elapsed())
        .max()
        .unwrap_or(Duration::ZERO);

    let min_tasks = stats.iter().map(|s| s.tasks_received).min().unwrap_or(0);
    let max_tasks = stats.iter().map(|s| s.tasks_received).max().unwrap_or(0);

    AggregatedStats {
        total_workers: stats.len(),
        totals,
        min_tasks,
        max_tasks,
        total_duration,
    }
}
