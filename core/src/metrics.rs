//! Latency histograms and run summary types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Latency distribution of one event kind, in milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct LatencyPercentiles {
    /// Samples recorded
    pub count: u64,
    /// Fastest sample
    pub min: f64,
    /// Median
    pub p50: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// Slowest sample
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
}

/// Bounded-memory latency recorder backed by an HDR histogram
///
/// Samples are kept at microsecond resolution with three significant
/// digits. Anything slower than an hour lands in the top bucket.
pub struct LatencyHistogram {
    histogram: hdrhistogram::Histogram<u64>,
}

impl LatencyHistogram {
    const CEILING_MICROS: u64 = 60 * 60 * 1_000_000;

    /// Create an empty histogram
    pub fn new() -> Self {
        // Constant bounds: 1 <= low, high >= 2 * low, sigfig <= 5
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, Self::CEILING_MICROS, 3)
            .expect("constant histogram bounds");
        Self { histogram }
    }

    /// Record one sample
    pub fn record(&mut self, sample: Duration) {
        let micros = u64::try_from(sample.as_micros()).unwrap_or(u64::MAX);
        self.histogram
            .saturating_record(micros.clamp(1, Self::CEILING_MICROS));
    }

    /// Samples recorded so far
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Snapshot of the distribution
    pub fn percentiles(&self) -> LatencyPercentiles {
        let h = &self.histogram;
        if h.is_empty() {
            return LatencyPercentiles::default();
        }

        let ms = |micros: u64| micros as f64 / 1000.0;
        LatencyPercentiles {
            count: h.len(),
            min: ms(h.min()),
            p50: ms(h.value_at_quantile(0.50)),
            p95: ms(h.value_at_quantile(0.95)),
            p99: ms(h.value_at_quantile(0.99)),
            max: ms(h.max()),
            mean: h.mean() / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("len", &self.histogram.len())
            .finish()
    }
}

/// Summary of a run, produced by the metrics aggregator
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSummary {
    /// Wall clock start of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Connections that reported `open`
    pub opened: u64,
    /// Messages received across all connections
    pub messages: u64,
    /// Connections that ended with `close`
    pub completed: u64,
    /// Connections that ended with `error`
    pub errors: u64,

    /// Total bytes read by closed connections
    pub bytes_read: u64,
    /// Total bytes written by closed connections
    pub bytes_written: u64,

    /// Handshake duration percentiles (milliseconds)
    pub handshake: LatencyPercentiles,
    /// Message round trip percentiles (milliseconds)
    pub latency: LatencyPercentiles,

    /// Seconds until every task had been dispatched and acknowledged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub established_secs: Option<f64>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// All connection events per second
    pub events_per_second: f64,
    /// Messages received per second
    pub messages_per_second: f64,
    /// Retired connections (close + error) per second
    pub connections_per_second: f64,

    /// First few distinct error messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_samples: Vec<String>,
}

impl RunSummary {
    /// Connections that reached a terminal state
    pub fn retired(&self) -> u64 {
        self.completed + self.errors
    }

    /// Total bytes moved in either direction
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_read + self.bytes_written
    }

    /// Error rate over retired connections (0.0 - 1.0)
    pub fn error_rate(&self) -> f64 {
        let retired = self.retired();
        if retired == 0 {
            0.0
        } else {
            self.errors as f64 / retired as f64
        }
    }
}
