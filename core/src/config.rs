//! Run configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message body encoding requested from the payload generator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Valid UTF-8 text
    #[default]
    Text,
    /// Raw bytes
    Binary,
    /// Encoding understood only by a custom generator
    Custom(String),
}

impl Encoding {
    /// Whether payloads of this encoding should be framed as text
    pub fn is_text(&self) -> bool {
        matches!(self, Encoding::Text)
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Text => write!(f, "text"),
            Encoding::Binary => write!(f, "binary"),
            Encoding::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Err(ConfigError::InvalidEncoding("encoding name is empty".into())),
            "text" | "utf8" | "utf-8" => Ok(Encoding::Text),
            "binary" | "bin" => Ok(Encoding::Binary),
            other => Ok(Encoding::Custom(other.to_string())),
        }
    }
}

/// Event that frees a task's admission slot in its target queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRelease {
    /// Slot is freed once the connection reports `open` (or fails first).
    /// Bounds concurrent handshakes.
    #[default]
    OnOpen,
    /// Slot is freed when the connection reaches `close` or `error`.
    /// Bounds concurrently held connections.
    OnTerminal,
}

impl std::str::FromStr for AdmissionRelease {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "on_open" => Ok(AdmissionRelease::OnOpen),
            "terminal" | "close" | "on_terminal" => Ok(AdmissionRelease::OnTerminal),
            other => Err(ConfigError::InvalidAdmission(other.to_string())),
        }
    }
}

/// Run configuration
///
/// Plain data handed in by the command line layer. Validation happens
/// before any worker is spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Endpoints to connect to
    pub targets: Vec<String>,

    /// Connections to create per target
    pub connections_per_target: usize,

    /// Maximum in-flight connection attempts per target (0 = unbounded)
    pub concurrency_limit: usize,

    /// Message round trips per connection
    pub messages_per_connection: usize,

    /// Size in bytes of every message sent
    pub payload_size: usize,

    /// Payload encoding
    pub encoding: Encoding,

    /// Number of workers to spawn
    pub workers: usize,

    /// Transport identifier, resolved by the caller before the run starts
    pub transport: String,

    /// Payload generator identifier, resolved by the caller before the run starts
    pub generator: String,

    /// When an admission slot is freed
    pub admission_release: AdmissionRelease,

    /// Optional cap on connection attempts dispatched per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_rate: Option<f64>,

    /// Optional per-attempt open timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,

    /// Optional wall clock limit for the whole run in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            connections_per_target: 10_000,
            concurrency_limit: 0,
            messages_per_connection: 1,
            payload_size: 1024,
            encoding: Encoding::Text,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            transport: "ws".to_string(),
            generator: "static".to_string(),
            admission_release: AdmissionRelease::OnOpen,
            connect_rate: None,
            connect_timeout_ms: None,
            run_timeout_secs: None,
        }
    }
}

impl RunConfig {
    /// Create a config for the given targets with default settings
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the number of connections per target
    pub fn with_connections(mut self, amount: usize) -> Self {
        self.connections_per_target = amount;
        self
    }

    /// Set the per-target concurrency limit (0 = unbounded)
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Set the number of messages per connection
    pub fn with_messages(mut self, messages: usize) -> Self {
        self.messages_per_connection = messages;
        self
    }

    /// Set the payload size
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Set the payload encoding
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the admission release policy
    pub fn with_admission_release(mut self, release: AdmissionRelease) -> Self {
        self.admission_release = release;
        self
    }

    /// Cap dispatches per second
    pub fn with_connect_rate(mut self, rate: f64) -> Self {
        self.connect_rate = Some(rate);
        self
    }

    /// Set the per-attempt open timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the run timeout
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Per-attempt open timeout
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Run timeout
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Total number of connection tasks in the run
    pub fn total_connections(&self) -> usize {
        self.targets.len() * self.connections_per_target
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        if let Some(target) = self.targets.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidTarget(format!("{target:?}")));
        }

        if self.connections_per_target == 0 {
            return Err(ConfigError::InvalidAmount(
                "connections per target must be at least 1".into(),
            ));
        }

        if self.messages_per_connection == 0 {
            return Err(ConfigError::InvalidAmount(
                "messages per connection must be at least 1".into(),
            ));
        }

        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers(
                "worker count must be at least 1".into(),
            ));
        }

        if let Some(rate) = self.connect_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::InvalidRate(format!(
                    "connect rate must be positive, got {rate}"
                )));
            }
        }

        if self.connect_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "connect timeout must be non-zero".into(),
            ));
        }

        if self.run_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "run timeout must be non-zero".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No target endpoints were supplied
    #[error("no targets supplied")]
    NoTargets,

    /// A target string is unusable
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Connection or message amount out of range
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Worker count out of range
    #[error("invalid worker count: {0}")]
    InvalidWorkers(String),

    /// Connect rate out of range
    #[error("invalid connect rate: {0}")]
    InvalidRate(String),

    /// Timeout out of range
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Unknown encoding name
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Unknown admission release policy
    #[error("invalid admission release policy: {0}")]
    InvalidAdmission(String),
}
