//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::channel::ChannelConfig;
use crate::config::{AdmissionRelease, Encoding, RunConfig};
use crate::error::{BenchError, BenchResult};
use crate::traits::{PayloadGenerator, Transport};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .targets(["ws://localhost:8080"])
///     .connections(1000)
///     .concurrency_limit(100)
///     .transport(transport)
///     .generator(generator)
///     .build()?;
///
/// let result = orchestrator.run_with_signal_handling().await?;
/// ```
pub struct OrchestratorBuilder {
    config: RunConfig,
    transport: Option<Arc<dyn Transport>>,
    generator: Option<Arc<dyn PayloadGenerator>>,
    channel_config: ChannelConfig,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            transport: None,
            generator: None,
            channel_config: ChannelConfig::default(),
        }
    }

    /// Set the full run configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the targets
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the number of connections per target
    pub fn connections(mut self, amount: usize) -> Self {
        self.config.connections_per_target = amount;
        self
    }

    /// Set the per-target concurrency limit (0 = unbounded)
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Set the number of message round trips per connection
    pub fn messages(mut self, messages: usize) -> Self {
        self.config.messages_per_connection = messages;
        self
    }

    /// Set the payload size
    pub fn payload_size(mut self, size: usize) -> Self {
        self.config.payload_size = size;
        self
    }

    /// Set the payload encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Set the number of workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set when admission slots are freed
    pub fn admission_release(mut self, release: AdmissionRelease) -> Self {
        self.config.admission_release = release;
        self
    }

    /// Set the connect rate limit (dispatches per second)
    pub fn connect_rate(mut self, rate: Option<f64>) -> Self {
        self.config.connect_rate = rate;
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the payload generator
    pub fn generator(mut self, generator: Arc<dyn PayloadGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the channel configuration
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if transport or generator are not set, or if
    /// configuration validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let transport = self
            .transport
            .ok_or_else(|| BenchError::missing_config("transport"))?;

        let generator = self
            .generator
            .ok_or_else(|| BenchError::missing_config("generator"))?;

        self.config.validate()?;

        Ok(Orchestrator::new(
            self.config,
            transport,
            generator,
            self.channel_config,
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
