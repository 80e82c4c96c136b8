//! Builder pattern for Worker construction

use crate::config::Encoding;
use crate::error::{BenchError, BenchResult};
use crate::message::WorkerReport;
use crate::payload::PayloadCache;
use crate::traits::{ConnectOptions, PayloadGenerator, Transport};

use super::executor::Worker;

use std::sync::Arc;
use tokio::sync::mpsc;

/// Builder for creating Worker instances
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0)
///     .transport(transport)
///     .generator(generator)
///     .reports_tx(tx)
///     .encoding(Encoding::Binary)
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    transport: Option<Arc<dyn Transport>>,
    generator: Option<Arc<dyn PayloadGenerator>>,
    reports_tx: Option<mpsc::Sender<WorkerReport>>,
    encoding: Encoding,
    connect_options: ConnectOptions,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker ID
    pub fn new(id: usize) -> Self {
        Self {
            id,
            transport: None,
            generator: None,
            reports_tx: None,
            encoding: Encoding::default(),
            connect_options: ConnectOptions::default(),
        }
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the payload generator backing the worker's cache
    pub fn generator(mut self, generator: Arc<dyn PayloadGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the report channel sender
    pub fn reports_tx(mut self, tx: mpsc::Sender<WorkerReport>) -> Self {
        self.reports_tx = Some(tx);
        self
    }

    /// Set the payload encoding (defaults to text)
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the per-attempt connect options
    pub fn connect_options(mut self, options: ConnectOptions) -> Self {
        self.connect_options = options;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing.
    pub fn build(self) -> BenchResult<Worker> {
        let transport = self
            .transport
            .ok_or(BenchError::missing_config("transport"))?;
        let generator = self
            .generator
            .ok_or(BenchError::missing_config("generator"))?;
        let reports_tx = self
            .reports_tx
            .ok_or(BenchError::missing_config("reports_tx"))?;

        Ok(Worker::new(
            self.id,
            transport,
            PayloadCache::new(generator),
            reports_tx,
            self.encoding,
            self.connect_options,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchErrorKind;

    #[test]
    fn test_builder_missing_transport() {
        let (tx, _rx) = mpsc::channel(1);
        let result = WorkerBuilder::new(0).reports_tx(tx).build();

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind, BenchErrorKind::MissingConfig);
        assert!(err.message.contains("transport"));
    }

    #[test]
    fn test_builder_missing_reports_tx() {
        let result = WorkerBuilder::new(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let builder = WorkerBuilder::new(4);
        assert_eq!(builder.id, 4);
        assert_eq!(builder.encoding, Encoding::Text);
        assert!(builder.connect_options.connect_timeout.is_none());
    }
}
