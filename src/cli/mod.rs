//! CLI argument parsing and run dispatch

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use thunder_core::{OrchestratorBuilder, PayloadGenerator, RunConfig};
use thunder_payloads::{create_generator, GeneratorKind, PatternGenerator};
use thunder_transports::{create_transport, TransportKind};

/// thunder - persistent connection load generator
#[derive(Parser, Debug)]
#[command(name = "thunder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Endpoints to connect to (e.g. ws://localhost:8080, tcp://10.0.0.1:9000)
    pub targets: Vec<String>,

    /// Persistent connections to create per target [default: 10000]
    #[arg(short = 'A', long)]
    pub amount: Option<usize>,

    /// Maximum in-flight connection attempts per target, 0 for no limit [default: 0]
    #[arg(short = 'C', long)]
    pub concurrent: Option<usize>,

    /// Messages to exchange per connection [default: 1]
    #[arg(short = 'M', long)]
    pub messages: Option<usize>,

    /// Size of each message in bytes [default: 1024]
    #[arg(short = 'B', long)]
    pub buffer: Option<usize>,

    /// Number of workers [default: available parallelism]
    #[arg(short = 'W', long)]
    pub workers: Option<usize>,

    /// Payload generator (static, pattern) [default: static]
    #[arg(short = 'G', long)]
    pub generator: Option<String>,

    /// Pattern repeated by the pattern generator
    #[arg(long)]
    pub pattern: Option<String>,

    /// Transport protocol (tcp, framed, ws) [default: ws]
    #[arg(short = 'P', long)]
    pub protocol: Option<String>,

    /// Payload encoding (text, binary) [default: text]
    #[arg(long)]
    pub encoding: Option<String>,

    /// When a concurrency slot is freed (open, terminal) [default: open]
    #[arg(long)]
    pub release_on: Option<String>,

    /// Maximum connection attempts dispatched per second
    #[arg(long)]
    pub connect_rate: Option<f64>,

    /// Abort connection attempts that have not opened within this many milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Stop the run after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// JSON run configuration; flags override its values
    #[arg(long, env = "THUNDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run the load test described by the arguments
    pub async fn run(&self) -> Result<()> {
        let config = self.run_config()?;
        config.validate().context("invalid run configuration")?;

        let transport_kind: TransportKind = config.transport.parse()?;
        let generator = self.generator(&config)?;
        let transport = create_transport(transport_kind);

        output::print_banner(&config, transport_kind, generator.name());

        let orchestrator = OrchestratorBuilder::new()
            .config(config.clone())
            .transport(transport)
            .generator(generator)
            .build()?;

        let result = orchestrator.run_with_signal_handling().await?;
        output::print_summary(&result);

        if let Some(path) = &self.json {
            output::write_json(path, &config, &result)
                .with_context(|| format!("failed to write summary to {}", path.display()))?;
            println!("Summary written to {}", path.display());
        }

        Ok(())
    }

    /// Merge the optional config file with command line overrides
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str::<RunConfig>(&text)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => RunConfig::default(),
        };

        if !self.targets.is_empty() {
            config.targets = self.targets.clone();
        }
        if let Some(amount) = self.amount {
            config.connections_per_target = amount;
        }
        if let Some(limit) = self.concurrent {
            config.concurrency_limit = limit;
        }
        if let Some(messages) = self.messages {
            config.messages_per_connection = messages;
        }
        if let Some(size) = self.buffer {
            config.payload_size = size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(generator) = &self.generator {
            config.generator = generator.clone();
        }
        if let Some(protocol) = &self.protocol {
            config.transport = protocol.clone();
        }
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.parse()?;
        }
        if let Some(release) = &self.release_on {
            config.admission_release = release.parse()?;
        }
        if self.connect_rate.is_some() {
            config.connect_rate = self.connect_rate;
        }
        if self.connect_timeout_ms.is_some() {
            config.connect_timeout_ms = self.connect_timeout_ms;
        }
        if self.timeout_secs.is_some() {
            config.run_timeout_secs = self.timeout_secs;
        }

        Ok(config)
    }

    fn generator(&self, config: &RunConfig) -> Result<Arc<dyn PayloadGenerator>> {
        let kind: GeneratorKind = config.generator.parse()?;
        match (kind, &self.pattern) {
            (GeneratorKind::Pattern, Some(pattern)) => Ok(Arc::new(PatternGenerator::new(pattern)?)),
            (_, Some(_)) => {
                tracing::warn!(generator = kind.id(), "--pattern ignored for this generator");
                Ok(create_generator(kind))
            }
            (_, None) => Ok(create_generator(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thunder_core::{AdmissionRelease, Encoding};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("thunder").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "-A", "50", "-C", "5", "-M", "3", "-B", "64", "-W", "2", "-P", "tcp",
            "--encoding", "binary", "--release-on", "terminal", "--connect-rate", "20",
            "tcp://127.0.0.1:9000",
        ]);
        let config = cli.run_config().unwrap();

        assert_eq!(config.targets, vec!["tcp://127.0.0.1:9000".to_string()]);
        assert_eq!(config.connections_per_target, 50);
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.messages_per_connection, 3);
        assert_eq!(config.payload_size, 64);
        assert_eq!(config.workers, 2);
        assert_eq!(config.transport, "tcp");
        assert_eq!(config.encoding, Encoding::Binary);
        assert_eq!(config.admission_release, AdmissionRelease::OnTerminal);
        assert_eq!(config.connect_rate, Some(20.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = parse(&["ws://h:1"]).run_config().unwrap();
        let defaults = RunConfig::default();

        assert_eq!(config.connections_per_target, defaults.connections_per_target);
        assert_eq!(config.transport, "ws");
        assert_eq!(config.generator, "static");
        assert!(config.run_timeout_secs.is_none());
    }

    #[test]
    fn test_invalid_release_policy_is_rejected() {
        let cli = parse(&["--release-on", "never", "ws://h:1"]);
        assert!(cli.run_config().is_err());
    }

    #[test]
    fn test_pattern_generator_selection() {
        let cli = parse(&["-G", "pattern", "--pattern", "xy", "ws://h:1"]);
        let config = cli.run_config().unwrap();
        let generator = cli.generator(&config).unwrap();

        let payload = generator.generate(5, &Encoding::Binary).unwrap();
        assert_eq!(generator.name(), "pattern");
        assert_eq!(&payload.data[..], b"xyxyx");
    }

    #[test]
    fn test_unknown_generator_is_rejected() {
        let cli = parse(&["-G", "random", "ws://h:1"]);
        let config = cli.run_config().unwrap();
        assert!(cli.generator(&config).is_err());
    }

    /// Shared buffer the test subscriber writes formatted events into
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_start_is_logged_once() {
        // Bind then drop so the port refuses; the run still completes
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let target = format!("tcp://{addr}");
        let cli = parse(&["-A", "1", "-W", "1", "-P", "tcp", target.as_str()]);
        cli.run().await.unwrap();

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("Starting run").count(), 1, "{text}");
    }
}
