//! Capability traits for transports and payload generators
//!
//! These traits are defined in core so the worker can drive any
//! implementation. Concrete transports live in `thunder-transports`,
//! concrete generators in `thunder-payloads`.

use crate::config::Encoding;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Transport
// ============================================================================

/// Opens connections of one protocol flavour
///
/// `open` must be called from within a tokio runtime; implementations spawn
/// whatever I/O task they need and report progress through the sink.
///
/// Every attempt must honour the event contract:
/// - the first event is exactly one of [`TransportEvent::Open`] or [`TransportEvent::Error`]
/// - [`TransportEvent::Message`] only follows `Open`
/// - [`TransportEvent::Close`] is sent at most once and nothing follows it
pub trait Transport: Send + Sync {
    /// Transport identifier (e.g., "tcp", "ws")
    fn name(&self) -> &str;

    /// Start a connection attempt to `target`
    fn open(
        &self,
        target: &str,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Box<dyn TransportConnection>;
}

/// Worker-side handle to one connection attempt
pub trait TransportConnection: Send {
    /// Queue a payload for writing
    fn send(&mut self, payload: &Payload);

    /// Request the connection to close; a `Close` event follows
    fn close(&mut self);

    /// Bytes read so far
    fn bytes_read(&self) -> u64;

    /// Bytes written so far
    fn bytes_written(&self) -> u64;
}

/// Options applied to every connection attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Abort the attempt with an error if it has not opened in time
    pub connect_timeout: Option<Duration>,
}

/// Worker-local key identifying one connection's event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey(pub u64);

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Event emitted by a transport for one connection
#[derive(Debug)]
pub enum TransportEvent {
    /// Connection established
    Open,
    /// One inbound message received
    Message,
    /// Connection failed
    Error(TransportError),
    /// Connection closed
    Close,
}

/// Channel end a transport uses to publish the events of one connection
#[derive(Debug, Clone)]
pub struct EventSink {
    key: ConnectionKey,
    tx: mpsc::UnboundedSender<(ConnectionKey, TransportEvent)>,
}

impl EventSink {
    /// Create a sink tagging every event with `key`
    pub fn new(key: ConnectionKey, tx: mpsc::UnboundedSender<(ConnectionKey, TransportEvent)>) -> Self {
        Self { key, tx }
    }

    /// Key of the connection this sink belongs to
    pub fn key(&self) -> ConnectionKey {
        self.key
    }

    /// Publish an event; returns `false` once the worker is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.key, event)).is_ok()
    }
}

/// Transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Target string could not be understood
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Connection attempt failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Connection attempt exceeded the connect timeout
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Socket I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation or library error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Inbound frame larger than the accepted maximum
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    /// Attempt closed before it could open
    #[error("connection aborted before open")]
    Aborted,
}

// ============================================================================
// Payload generator
// ============================================================================

/// An immutable message body
///
/// Cloning is a reference count bump; the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Message bytes
    pub data: Bytes,

    /// Whether the bytes are UTF-8 text meant for text framing
    pub is_text: bool,
}

impl Payload {
    /// Text payload; caller guarantees `data` is valid UTF-8
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_text: true,
        }
    }

    /// Binary payload
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_text: false,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Produces message bodies of a requested size and encoding
///
/// Generation must be deterministic: equal arguments produce equal bytes.
/// Callers cache results through [`crate::payload::PayloadCache`].
pub trait PayloadGenerator: Send + Sync {
    /// Generator name for identification
    fn name(&self) -> &str;

    /// Build a payload of exactly `size` bytes
    fn generate(&self, size: usize, encoding: &Encoding) -> Result<Payload, PayloadError>;
}

/// Payload generation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The generator does not know the encoding
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Generator-specific failure
    #[error("payload generation failed: {0}")]
    Generation(String),
}
