//! Plain TCP transports
//!
//! Two framings over the same socket:
//!
//! - [`Framing::Raw`]: every successful read is one message
//! - [`Framing::LengthPrefixed`]: each message carries a 4-byte big-endian
//!   length header; each complete inbound frame is one message

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use thunder_core::{
    ConnectOptions, EventSink, Payload, Transport, TransportConnection, TransportError,
};

use crate::driver::{spawn_link, Session, SessionReader, SessionWriter};

/// Largest inbound frame accepted by the length-prefixed framing (16 MiB).
///
/// Frames this large are read while our own writes are still in flight, so
/// an echoing peer never waits on us to finish sending.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length header.
const HEADER_LEN: usize = 4;

/// Read buffer size for raw sockets.
const READ_CHUNK: usize = 8 * 1024;

/// How messages are delimited on the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No framing; reads are reported as they arrive
    Raw,
    /// 4-byte big-endian length prefix per message
    LengthPrefixed,
}

/// TCP transport with a configurable framing.
#[derive(Debug, Clone, Copy)]
pub struct SocketTransport {
    framing: Framing,
}

impl SocketTransport {
    /// Create a transport using `framing`.
    pub fn new(framing: Framing) -> Self {
        Self { framing }
    }

    /// Unframed transport.
    pub fn raw() -> Self {
        Self::new(Framing::Raw)
    }

    /// Length-prefixed transport.
    pub fn framed() -> Self {
        Self::new(Framing::LengthPrefixed)
    }

    /// The framing in use.
    pub fn framing(&self) -> Framing {
        self.framing
    }
}

impl Transport for SocketTransport {
    fn name(&self) -> &str {
        match self.framing {
            Framing::Raw => "tcp",
            Framing::LengthPrefixed => "framed",
        }
    }

    fn open(
        &self,
        target: &str,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Box<dyn TransportConnection> {
        let span = tracing::debug_span!(
            "socket",
            endpoint = %target,
            conn = %events.key(),
            framing = self.name()
        );
        let addr = socket_addr(target).map(str::to_string);
        let framing = self.framing;

        spawn_link(
            async move {
                let addr = addr?;
                let stream = TcpStream::connect(&addr)
                    .await
                    .map_err(|e| TransportError::Connect(e.to_string()))?;
                stream.set_nodelay(true)?;
                Ok::<_, TransportError>(SocketSession::new(stream, framing))
            },
            options,
            events,
            span,
        )
    }
}

/// Strip an optional scheme and check the target looks like `host:port`.
pub fn socket_addr(target: &str) -> Result<&str, TransportError> {
    let addr = target
        .trim()
        .trim_start_matches("tcp://")
        .trim_start_matches("framed://")
        .trim_end_matches('/');

    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(addr),
        _ => Err(TransportError::InvalidTarget(target.to_string())),
    }
}

/// Pop one complete frame off `buf`, returning its wire size.
fn take_frame(buf: &mut BytesMut) -> Result<Option<usize>, TransportError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&buf[..HEADER_LEN]);
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(len));
    }

    let total = HEADER_LEN + len;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }
    buf.advance(total);
    Ok(Some(total))
}

struct SocketSession {
    stream: TcpStream,
    framing: Framing,
}

impl SocketSession {
    fn new(stream: TcpStream, framing: Framing) -> Self {
        Self { stream, framing }
    }
}

impl Session for SocketSession {
    type Reader = SocketReader;
    type Writer = SocketWriter;

    fn split(self) -> (SocketReader, SocketWriter) {
        let (read, write) = self.stream.into_split();
        let reader = SocketReader {
            read,
            framing: self.framing,
            buf: BytesMut::with_capacity(READ_CHUNK),
        };
        let writer = SocketWriter {
            write,
            framing: self.framing,
        };
        (reader, writer)
    }
}

struct SocketReader {
    read: OwnedReadHalf,
    framing: Framing,
    buf: BytesMut,
}

impl SocketReader {
    async fn recv_raw(&mut self) -> Option<Result<usize, TransportError>> {
        self.buf.clear();
        self.buf.reserve(READ_CHUNK);
        match self.read.read_buf(&mut self.buf).await {
            Ok(0) => None,
            Ok(n) => Some(Ok(n)),
            Err(e) => Some(Err(e.into())),
        }
    }

    async fn recv_frame(&mut self) -> Option<Result<usize, TransportError>> {
        loop {
            match take_frame(&mut self.buf) {
                Ok(Some(size)) => return Some(Ok(size)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }

            if self.buf.capacity() == self.buf.len() {
                self.buf.reserve(READ_CHUNK);
            }
            match self.read.read_buf(&mut self.buf).await {
                Ok(0) if self.buf.is_empty() => return None,
                Ok(0) => {
                    return Some(Err(TransportError::Protocol(format!(
                        "peer closed with {} bytes of a partial frame",
                        self.buf.len()
                    ))))
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

impl SessionReader for SocketReader {
    async fn recv(&mut self) -> Option<Result<usize, TransportError>> {
        match self.framing {
            Framing::Raw => self.recv_raw().await,
            Framing::LengthPrefixed => self.recv_frame().await,
        }
    }
}

struct SocketWriter {
    write: OwnedWriteHalf,
    framing: Framing,
}

impl SessionWriter for SocketWriter {
    async fn send(&mut self, payload: &Payload) -> Result<usize, TransportError> {
        match self.framing {
            Framing::Raw => {
                self.write.write_all(&payload.data).await?;
                Ok(payload.len())
            }
            Framing::LengthPrefixed => {
                let len = u32::try_from(payload.len())
                    .map_err(|_| TransportError::FrameTooLarge(payload.len()))?;
                let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
                frame.put_u32(len);
                frame.put_slice(&payload.data);
                self.write.write_all(&frame).await?;
                Ok(frame.len())
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.write.shutdown().await {
            tracing::debug!(error = %e, "socket shutdown failed");
        }
    }
}
