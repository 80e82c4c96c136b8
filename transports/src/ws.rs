//! WebSocket transport

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, Utf8Bytes};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use thunder_core::{
    ConnectOptions, EventSink, Payload, Transport, TransportConnection, TransportError,
};

use crate::driver::{spawn_link, Session, SessionReader, SessionWriter};

/// WebSocket client transport.
///
/// Text payloads go out as text frames, binary payloads as binary frames.
/// Each inbound data frame is one message; control frames are answered by
/// the protocol library and never reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn name(&self) -> &str {
        "ws"
    }

    fn open(
        &self,
        target: &str,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Box<dyn TransportConnection> {
        let span = tracing::debug_span!("ws", endpoint = %target, conn = %events.key());
        let url = ws_url(target);

        spawn_link(
            async move {
                let url = url?;
                let (stream, _response) = connect_async(url.as_str())
                    .await
                    .map_err(|e| TransportError::Connect(e.to_string()))?;
                Ok::<_, TransportError>(WsSession { stream })
            },
            options,
            events,
            span,
        )
    }
}

/// Normalize a target into a WebSocket URL, defaulting the scheme to `ws://`.
pub fn ws_url(target: &str) -> Result<String, TransportError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(TransportError::InvalidTarget(target.to_string()));
    }

    if target.starts_with("ws://") || target.starts_with("wss://") {
        Ok(target.to_string())
    } else if target.contains("://") {
        Err(TransportError::InvalidTarget(target.to_string()))
    } else {
        Ok(format!("ws://{target}"))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsSession {
    stream: WsStream,
}

impl Session for WsSession {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsReader, WsWriter) {
        let (sink, stream) = self.stream.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
}

struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

fn protocol(error: WsError) -> TransportError {
    match error {
        WsError::Io(e) => TransportError::Io(e),
        other => TransportError::Protocol(other.to_string()),
    }
}

/// Wrap a payload in a data frame that shares its buffer.
fn to_message(payload: &Payload) -> Result<Message, TransportError> {
    if payload.is_text {
        let text = Utf8Bytes::try_from(payload.data.clone())
            .map_err(|e| TransportError::Protocol(format!("text payload is not UTF-8: {e}")))?;
        Ok(Message::Text(text))
    } else {
        Ok(Message::Binary(payload.data.clone()))
    }
}

impl SessionWriter for WsWriter {
    async fn send(&mut self, payload: &Payload) -> Result<usize, TransportError> {
        let message = to_message(payload)?;
        self.sink.send(message).await.map_err(protocol)?;
        Ok(payload.len())
    }

    async fn shutdown(&mut self) {
        // Sends the close frame
        if let Err(e) = self.sink.close().await {
            tracing::debug!(error = %e, "websocket close failed");
        }
    }
}

impl SessionReader for WsReader {
    async fn recv(&mut self) -> Option<Result<usize, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.len())),
                Ok(Message::Binary(data)) => return Some(Ok(data.len())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "close frame received");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(protocol(e))),
            }
        }
    }
}
