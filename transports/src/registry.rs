//! Transport selection
//!
//! Maps protocol identifiers from configuration onto concrete
//! [`Transport`] implementations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use thunder_core::Transport;

use crate::socket::SocketTransport;
use crate::ws::WebSocketTransport;

/// Registry lookup error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identifier does not name a known transport.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
}

/// Enumeration of supported transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransportKind {
    /// Raw TCP socket
    #[serde(rename = "tcp")]
    Tcp,
    /// Length-prefixed TCP socket
    #[serde(rename = "framed")]
    Framed,
    /// WebSocket
    #[default]
    #[serde(rename = "ws")]
    WebSocket,
}

impl TransportKind {
    /// Returns the display name for this transport.
    pub fn display_name(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "TCP",
            TransportKind::Framed => "Framed TCP",
            TransportKind::WebSocket => "WebSocket",
        }
    }

    /// Returns the identifier string for this transport.
    pub fn id(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Framed => "framed",
            TransportKind::WebSocket => "ws",
        }
    }

    /// Returns all supported transports.
    pub fn all() -> &'static [TransportKind] {
        &[
            TransportKind::Tcp,
            TransportKind::Framed,
            TransportKind::WebSocket,
        ]
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for TransportKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" | "raw" | "socket" => Ok(TransportKind::Tcp),
            "framed" | "length" | "length-prefixed" => Ok(TransportKind::Framed),
            "ws" | "websocket" | "websockets" => Ok(TransportKind::WebSocket),
            _ => Err(RegistryError::UnknownTransport(s.to_string())),
        }
    }
}

/// Create the transport for `kind`.
pub fn create_transport(kind: TransportKind) -> Arc<dyn Transport> {
    tracing::debug!(transport = kind.id(), "creating transport");
    match kind {
        TransportKind::Tcp => Arc::new(SocketTransport::raw()),
        TransportKind::Framed => Arc::new(SocketTransport::framed()),
        TransportKind::WebSocket => Arc::new(WebSocketTransport::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("TCP".parse::<TransportKind>(), Ok(TransportKind::Tcp));
        assert_eq!("websocket".parse::<TransportKind>(), Ok(TransportKind::WebSocket));
        assert_eq!("length".parse::<TransportKind>(), Ok(TransportKind::Framed));
        assert!(matches!(
            "quic".parse::<TransportKind>(),
            Err(RegistryError::UnknownTransport(_))
        ));
    }

    #[test]
    fn test_create_transport_names_match_ids() {
        for kind in TransportKind::all() {
            assert_eq!(create_transport(*kind).name(), kind.id());
            assert_eq!(kind.id().parse::<TransportKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(TransportKind::Framed.to_string(), "Framed TCP");
        assert_eq!(TransportKind::default(), TransportKind::WebSocket);
    }
}
