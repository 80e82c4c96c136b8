//! Transports for thunder
//!
//! This crate provides implementations of the `Transport` trait:
//!
//! - `tcp`: raw TCP, every read is a message
//! - `framed`: TCP with a 4-byte big-endian length prefix per message
//! - `ws`: WebSocket client
//!
//! Every transport spawns one I/O task per connection attempt and reports
//! progress to the worker through its `EventSink`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod driver;
pub mod registry;
pub mod socket;
pub mod ws;

pub use driver::LinkHandle;
pub use registry::{create_transport, RegistryError, TransportKind};
pub use socket::{Framing, SocketTransport, MAX_FRAME_SIZE};
pub use ws::WebSocketTransport;
