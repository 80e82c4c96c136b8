//! Worker-local connection state machine

use crate::task::{ConnectionTask, TaskId};
use crate::traits::{Payload, TransportConnection};

use std::time::{Duration, Instant};

/// Lifecycle state of one connection
///
/// `Connecting -> Open -> Closing -> Closed`, with an error exit from any
/// non-closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempt started, waiting for the transport's open event
    Connecting,
    /// Exchanging messages
    Open,
    /// Close requested, waiting for the transport's close event
    Closing,
    /// Terminal
    Closed,
}

impl ConnectionState {
    /// Whether the connection is counted against the concurrency bound
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// Outcome of a received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MessageStep {
    /// Time since the last write
    pub latency: Duration,
    /// Whether another payload must be written
    pub write_next: bool,
}

/// A live connection, exclusively owned by the worker that opened it
pub(crate) struct Connection {
    id: TaskId,
    target: String,
    state: ConnectionState,
    remaining: usize,
    payload_size: usize,
    started: Instant,
    last_send: Option<Instant>,
    link: Box<dyn TransportConnection>,
}

impl Connection {
    pub(crate) fn new(task: ConnectionTask, started: Instant, link: Box<dyn TransportConnection>) -> Self {
        Self {
            id: task.id,
            target: task.target,
            state: ConnectionState::Connecting,
            remaining: task.message_budget,
            payload_size: task.payload_size,
            started,
            last_send: None,
            link,
        }
    }

    pub(crate) fn id(&self) -> &TaskId {
        &self.id
    }

    pub(crate) fn target(&self) -> &str {
        &self.target
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Transport reported open; returns the handshake duration on the
    /// first valid transition
    pub(crate) fn on_open(&mut self, now: Instant) -> Option<Duration> {
        if self.state != ConnectionState::Connecting {
            return None;
        }
        self.state = ConnectionState::Open;
        Some(now.saturating_duration_since(self.started))
    }

    /// Transport delivered a message
    ///
    /// Spends one unit of the message budget while open. When the budget
    /// runs out the connection moves to `Closing` and the transport is asked
    /// to close.
    pub(crate) fn on_message(&mut self, now: Instant) -> Option<MessageStep> {
        let latency = self
            .last_send
            .map(|sent| now.saturating_duration_since(sent))
            .unwrap_or_default();

        match self.state {
            ConnectionState::Open => {
                self.remaining = self.remaining.saturating_sub(1);
                let write_next = self.remaining > 0;
                if !write_next {
                    self.begin_close();
                }
                Some(MessageStep {
                    latency,
                    write_next,
                })
            }
            ConnectionState::Closing => Some(MessageStep {
                latency,
                write_next: false,
            }),
            ConnectionState::Connecting | ConnectionState::Closed => None,
        }
    }

    /// Write a payload and stamp the send time
    pub(crate) fn write(&mut self, payload: &Payload, now: Instant) {
        if self.state != ConnectionState::Open {
            return;
        }
        self.last_send = Some(now);
        self.link.send(payload);
    }

    /// Ask the transport to close; idempotent
    pub(crate) fn begin_close(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return;
        }
        self.state = ConnectionState::Closing;
        self.link.close();
    }

    /// Retire the connection; returns `(bytes_read, bytes_written)`
    pub(crate) fn finish(mut self) -> (u64, u64) {
        self.state = ConnectionState::Closed;
        (self.link.bytes_read(), self.link.bytes_written())
    }

    /// Retire a failed connection, making sure the transport lets go of it
    pub(crate) fn abort(mut self) {
        if self.state != ConnectionState::Closing {
            self.link.close();
        }
        self.state = ConnectionState::Closed;
    }
}
