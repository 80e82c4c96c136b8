//! Messages exchanged between the orchestrator and its workers

use crate::task::{ConnectionTask, TaskId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator -> worker instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMessage {
    /// Open a new connection and run its message exchange
    OpenTask(ConnectionTask),

    /// Write one payload to every currently open connection
    WriteAll {
        /// Size of the payload to write
        payload_size: usize,
    },

    /// Close every locally open connection
    Shutdown,
}

/// Connection event carried by a [`WorkerReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    /// Connection established
    Open {
        /// Time from task receipt to the transport's open event
        handshake: Duration,
    },

    /// Reply received for the last payload
    Message {
        /// Time since the last payload was written
        latency: Duration,
    },

    /// Connection closed (terminal)
    Close {
        /// Bytes read over the connection's lifetime
        bytes_read: u64,
        /// Bytes written over the connection's lifetime
        bytes_written: u64,
    },

    /// Connection failed (terminal)
    Error {
        /// Failure description
        message: String,
    },
}

impl ReportEvent {
    /// Whether this event retires the task
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportEvent::Close { .. } | ReportEvent::Error { .. })
    }

    /// Short event name
    pub fn kind(&self) -> &'static str {
        match self {
            ReportEvent::Open { .. } => "open",
            ReportEvent::Message { .. } => "message",
            ReportEvent::Close { .. } => "close",
            ReportEvent::Error { .. } => "error",
        }
    }
}

/// Worker -> orchestrator report about one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Reporting worker
    pub worker_id: usize,

    /// Task the event belongs to
    pub id: TaskId,

    /// Connections held by the worker after this event
    pub concurrent: usize,

    /// What happened
    #[serde(flatten)]
    pub event: ReportEvent,
}
