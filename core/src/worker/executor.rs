//! Worker execution loop

use crate::config::Encoding;
use crate::error::BenchResult;
use crate::message::{ControlMessage, ReportEvent, WorkerReport};
use crate::payload::PayloadCache;
use crate::task::{ConnectionTask, TaskId};
use crate::traits::{ConnectOptions, ConnectionKey, EventSink, Transport, TransportEvent};

use super::connection::{Connection, ConnectionState};
use super::stats::WorkerStats;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

type EventReceiver = mpsc::UnboundedReceiver<(ConnectionKey, TransportEvent)>;
type EventSender = mpsc::UnboundedSender<(ConnectionKey, TransportEvent)>;

/// Worker turns control messages into transport operations and transport
/// events into reports
///
/// Each worker is one tokio task running a single `select!` loop over its
/// control channel and the event stream of every connection it owns. All
/// connection state lives in that loop; nothing is shared with other workers
/// except the transport, the generator and the report channel.
pub struct Worker {
    /// Unique worker identifier
    id: usize,

    /// Transport used to open every connection
    transport: Arc<dyn Transport>,

    /// Worker-owned payload cache
    payloads: PayloadCache,

    /// Channel sender for connection reports
    reports_tx: mpsc::Sender<WorkerReport>,

    /// Encoding of every payload written
    encoding: Encoding,

    /// Options passed to every connection attempt
    connect_options: ConnectOptions,

    /// Live connections keyed by their event stream key
    connections: HashMap<ConnectionKey, Connection>,

    /// Connections accepted and not yet discarded
    concurrent: usize,

    next_key: u64,
    stats: WorkerStats,
}

impl Worker {
    /// Create a new worker
    pub fn new(
        id: usize,
        transport: Arc<dyn Transport>,
        payloads: PayloadCache,
        reports_tx: mpsc::Sender<WorkerReport>,
        encoding: Encoding,
        connect_options: ConnectOptions,
    ) -> Self {
        Self {
            id,
            transport,
            payloads,
            reports_tx,
            encoding,
            connect_options,
            connections: HashMap::new(),
            concurrent: 0,
            next_key: 0,
            stats: WorkerStats::new(id),
        }
    }

    /// Worker identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Run the worker loop
    ///
    /// Returns once the control channel is closed and every connection this
    /// worker opened has reached a terminal state.
    pub async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<ControlMessage>,
    ) -> BenchResult<WorkerStats> {
        let (events_tx, mut events_rx): (EventSender, EventReceiver) = mpsc::unbounded_channel();
        let mut control_open = true;

        self.stats.start();
        tracing::debug!(
            worker_id = self.id,
            transport = self.transport.name(),
            generator = self.payloads.generator_name(),
            "Worker started"
        );

        loop {
            if !control_open && self.connections.is_empty() {
                break;
            }

            tokio::select! {
                msg = control.recv(), if control_open => {
                    match msg {
                        Some(msg) => self.handle_control(msg, &events_tx),
                        None => {
                            tracing::debug!(
                                worker_id = self.id,
                                live = self.connections.len(),
                                "Control channel closed, draining connections"
                            );
                            control_open = false;
                        }
                    }
                }

                Some((key, event)) = events_rx.recv() => {
                    self.handle_event(key, event).await;
                }

                else => break,
            }
        }

        self.stats.stop();
        tracing::debug!(
            worker_id = self.id,
            tasks = self.stats.tasks_received,
            closed = self.stats.closed,
            errors = self.stats.errors,
            cache_hits = self.payloads.hits(),
            elapsed_ms = ?self.stats.elapsed().map(|d| d.as_millis()),
            "Worker finished"
        );

        Ok(self.stats)
    }

    fn handle_control(&mut self, msg: ControlMessage, events_tx: &EventSender) {
        match msg {
            ControlMessage::OpenTask(task) => self.open_task(task, events_tx),
            ControlMessage::WriteAll { payload_size } => self.write_all(payload_size),
            ControlMessage::Shutdown => {
                tracing::debug!(
                    worker_id = self.id,
                    live = self.connections.len(),
                    "Worker received shutdown"
                );
                for conn in self.connections.values_mut() {
                    conn.begin_close();
                }
            }
        }
    }

    fn open_task(&mut self, task: ConnectionTask, events_tx: &EventSender) {
        let key = ConnectionKey(self.next_key);
        self.next_key += 1;

        self.concurrent += 1;
        self.stats.record_task(self.concurrent);

        tracing::debug!(
            worker_id = self.id,
            task_id = %task.id,
            endpoint = %task.target,
            "Opening connection"
        );

        let started = Instant::now();
        let sink = EventSink::new(key, events_tx.clone());
        let link = self
            .transport
            .open(&task.target, &self.connect_options, sink);
        self.connections
            .insert(key, Connection::new(task, started, link));
    }

    fn write_all(&mut self, payload_size: usize) {
        let payload = match self.payloads.get(payload_size, &self.encoding) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(worker_id = self.id, error = %e, "Skipping write to all connections");
                return;
            }
        };

        let now = Instant::now();
        let mut written = 0usize;
        for conn in self.connections.values_mut() {
            if conn.state() == ConnectionState::Open {
                conn.write(&payload, now);
                written += 1;
            }
        }
        tracing::debug!(worker_id = self.id, written, payload_size, "Wrote to all open connections");
    }

    async fn handle_event(&mut self, key: ConnectionKey, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open(key).await,
            TransportEvent::Message => self.on_message(key).await,
            TransportEvent::Close => self.on_close(key).await,
            TransportEvent::Error(e) => self.fail(key, e.to_string()).await,
        }
    }

    async fn on_open(&mut self, key: ConnectionKey) {
        let Some(conn) = self.connections.get_mut(&key) else {
            return;
        };
        let Some(handshake) = conn.on_open(Instant::now()) else {
            return;
        };

        self.stats.opened += 1;
        let id = conn.id().clone();
        let size = conn.payload_size();
        self.report(id, ReportEvent::Open { handshake }).await;
        self.write_next(key, size).await;
    }

    async fn on_message(&mut self, key: ConnectionKey) {
        let Some(conn) = self.connections.get_mut(&key) else {
            return;
        };
        let Some(step) = conn.on_message(Instant::now()) else {
            return;
        };

        self.stats.messages += 1;
        let id = conn.id().clone();
        let size = conn.payload_size();
        self.report(
            id,
            ReportEvent::Message {
                latency: step.latency,
            },
        )
        .await;

        if step.write_next {
            self.write_next(key, size).await;
        }
    }

    async fn on_close(&mut self, key: ConnectionKey) {
        let Some(conn) = self.connections.remove(&key) else {
            return;
        };
        self.concurrent -= 1;

        let id = conn.id().clone();
        let (bytes_read, bytes_written) = conn.finish();
        self.stats.record_close(bytes_read, bytes_written);

        tracing::debug!(worker_id = self.id, task_id = %id, bytes_read, bytes_written, "Connection closed");
        self.report(
            id,
            ReportEvent::Close {
                bytes_read,
                bytes_written,
            },
        )
        .await;
    }

    /// Discard a connection after a failure and report it
    async fn fail(&mut self, key: ConnectionKey, message: String) {
        let Some(conn) = self.connections.remove(&key) else {
            return;
        };
        self.concurrent -= 1;
        self.stats.record_error();

        let id = conn.id().clone();
        tracing::warn!(
            worker_id = self.id,
            task_id = %id,
            endpoint = conn.target(),
            error = %message,
            "Connection failed"
        );
        conn.abort();

        self.report(id, ReportEvent::Error { message }).await;
    }

    /// Write the next payload on an open connection
    ///
    /// A payload that cannot be generated fails the connection.
    async fn write_next(&mut self, key: ConnectionKey, size: usize) {
        match self.payloads.get(size, &self.encoding) {
            Ok(payload) => {
                if let Some(conn) = self.connections.get_mut(&key) {
                    conn.write(&payload, Instant::now());
                }
            }
            Err(e) => self.fail(key, e.to_string()).await,
        }
    }

    async fn report(&mut self, id: TaskId, event: ReportEvent) {
        let report = WorkerReport {
            worker_id: self.id,
            id,
            concurrent: self.concurrent,
            event,
        };
        // The orchestrator drops its receiver once the run returns
        if self.reports_tx.send(report).await.is_err() {
            tracing::debug!(worker_id = self.id, "Report channel closed");
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("encoding", &self.encoding)
            .field("live", &self.connections.len())
            .field("concurrent", &self.concurrent)
            .finish()
    }
}
