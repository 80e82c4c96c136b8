//! Per-connection I/O task shared by every transport
//!
//! A transport's `open` spawns one [`drive`] task per attempt and hands the
//! worker a [`LinkHandle`]. The handle and the task talk over an unbounded
//! command channel; byte counters are shared atomics so the worker can read
//! them without a round trip.
//!
//! The task emits events in contract order: `Open` or `Error` first, any
//! number of `Message`s after `Open`, and one `Close` last. Failures are
//! always followed by `Close`.
//!
//! Once open, the session is split into halves. Writes drain from a queue
//! while the read half keeps being polled, so a peer that echoes while we
//! are still writing a large payload cannot stall the link.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use thunder_core::{EventSink, Payload, TransportConnection, TransportError, TransportEvent};

/// Instruction from the worker-side handle to the I/O task.
#[derive(Debug)]
pub(crate) enum LinkCommand {
    Send(Payload),
    Close,
}

/// Wire byte counters for one connection.
#[derive(Debug, Default)]
pub(crate) struct LinkCounters {
    read: AtomicU64,
    written: AtomicU64,
}

impl LinkCounters {
    /// Bytes read from the wire
    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    /// Bytes written to the wire
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    fn add_read(&self, n: usize) {
        self.read.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_written(&self, n: usize) {
        self.written.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Worker-owned end of a connection.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct LinkHandle {
    commands: mpsc::UnboundedSender<LinkCommand>,
    counters: Arc<LinkCounters>,
}

impl LinkHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<LinkCommand>,
        counters: Arc<LinkCounters>,
    ) -> Self {
        Self { commands, counters }
    }
}

impl TransportConnection for LinkHandle {
    fn send(&mut self, payload: &Payload) {
        // A closed channel means the task already emitted its terminal event
        let _ = self.commands.send(LinkCommand::Send(payload.clone()));
    }

    fn close(&mut self) {
        let _ = self.commands.send(LinkCommand::Close);
    }

    fn bytes_read(&self) -> u64 {
        self.counters.read()
    }

    fn bytes_written(&self) -> u64 {
        self.counters.written()
    }
}

/// An established connection, as seen by the driver.
pub(crate) trait Session: Send + 'static {
    type Reader: SessionReader;
    type Writer: SessionWriter;

    /// Separate the connection into independently driven halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Inbound half of a session.
///
/// `recv` must be cancel safe: the driver drops it whenever another branch
/// wins the race, and calls it again afterwards.
pub(crate) trait SessionReader: Send + 'static {
    /// Wait for one inbound message; returns its wire size, or `None` once
    /// the peer has closed.
    fn recv(&mut self) -> impl Future<Output = Option<Result<usize, TransportError>>> + Send;
}

/// Outbound half of a session.
pub(crate) trait SessionWriter: Send + 'static {
    /// Write one payload; returns the bytes put on the wire.
    fn send(
        &mut self,
        payload: &Payload,
    ) -> impl Future<Output = Result<usize, TransportError>> + Send;

    /// Close our side.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Spawn the I/O task for one attempt and return the worker's handle.
pub(crate) fn spawn_link<S, F>(
    connect: F,
    options: &thunder_core::ConnectOptions,
    events: EventSink,
    span: tracing::Span,
) -> Box<dyn TransportConnection>
where
    S: Session,
    F: Future<Output = Result<S, TransportError>> + Send + 'static,
{
    use tracing::Instrument;

    let (tx, rx) = mpsc::unbounded_channel();
    let counters = Arc::new(LinkCounters::default());
    let task = drive(
        connect,
        options.connect_timeout,
        events,
        rx,
        Arc::clone(&counters),
    );
    tokio::spawn(task.instrument(span));
    Box::new(LinkHandle::new(tx, counters))
}

async fn connect_within<S, F>(connect: F, limit: Option<Duration>) -> Result<S, TransportError>
where
    F: Future<Output = Result<S, TransportError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| TransportError::Timeout(limit))?,
        None => connect.await,
    }
}

/// Write queued payloads in order; shut down once the queue is closed.
async fn write_queued<W: SessionWriter>(
    mut writer: W,
    mut queued: mpsc::UnboundedReceiver<Payload>,
    counters: Arc<LinkCounters>,
) -> Result<(), TransportError> {
    while let Some(payload) = queued.recv().await {
        let written = writer.send(&payload).await?;
        counters.add_written(written);
    }
    writer.shutdown().await;
    Ok(())
}

fn fail(events: &EventSink, error: TransportError) {
    tracing::debug!(error = %error, "link failed");
    events.emit(TransportEvent::Error(error));
    events.emit(TransportEvent::Close);
}

/// Run one connection attempt to completion.
pub(crate) async fn drive<S, F>(
    connect: F,
    connect_timeout: Option<Duration>,
    events: EventSink,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    counters: Arc<LinkCounters>,
) where
    S: Session,
    F: Future<Output = Result<S, TransportError>>,
{
    let connect = connect_within(connect, connect_timeout);
    tokio::pin!(connect);

    let session = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(session) => break session,
                Err(error) => return fail(&events, error),
            },
            command = commands.recv() => match command {
                Some(LinkCommand::Send(_)) => {
                    tracing::debug!("dropping write queued before open");
                }
                Some(LinkCommand::Close) | None => {
                    return fail(&events, TransportError::Aborted);
                }
            },
        }
    };

    let (mut reader, mut writer) = session.split();
    tracing::debug!("link open");
    if !events.emit(TransportEvent::Open) {
        writer.shutdown().await;
        return;
    }

    // `None` once close was requested; the writer then drains and shuts down
    let (writes, queued) = mpsc::unbounded_channel();
    let mut writes = Some(writes);
    let writing = write_queued(writer, queued, Arc::clone(&counters));
    tokio::pin!(writing);

    loop {
        tokio::select! {
            command = commands.recv(), if writes.is_some() => match command {
                Some(LinkCommand::Send(payload)) => {
                    if let Some(writes) = &writes {
                        let _ = writes.send(payload);
                    }
                }
                Some(LinkCommand::Close) | None => writes = None,
            },
            written = &mut writing => match written {
                Ok(()) => break,
                Err(error) => return fail(&events, error),
            },
            inbound = reader.recv(), if writes.is_some() => match inbound {
                Some(Ok(read)) => {
                    counters.add_read(read);
                    if !events.emit(TransportEvent::Message) {
                        return;
                    }
                }
                Some(Err(error)) => return fail(&events, error),
                None => {
                    tracing::debug!("peer closed");
                    break;
                }
            },
        }
    }

    tracing::debug!(
        bytes_read = counters.read(),
        bytes_written = counters.written(),
        "link closed"
    );
    events.emit(TransportEvent::Close);
}
