//! Mock collaborators shared by the worker and orchestrator tests

use crate::config::Encoding;
use crate::traits::{
    ConnectOptions, EventSink, Payload, PayloadError, PayloadGenerator, Transport,
    TransportConnection, TransportError, TransportEvent,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How mock connections behave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockBehavior {
    /// Open, then answer every write with one message
    Echo,
    /// Fail every attempt before it opens
    FailOnOpen,
    /// Open, then never answer
    Silent,
}

/// Counters observed by the tests
#[derive(Debug, Default)]
pub(crate) struct MockStats {
    pub attempts: AtomicUsize,
    pub opened: AtomicUsize,
    pub sends: AtomicUsize,
    pub closes: AtomicUsize,
    pub live: AtomicUsize,
    pub peak_live: AtomicUsize,
    pub connecting: AtomicUsize,
    pub peak_connecting: AtomicUsize,
    pub targets: Mutex<Vec<String>>,
}

impl MockStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
        let connecting = self.connecting.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_connecting.fetch_max(connecting, Ordering::SeqCst);
    }

    fn connected(&self) {
        self.connecting.fetch_sub(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Transport whose connections live entirely in memory
pub(crate) struct MockTransport {
    behavior: MockBehavior,
    open_delay: Option<Duration>,
    stats: Arc<MockStats>,
}

impl MockTransport {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            open_delay: None,
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Delay the open event; requires a tokio runtime
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(
        &self,
        target: &str,
        _options: &ConnectOptions,
        events: EventSink,
    ) -> Box<dyn TransportConnection> {
        self.stats.attempts.fetch_add(1, Ordering::SeqCst);
        self.stats.targets.lock().unwrap().push(target.to_string());
        self.stats.enter();

        let link = MockLink {
            behavior: self.behavior,
            events: events.clone(),
            stats: self.stats.clone(),
            opened: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            bytes_read: 0,
            bytes_written: 0,
        };

        match (self.behavior, self.open_delay) {
            (MockBehavior::FailOnOpen, _) => {
                link.closed.store(true, Ordering::SeqCst);
                self.stats.connecting.fetch_sub(1, Ordering::SeqCst);
                self.stats.leave();
                events.emit(TransportEvent::Error(TransportError::Connect(
                    "connection refused".into(),
                )));
                events.emit(TransportEvent::Close);
            }
            (_, None) => {
                link.opened.store(true, Ordering::SeqCst);
                self.stats.connected();
                events.emit(TransportEvent::Open);
            }
            (_, Some(delay)) => {
                let opened = link.opened.clone();
                let closed = link.closed.clone();
                let stats = self.stats.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if !closed.load(Ordering::SeqCst) {
                        opened.store(true, Ordering::SeqCst);
                        stats.connected();
                        events.emit(TransportEvent::Open);
                    }
                });
            }
        }

        Box::new(link)
    }
}

struct MockLink {
    behavior: MockBehavior,
    events: EventSink,
    stats: Arc<MockStats>,
    opened: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    bytes_read: u64,
    bytes_written: u64,
}

impl TransportConnection for MockLink {
    fn send(&mut self, payload: &Payload) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.stats.sends.fetch_add(1, Ordering::SeqCst);
        self.bytes_written += payload.len() as u64;
        if self.behavior == MockBehavior::Echo {
            self.bytes_read += payload.len() as u64;
            self.events.emit(TransportEvent::Message);
        }
    }

    fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.stats.leave();
        if !self.opened.load(Ordering::SeqCst) {
            self.stats.connecting.fetch_sub(1, Ordering::SeqCst);
            self.events
                .emit(TransportEvent::Error(TransportError::Aborted));
        }
        self.events.emit(TransportEvent::Close);
    }

    fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Generator filling payloads with `b'a'`
#[derive(Default)]
pub(crate) struct FillGenerator {
    pub calls: AtomicUsize,
}

impl PayloadGenerator for FillGenerator {
    fn name(&self) -> &str {
        "fill"
    }

    fn generate(&self, size: usize, encoding: &Encoding) -> Result<Payload, PayloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match encoding {
            Encoding::Text => Ok(Payload::text(vec![b'a'; size])),
            Encoding::Binary => Ok(Payload::binary(vec![b'a'; size])),
            Encoding::Custom(name) => Err(PayloadError::UnsupportedEncoding(name.clone())),
        }
    }
}
