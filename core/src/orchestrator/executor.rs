//! Orchestrator execution logic

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::channel::ChannelConfig;
use crate::config::{AdmissionRelease, RunConfig};
use crate::error::{BenchError, BenchResult};
use crate::message::{ControlMessage, ReportEvent, WorkerReport};
use crate::metrics::RunSummary;
use crate::task::ConnectionTask;
use crate::traits::{ConnectOptions, PayloadGenerator, Transport};
use crate::worker::{WorkerBuilder, WorkerStats};

use super::aggregator::{aggregate_worker_stats, MetricsAggregator};
use super::open_set::OpenSet;
use super::queue::BoundedTaskQueue;
use super::rate_limiter::ConnectRateLimiter;
use super::ring::RoundRobinRing;

/// External instruction to a running orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop dispatching and close every open connection
    Shutdown,
    /// Write one payload to every open connection
    WriteAll {
        /// Size of the payload
        payload_size: usize,
    },
}

/// Cloneable handle for steering a run from outside the control loop
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: broadcast::Sender<Command>,
    shutdown_requested: Arc<AtomicBool>,
}

impl OrchestratorHandle {
    /// Request shutdown; the run returns `RunOutcome::Interrupted`
    ///
    /// Sticky: a shutdown requested before `run` starts is honoured too.
    pub fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Ask every worker to write one payload to each open connection
    pub fn write_all(&self, payload_size: usize) {
        let _ = self.commands.send(Command::WriteAll { payload_size });
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task reached a terminal state
    Completed,
    /// Shutdown was requested before completion
    Interrupted,
}

/// Per-target counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStats {
    /// Target endpoint
    pub target: String,
    /// Tasks sent to a worker
    pub dispatched: usize,
    /// Connections that reported open
    pub opened: usize,
    /// Connections that ended with close
    pub closed: usize,
    /// Connections that ended with error
    pub errors: usize,
}

impl TargetStats {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Default::default()
        }
    }

    /// Tasks that reached a terminal state
    pub fn retired(&self) -> usize {
        self.closed + self.errors
    }
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// How the run ended
    pub outcome: RunOutcome,
    /// Aggregated metrics
    pub summary: RunSummary,
    /// Counters per target, in configuration order
    pub targets: Vec<TargetStats>,
    /// Per-worker statistics; empty for interrupted runs
    pub workers: Vec<WorkerStats>,
}

impl RunResult {
    /// Whether every task reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Orchestrator owns the run lifecycle
///
/// Spawns the worker pool, feeds it connection tasks under the admission
/// limit, folds the report stream into metrics and decides when the run is
/// over. All bookkeeping lives in a single control loop.
pub struct Orchestrator {
    /// Run configuration
    pub(crate) config: RunConfig,

    /// Transport handed to every worker
    pub(crate) transport: Arc<dyn Transport>,

    /// Payload generator handed to every worker
    pub(crate) generator: Arc<dyn PayloadGenerator>,

    /// Channel sizing
    pub(crate) channel_config: ChannelConfig,

    /// External command sender
    pub(crate) commands_tx: broadcast::Sender<Command>,

    /// Sticky shutdown flag shared with every handle
    pub(crate) shutdown_requested: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: RunConfig,
        transport: Arc<dyn Transport>,
        generator: Arc<dyn PayloadGenerator>,
        channel_config: ChannelConfig,
    ) -> Self {
        let (commands_tx, _) = broadcast::channel(channel_config.command_buffer.max(1));
        Self {
            config,
            transport,
            generator,
            channel_config,
            commands_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle for shutdown and write-all requests
    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            commands: self.commands_tx.clone(),
            shutdown_requested: self.shutdown_requested.clone(),
        }
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        self.handle().shutdown();
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run to completion or shutdown
    ///
    /// # Errors
    /// Returns a configuration error before any worker is spawned if the
    /// configuration is invalid, and an orchestration error if every worker
    /// exits while connections are still open.
    pub async fn run(&self) -> BenchResult<RunResult> {
        self.config.validate()?;

        let mut commands = self.commands_tx.subscribe();
        let (reports_tx, mut reports_rx) = mpsc::channel(self.channel_config.report_buffer.max(1));
        let mut state = RunState::new(&self.config, self.shutdown_requested.clone());

        tracing::info!(
            targets = self.config.targets.len(),
            connections_per_target = self.config.connections_per_target,
            concurrency_limit = self.config.concurrency_limit,
            messages = self.config.messages_per_connection,
            payload_size = self.config.payload_size,
            workers = self.config.workers,
            transport = self.transport.name(),
            generator = self.generator.name(),
            "Starting run"
        );

        let handles = self.spawn_workers(&reports_tx)?;
        drop(reports_tx);
        let mut ring = RoundRobinRing::new(handles)
            .ok_or_else(|| BenchError::config("at least one worker is required"))?;

        loop {
            let wait = match state.dispatch_ready(&mut ring, &mut commands) {
                Dispatch::Interrupted => return Ok(state.interrupt(ring)),
                Dispatch::Idle => None,
                Dispatch::Throttled(wait) => Some(wait),
            };

            state.check_established();
            if state.is_complete() {
                break;
            }

            tokio::select! {
                biased;

                cmd = commands.recv() => {
                    match cmd {
                        Ok(Command::Shutdown) => return Ok(state.interrupt(ring)),
                        Ok(Command::WriteAll { payload_size }) => state.write_all(&ring, payload_size),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Command receiver lagged");
                        }
                        Err(RecvError::Closed) => {}
                    }
                }

                report = reports_rx.recv() => {
                    match report {
                        Some(report) => state.handle_report(&mut ring, report),
                        None => {
                            tracing::error!(
                                open = state.open.len(),
                                "All workers exited with connections still open"
                            );
                            return Err(BenchError::orchestration(format!(
                                "all workers exited with {} connections still open",
                                state.open.len()
                            )));
                        }
                    }
                }

                _ = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {}
            }
        }

        Ok(state.complete(ring).await)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Ctrl+C triggers shutdown. If the configuration carries a run timeout,
    /// shutdown is also triggered when it elapses.
    pub async fn run_with_signal_handling(&self) -> BenchResult<RunResult> {
        let handle = self.handle();

        // Spawn signal handler task
        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, closing connections...");
                    handle.shutdown();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = match self.config.run_timeout() {
            Some(timeout) => self.run_with_timeout(timeout).await,
            None => self.run().await,
        };

        // Abort signal handler if still running
        signal_handle.abort();

        result
    }

    /// Run, triggering shutdown once `timeout` elapses
    pub async fn run_with_timeout(&self, timeout: Duration) -> BenchResult<RunResult> {
        let handle = self.handle();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::info!(timeout_secs = timeout.as_secs_f64(), "Run timeout reached");
            handle.shutdown();
        });

        let result = self.run().await;
        timer.abort();
        result
    }

    fn spawn_workers(
        &self,
        reports_tx: &mpsc::Sender<WorkerReport>,
    ) -> BenchResult<Vec<WorkerHandle>> {
        let connect_options = ConnectOptions {
            connect_timeout: self.config.connect_timeout(),
        };

        let mut handles = Vec::with_capacity(self.config.workers);
        for worker_id in 0..self.config.workers {
            let worker = WorkerBuilder::new(worker_id)
                .transport(Arc::clone(&self.transport))
                .generator(Arc::clone(&self.generator))
                .reports_tx(reports_tx.clone())
                .encoding(self.config.encoding.clone())
                .connect_options(connect_options.clone())
                .build()?;

            let (control, control_rx) = mpsc::unbounded_channel();
            handles.push(WorkerHandle {
                id: worker_id,
                control,
                concurrent: 0,
                join: tokio::spawn(worker.run(control_rx)),
            });
        }
        Ok(handles)
    }
}

/// Orchestrator-side view of one spawned worker
struct WorkerHandle {
    id: usize,
    control: mpsc::UnboundedSender<ControlMessage>,
    /// Last concurrency count the worker reported
    concurrent: usize,
    join: JoinHandle<BenchResult<WorkerStats>>,
}

enum Dispatch {
    /// Nothing more can be dispatched until a report arrives
    Idle,
    /// The connect rate limiter asks to wait
    Throttled(Duration),
    /// Shutdown was requested
    Interrupted,
}

/// State owned by the control loop
struct RunState {
    queues: Vec<BoundedTaskQueue>,
    targets: Vec<TargetStats>,
    open: OpenSet,
    metrics: MetricsAggregator,
    limiter: ConnectRateLimiter,
    release: AdmissionRelease,
    shutdown_requested: Arc<AtomicBool>,
    next_queue: usize,
}

impl RunState {
    fn new(config: &RunConfig, shutdown_requested: Arc<AtomicBool>) -> Self {
        let queues = config
            .targets
            .iter()
            .enumerate()
            .map(|(index, target)| {
                BoundedTaskQueue::new(
                    index,
                    target.clone(),
                    config.connections_per_target,
                    config.payload_size,
                    config.messages_per_connection,
                    config.concurrency_limit,
                )
            })
            .collect();

        Self {
            queues,
            targets: config.targets.iter().map(|t| TargetStats::new(t)).collect(),
            open: OpenSet::new(),
            metrics: MetricsAggregator::new(),
            limiter: ConnectRateLimiter::new(config.connect_rate),
            release: config.admission_release,
            shutdown_requested,
            next_queue: 0,
        }
    }

    /// Dispatch every task the queues and the rate limiter allow
    ///
    /// Pending commands are applied before each dispatch so nothing is sent
    /// to a worker after shutdown.
    fn dispatch_ready(
        &mut self,
        ring: &mut RoundRobinRing<WorkerHandle>,
        commands: &mut broadcast::Receiver<Command>,
    ) -> Dispatch {
        loop {
            if self.apply_pending_commands(ring, commands) {
                return Dispatch::Interrupted;
            }

            let Some(queue) = self.next_ready_queue() else {
                return Dispatch::Idle;
            };
            if let Err(wait) = self.limiter.try_acquire() {
                return Dispatch::Throttled(wait);
            }
            let Some(task) = self.queues[queue].admit() else {
                return Dispatch::Idle;
            };
            self.dispatch(ring, queue, task);
        }
    }

    /// Returns `true` once shutdown has been requested
    fn apply_pending_commands(
        &mut self,
        ring: &RoundRobinRing<WorkerHandle>,
        commands: &mut broadcast::Receiver<Command>,
    ) -> bool {
        loop {
            if self.shutdown_requested.load(Ordering::SeqCst) {
                return true;
            }
            match commands.try_recv() {
                Ok(Command::Shutdown) => return true,
                Ok(Command::WriteAll { payload_size }) => self.write_all(ring, payload_size),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Command receiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return false,
            }
        }
    }

    /// Pick the next queue with an admissible task, rotating across targets
    fn next_ready_queue(&mut self) -> Option<usize> {
        let len = self.queues.len();
        let idx = (0..len)
            .map(|offset| (self.next_queue + offset) % len)
            .find(|&idx| self.queues[idx].is_ready())?;
        self.next_queue = (idx + 1) % len;
        Some(idx)
    }

    fn dispatch(&mut self, ring: &mut RoundRobinRing<WorkerHandle>, queue: usize, task: ConnectionTask) {
        let id = task.id.clone();
        if !self.open.insert(id.clone(), queue, Instant::now()) {
            // Never hand a worker a task the open set cannot track
            tracing::error!(task_id = %id, queue, "Task id already open, dropping task");
            self.queues[queue].release();
            self.targets[queue].errors += 1;
            return;
        }
        let (_, worker) = ring.advance();
        self.targets[queue].dispatched += 1;

        tracing::debug!(
            worker_id = worker.id,
            worker_concurrent = worker.concurrent,
            task_id = %id,
            "Dispatching task"
        );

        if worker.control.send(ControlMessage::OpenTask(task)).is_err() {
            // Unsupervised worker: retire the task here so the run can finish
            let worker_id = worker.id;
            tracing::error!(worker_id, task_id = %id, "Worker is gone, task lost");
            self.handle_report(
                ring,
                WorkerReport {
                    worker_id,
                    id,
                    concurrent: 0,
                    event: ReportEvent::Error {
                        message: format!("worker {worker_id} is not running"),
                    },
                },
            );
        }
    }

    fn write_all(&self, ring: &RoundRobinRing<WorkerHandle>, payload_size: usize) {
        tracing::debug!(payload_size, "Broadcasting write to all workers");
        for worker in ring.iter() {
            let _ = worker
                .control
                .send(ControlMessage::WriteAll { payload_size });
        }
    }

    fn handle_report(&mut self, ring: &mut RoundRobinRing<WorkerHandle>, report: WorkerReport) {
        if let Some(worker) = ring.get_mut(report.worker_id) {
            worker.concurrent = report.concurrent;
        }

        match &report.event {
            ReportEvent::Open { .. } => {
                let Some(entry) = self.open.acknowledge(&report.id) else {
                    tracing::debug!(task_id = %report.id, "Ignoring open for unknown task");
                    return;
                };
                if self.release == AdmissionRelease::OnOpen {
                    self.queues[entry.queue].release();
                }
                self.targets[entry.queue].opened += 1;
            }
            ReportEvent::Message { .. } => {
                if !self.open.contains(&report.id) {
                    return;
                }
            }
            ReportEvent::Close { .. } | ReportEvent::Error { .. } => {
                let Some(entry) = self.open.retire(&report.id) else {
                    tracing::debug!(task_id = %report.id, "Ignoring duplicate terminal event");
                    return;
                };
                if self.release == AdmissionRelease::OnTerminal || !entry.acknowledged {
                    self.queues[entry.queue].release();
                }
                let stats = &mut self.targets[entry.queue];
                if matches!(report.event, ReportEvent::Close { .. }) {
                    stats.closed += 1;
                } else {
                    stats.errors += 1;
                }
            }
        }

        self.metrics.record(&report.event);
    }

    fn all_drained(&self) -> bool {
        self.queues.iter().all(BoundedTaskQueue::is_drained)
    }

    fn check_established(&mut self) {
        if self.all_drained()
            && self.open.unacknowledged() == 0
            && self.metrics.mark_established_phase_done()
        {
            tracing::info!(
                elapsed_secs = self.metrics.elapsed().as_secs_f64(),
                "All connections dispatched and established"
            );
        }
    }

    fn is_complete(&self) -> bool {
        self.all_drained() && self.open.is_empty()
    }

    fn target_stats(&self) -> Vec<TargetStats> {
        self.targets.clone()
    }

    /// Broadcast shutdown and return without waiting for acknowledgment
    fn interrupt(mut self, ring: RoundRobinRing<WorkerHandle>) -> RunResult {
        tracing::info!(
            open = self.open.len(),
            "Shutdown requested, closing open connections"
        );
        for worker in ring.iter() {
            let _ = worker.control.send(ControlMessage::Shutdown);
        }
        // Dropping the ring closes every control channel; workers exit once drained
        drop(ring);

        self.metrics.stop();
        RunResult {
            outcome: RunOutcome::Interrupted,
            summary: self.metrics.summary(),
            targets: self.target_stats(),
            workers: Vec::new(),
        }
    }

    /// Close control channels and collect worker statistics
    async fn complete(mut self, ring: RoundRobinRing<WorkerHandle>) -> RunResult {
        self.metrics.stop();
        let summary = self.metrics.summary();

        let mut workers = Vec::with_capacity(ring.len());
        for handle in ring.into_vec() {
            drop(handle.control);
            match handle.join.await {
                Ok(Ok(stats)) => workers.push(stats),
                Ok(Err(e)) => {
                    tracing::error!(worker_id = handle.id, error = %e, "Worker returned error");
                }
                Err(e) => {
                    tracing::error!(worker_id = handle.id, error = %e, "Worker task panicked");
                }
            }
        }

        let aggregated = aggregate_worker_stats(&workers);
        tracing::info!(
            elapsed_secs = summary.duration_secs,
            completed = summary.completed,
            errors = summary.errors,
            messages = summary.messages,
            min_tasks_per_worker = aggregated.min_tasks,
            max_tasks_per_worker = aggregated.max_tasks,
            "Run completed"
        );

        RunResult {
            outcome: RunOutcome::Completed,
            summary,
            targets: self.target_stats(),
            workers,
        }
    }
}
