//! Tests for the Orchestrator module

use super::builder::OrchestratorBuilder;
use super::executor::{Orchestrator, RunOutcome};
use super::queue::CONCURRENCY_SLACK;
use crate::channel::ChannelConfig;
use crate::config::{AdmissionRelease, RunConfig};
use crate::error::BenchErrorKind;
use crate::testing::{FillGenerator, MockBehavior, MockStats, MockTransport};

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(config: RunConfig, transport: MockTransport) -> Orchestrator {
    OrchestratorBuilder::new()
        .config(config)
        .transport(Arc::new(transport))
        .generator(Arc::new(FillGenerator::default()))
        .channel_config(ChannelConfig::default().with_report_buffer(64))
        .build()
        .unwrap()
}

/// Poll until `counter` reaches `expected` or five seconds pass
async fn wait_for(counter: &AtomicUsize, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while MockStats::get(counter) < expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} (at {})",
            expected,
            MockStats::get(counter)
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_missing_transport() {
    let result = OrchestratorBuilder::new()
        .targets(["mock://a"])
        .generator(Arc::new(FillGenerator::default()))
        .build();

    let err = result.err().unwrap();
    assert_eq!(err.kind, BenchErrorKind::MissingConfig);
    assert!(err.message.contains("transport"));
}

#[test]
fn test_builder_missing_generator() {
    let result = OrchestratorBuilder::new()
        .targets(["mock://a"])
        .transport(Arc::new(MockTransport::new(MockBehavior::Echo)))
        .build();

    assert!(result.err().unwrap().message.contains("generator"));
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = OrchestratorBuilder::new()
        .transport(Arc::new(MockTransport::new(MockBehavior::Echo)))
        .generator(Arc::new(FillGenerator::default()))
        .build();

    let err = result.err().unwrap();
    assert!(err.is_config());
    assert!(err.message.contains("no targets"));
}

#[test]
fn test_builder_setters() {
    let orch = OrchestratorBuilder::new()
        .targets(["mock://a", "mock://b"])
        .connections(7)
        .concurrency_limit(3)
        .messages(2)
        .payload_size(64)
        .workers(5)
        .admission_release(AdmissionRelease::OnTerminal)
        .connect_rate(Some(10.0))
        .transport(Arc::new(MockTransport::new(MockBehavior::Echo)))
        .generator(Arc::new(FillGenerator::default()))
        .build()
        .unwrap();

    let config = orch.config();
    assert_eq!(config.targets.len(), 2);
    assert_eq!(config.connections_per_target, 7);
    assert_eq!(config.concurrency_limit, 3);
    assert_eq!(config.messages_per_connection, 2);
    assert_eq!(config.payload_size, 64);
    assert_eq!(config.workers, 5);
    assert_eq!(config.admission_release, AdmissionRelease::OnTerminal);
    assert_eq!(config.connect_rate, Some(10.0));
}

#[tokio::test]
async fn test_invalid_config_fails_before_spawning() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let stats = transport.stats();
    let orch = Orchestrator::new(
        RunConfig::new(["mock://a"]).with_workers(0),
        Arc::new(transport),
        Arc::new(FillGenerator::default()),
        ChannelConfig::default(),
    );

    let err = orch.run().await.unwrap_err();
    assert!(err.is_config());
    assert_eq!(MockStats::get(&stats.attempts), 0);
}

// ============================================================================
// Run scenarios
// ============================================================================

#[tokio::test]
async fn test_single_target_echo_run_completes() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a"])
        .with_connections(5)
        .with_workers(1)
        .with_messages(1)
        .with_payload_size(32);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert!(result.is_complete());
    assert_eq!(result.summary.opened, 5);
    assert_eq!(result.summary.messages, 5);
    assert_eq!(result.summary.completed, 5);
    assert_eq!(result.summary.errors, 0);
    assert_eq!(result.summary.bytes_written, 5 * 32);
    assert!(result.summary.established_secs.is_some());

    assert_eq!(result.targets.len(), 1);
    assert_eq!(result.targets[0].dispatched, 5);
    assert_eq!(result.targets[0].opened, 5);
    assert_eq!(result.targets[0].closed, 5);

    assert_eq!(result.workers.len(), 1);
    assert_eq!(result.workers[0].tasks_received, 5);
    assert_eq!(MockStats::get(&stats.live), 0);
}

#[tokio::test]
async fn test_repeated_target_with_limit_completes() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a", "mock://a"])
        .with_connections(2)
        .with_concurrency_limit(1)
        .with_workers(1)
        .with_messages(1);

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator(config, transport).run())
        .await
        .expect("run hung with a repeated target")
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert!(result.is_complete());
    assert_eq!(result.summary.completed, 4);
    for target in &result.targets {
        assert_eq!(target.dispatched, 2);
        assert_eq!(target.opened, 2);
        assert_eq!(target.closed, 2);
        assert_eq!(target.errors, 0);
    }
    assert_eq!(MockStats::get(&stats.live), 0);
}

#[tokio::test]
async fn test_repeated_target_unbounded_retires_every_task() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a", "mock://a"])
        .with_connections(3)
        .with_workers(2)
        .with_messages(1);

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator(config, transport).run())
        .await
        .expect("run hung with a repeated target")
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    let retired: usize = result.targets.iter().map(|t| t.retired()).sum();
    assert_eq!(retired, 6);
    assert_eq!(result.summary.opened, 6);
    assert_eq!(result.targets[1].opened, 3);
    assert_eq!(result.targets[1].closed, 3);
    assert_eq!(MockStats::get(&stats.attempts), 6);
    assert_eq!(MockStats::get(&stats.live), 0);
}

#[tokio::test]
async fn test_connection_errors_do_not_abort_run() {
    let transport = MockTransport::new(MockBehavior::FailOnOpen);
    let config = RunConfig::new(["mock://down"])
        .with_connections(10)
        .with_concurrency_limit(3)
        .with_workers(2);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.summary.completed, 0);
    assert_eq!(result.summary.errors, 10);
    assert_eq!(result.summary.opened, 0);
    assert_eq!(result.targets[0].errors, 10);
    assert_eq!(
        result.summary.error_samples,
        vec!["connect failed: connection refused".to_string()]
    );
}

#[tokio::test]
async fn test_shutdown_closes_open_connections() {
    let transport = MockTransport::new(MockBehavior::Silent);
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a"])
        .with_connections(10)
        .with_concurrency_limit(3)
        .with_admission_release(AdmissionRelease::OnTerminal)
        .with_workers(2);

    let orch = orchestrator(config, transport);
    let handle = orch.handle();
    let run = tokio::spawn(async move { orch.run().await });

    // Each connection writes once it has opened
    wait_for(&stats.sends, 3).await;
    handle.shutdown();
    let result = run.await.unwrap().unwrap();

    assert_eq!(result.outcome, RunOutcome::Interrupted);
    assert!(result.workers.is_empty());
    assert!(result.summary.opened <= 3);

    wait_for(&stats.closes, 3).await;
    assert_eq!(MockStats::get(&stats.live), 0);

    handle.write_all(16);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(MockStats::get(&stats.attempts), 3);
    assert_eq!(MockStats::get(&stats.sends), 3);
}

#[tokio::test]
async fn test_shutdown_before_run_dispatches_nothing() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let stats = transport.stats();
    let orch = orchestrator(RunConfig::new(["mock://a"]).with_workers(2), transport);

    orch.shutdown();
    assert!(orch.handle().is_shutdown_requested());
    let result = orch.run().await.unwrap();

    assert_eq!(result.outcome, RunOutcome::Interrupted);
    assert_eq!(MockStats::get(&stats.attempts), 0);
}

#[tokio::test]
async fn test_run_timeout_interrupts() {
    let transport = MockTransport::new(MockBehavior::Silent);
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a"])
        .with_connections(2)
        .with_workers(1);

    let result = orchestrator(config, transport)
        .run_with_timeout(Duration::from_millis(50))
        .await
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Interrupted);
    assert_eq!(result.summary.opened, 2);
    wait_for(&stats.closes, 2).await;
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_every_task_retired_per_target() {
    let transport = MockTransport::new(MockBehavior::Echo).with_open_delay(Duration::from_millis(1));
    let targets = ["mock://a", "mock://b", "mock://c"];
    let config = RunConfig::new(targets)
        .with_connections(20)
        .with_concurrency_limit(4)
        .with_messages(2)
        .with_workers(3);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert!(result.is_complete());
    for (stats, target) in result.targets.iter().zip(targets) {
        assert_eq!(stats.target, target);
        assert_eq!(stats.dispatched, 20);
        assert_eq!(stats.retired(), 20);
    }
    assert_eq!(result.summary.retired(), 60);
    assert_eq!(result.summary.messages, 120);
}

#[tokio::test]
async fn test_round_robin_is_fair() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let config = RunConfig::new(["mock://a"])
        .with_connections(40)
        .with_workers(4);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert_eq!(result.workers.len(), 4);
    for stats in &result.workers {
        assert_eq!(stats.tasks_received, 10, "worker {}", stats.worker_id);
    }
}

#[tokio::test]
async fn test_held_connections_stay_within_limit() {
    let transport = MockTransport::new(MockBehavior::Echo).with_open_delay(Duration::from_millis(1));
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a"])
        .with_connections(100)
        .with_concurrency_limit(5)
        .with_messages(2)
        .with_admission_release(AdmissionRelease::OnTerminal)
        .with_workers(3);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert_eq!(result.summary.completed, 100);
    let peak = MockStats::get(&stats.peak_live);
    assert!(peak <= 5 + CONCURRENCY_SLACK, "peak {}", peak);
    assert!(peak >= 2);
}

#[tokio::test]
async fn test_handshakes_stay_within_limit() {
    let transport = MockTransport::new(MockBehavior::Echo).with_open_delay(Duration::from_millis(1));
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a"])
        .with_connections(100)
        .with_concurrency_limit(5)
        .with_workers(3);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert_eq!(result.summary.completed, 100);
    let peak = MockStats::get(&stats.peak_connecting);
    assert!(peak <= 5 + CONCURRENCY_SLACK, "peak {}", peak);
}

#[tokio::test]
async fn test_write_all_reaches_open_connections() {
    let transport = MockTransport::new(MockBehavior::Silent);
    let stats = transport.stats();
    let config = RunConfig::new(["mock://a"])
        .with_connections(4)
        .with_workers(2);

    let orch = orchestrator(config, transport);
    let handle = orch.handle();
    let run = tokio::spawn(async move { orch.run().await });

    wait_for(&stats.sends, 4).await;
    handle.write_all(16);
    wait_for(&stats.sends, 8).await;

    handle.shutdown();
    let result = run.await.unwrap().unwrap();
    assert_eq!(result.outcome, RunOutcome::Interrupted);
    wait_for(&stats.closes, 4).await;
}

#[tokio::test]
async fn test_connect_rate_spaces_dispatches() {
    let transport = MockTransport::new(MockBehavior::Echo);
    let config = RunConfig::new(["mock://a"])
        .with_connections(5)
        .with_workers(2)
        .with_connect_rate(100.0);

    let result = orchestrator(config, transport).run().await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.summary.completed, 5);
    // Four waits of ~10ms after the first permit
    assert!(
        result.summary.duration_secs >= 0.03,
        "took {}",
        result.summary.duration_secs
    );
}
