//! Console and JSON reporting

use std::fs::File;
use std::path::Path;

use anyhow::Result;
use serde_json::json;
use thunder_core::{aggregate_worker_stats, LatencyPercentiles, RunConfig, RunOutcome, RunResult};
use thunder_transports::TransportKind;

const RULE_WIDTH: usize = 70;

/// Print the run configuration before starting
pub fn print_banner(config: &RunConfig, transport: TransportKind, generator: &str) {
    let limit = match config.concurrency_limit {
        0 => "unbounded".to_string(),
        n => n.to_string(),
    };

    println!("\n{}", "=".repeat(RULE_WIDTH));
    println!("   thunder - persistent connection load generator");
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();
    println!("Configuration:");
    for target in &config.targets {
        println!("  Target:       {}", target);
    }
    println!("  Connections:  {} per target", config.connections_per_target);
    println!("  Concurrency:  {} ({:?})", limit, config.admission_release);
    println!("  Messages:     {} x {} bytes ({})", config.messages_per_connection, config.payload_size, config.encoding);
    println!("  Workers:      {}", config.workers);
    println!("  Transport:    {}", transport);
    println!("  Generator:    {}", generator);
    if let Some(rate) = config.connect_rate {
        println!("  Connect rate: {}/s", rate);
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();
}

fn print_latency(label: &str, p: &LatencyPercentiles) {
    if p.count == 0 {
        println!("  {:<12} -", label);
        return;
    }
    println!(
        "  {:<12} mean {:.2}ms  p50 {:.2}ms  p95 {:.2}ms  p99 {:.2}ms  max {:.2}ms",
        label, p.mean, p.p50, p.p95, p.p99, p.max
    );
}

/// Print the run summary table
pub fn print_summary(result: &RunResult) {
    let summary = &result.summary;

    println!("\n{}", "=".repeat(RULE_WIDTH));
    match result.outcome {
        RunOutcome::Completed => println!("   RUN COMPLETE"),
        RunOutcome::Interrupted => println!("   RUN INTERRUPTED (partial results)"),
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();

    println!("Connections:");
    println!("  Opened:       {}", summary.opened);
    println!("  Closed:       {}", summary.completed);
    println!("  Errors:       {} ({:.2}%)", summary.errors, summary.error_rate() * 100.0);
    println!("  Messages:     {}", summary.messages);
    println!();

    println!("Latency:");
    print_latency("Handshake", &summary.handshake);
    print_latency("Message", &summary.latency);
    println!();

    println!("Throughput:");
    println!("  Duration:     {:.2}s", summary.duration_secs);
    if let Some(secs) = summary.established_secs {
        println!("  Established:  {:.2}s", secs);
    }
    println!("  Connections:  {:.2}/s", summary.connections_per_second);
    println!("  Messages:     {:.2}/s", summary.messages_per_second);
    println!("  Bytes:        {} read, {} written", summary.bytes_read, summary.bytes_written);

    if result.targets.len() > 1 {
        println!();
        println!("Targets:");
        for target in &result.targets {
            println!(
                "  {:<40} {} dispatched, {} closed, {} errors",
                target.target, target.dispatched, target.closed, target.errors
            );
        }
    }

    if !result.workers.is_empty() {
        let workers = aggregate_worker_stats(&result.workers);
        println!();
        println!(
            "Workers:        {} (tasks per worker {}..={}, peak held per worker {})",
            workers.total_workers, workers.min_tasks, workers.max_tasks, workers.totals.peak_concurrent
        );
    }

    if !summary.error_samples.is_empty() {
        println!();
        println!("Errors seen:");
        for sample in &summary.error_samples {
            println!("  - {}", sample);
        }
    }

    println!("{}", "=".repeat(RULE_WIDTH));
}

/// Write the configuration and results as pretty JSON
pub fn write_json(path: &Path, config: &RunConfig, result: &RunResult) -> Result<()> {
    let output = json!({
        "config": config,
        "outcome": result.outcome,
        "summary": result.summary,
        "targets": result.targets,
    });

    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &output)?;
    Ok(())
}
