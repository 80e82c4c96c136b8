//! Orchestrator for run lifecycle management
//!
//! The Orchestrator coordinates a complete load run:
//! - Spawning the worker pool
//! - Generating connection tasks per target behind an admission gate
//! - Handing tasks to workers in round-robin order
//! - Folding worker reports into metrics
//! - Ending the run when every task is retired, or on shutdown
//!
//! # Example
//!
//! ```ignore
//! use thunder_core::OrchestratorBuilder;
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .targets(["ws://localhost:8080"])
//!     .connections(1000)
//!     .concurrency_limit(100)
//!     .transport(transport)
//!     .generator(generator)
//!     .build()?;
//!
//! let result = orchestrator.run_with_signal_handling().await?;
//! ```

mod aggregator;
mod builder;
mod executor;
mod open_set;
mod queue;
mod rate_limiter;
mod ring;

pub use aggregator::{aggregate_worker_stats, AggregatedStats, MetricsAggregator, MAX_ERROR_SAMPLES};
pub use builder::OrchestratorBuilder;
pub use executor::{
    Command, Orchestrator, OrchestratorHandle, RunOutcome, RunResult, TargetStats,
};
pub use open_set::{OpenEntry, OpenSet};
pub use queue::{BoundedTaskQueue, CONCURRENCY_SLACK};
pub use rate_limiter::ConnectRateLimiter;
pub use ring::RoundRobinRing;

#[cfg(test)]
mod tests;
