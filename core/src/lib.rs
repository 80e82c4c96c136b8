//! thunder-core: Orchestration engine for connection load runs
//!
//! This crate provides the engine used by the `thunder` binary, including:
//!
//! - Run configuration and task types
//! - Capability traits for transports and payload generators
//! - The worker that drives connections
//! - The orchestrator that dispatches tasks and aggregates metrics
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod orchestrator;
pub mod payload;
pub mod task;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod testing;

pub use channel::ChannelConfig;
pub use config::{AdmissionRelease, ConfigError, Encoding, RunConfig};
pub use error::*;
pub use message::{ControlMessage, ReportEvent, WorkerReport};
pub use metrics::*;
pub use orchestrator::{
    aggregate_worker_stats, Orchestrator, OrchestratorBuilder, OrchestratorHandle, RunOutcome,
    RunResult, TargetStats,
};
pub use payload::PayloadCache;
pub use task::{ConnectionTask, TaskId};
pub use traits::*;
pub use worker::{Worker, WorkerBuilder, WorkerStats};
