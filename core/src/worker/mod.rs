//! Worker module for driving connections
//!
//! A Worker owns a set of live connections and does two things: it turns
//! control messages from the orchestrator into transport operations, and it
//! turns transport events into reports for the orchestrator.
//!
//! Per connection the loop is **open -> write -> reply -> write ... -> close**:
//!
//! 1. `OpenTask` starts a connection attempt through the Transport
//! 2. On `open` the first payload is written
//! 3. Every reply spends one unit of the message budget and triggers the next write
//! 4. When the budget is spent the connection is closed
//! 5. `close` or `error` retires the connection
//!
//! Every transition is reported on the shared report channel together with
//! the number of connections the worker currently holds.
//!
//! # Example
//!
//! ```ignore
//! use thunder_core::worker::WorkerBuilder;
//!
//! let worker = WorkerBuilder::new(0)
//!     .transport(transport)
//!     .generator(generator)
//!     .reports_tx(tx)
//!     .build()?;
//!
//! let (control_tx, control_rx) = tokio::sync::mpsc::unbounded_channel();
//! let handle = tokio::spawn(worker.run(control_rx));
//! ```

mod builder;
mod connection;
mod executor;
mod stats;

pub use builder::WorkerBuilder;
pub use connection::ConnectionState;
pub use executor::Worker;
pub use stats::WorkerStats;
