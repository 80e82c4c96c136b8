//! Payload generators for thunder
//!
//! This crate provides implementations of the `PayloadGenerator` trait:
//!
//! - `static`: a repeating alphanumeric alphabet for text, zeros for binary
//! - `pattern`: a user supplied pattern repeated to the requested size
//!
//! Generators are selected once through [`GeneratorKind`] and
//! [`create_generator`], then shared by every worker.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod generators;
pub mod registry;

pub use generators::{PatternGenerator, StaticGenerator, DEFAULT_PATTERN};
pub use registry::{create_generator, GeneratorKind, RegistryError};
