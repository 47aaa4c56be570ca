//! # Griddle
//!
//! A backend that runs feature-engineering transforms, hosted in an embedded
//! single-threaded scripting runtime, on batches of requests from an
//! inference-serving host.
//!
//! ## Overview
//!
//! For every batch the host hands over, griddle:
//!
//! - reads each request's input tensors as zero-copy views over host memory,
//!   decoding length-prefixed string tensors into fixed-width text
//! - translates host dtypes into the runtime's native array descriptors
//! - calls the transform once for the whole batch, with the process-wide
//!   interpreter gate held
//! - copies every output array into a host-allocated response buffer
//! - sends one response, one statistics report and one release per request,
//!   and one statistics report per batch, no matter what failed
//!
//! ## Architecture
//!
//! ### Host
//!
//! The [`host`] traits describe the slice of the host API the backend calls:
//! reading request inputs, allocating output buffers, sending responses,
//! reporting statistics and releasing requests.
//!
//! ### Embedded Runtime
//!
//! The [`runtime`] module wraps the scripting runtime in an
//! [`InterpreterGate`](runtime::InterpreterGate), one per process, shared by
//! every model instance. Interpreter work only happens with a
//! [`GateGuard`](runtime::GateGuard) alive; marshaling before and after the
//! transform runs without it.
//!
//! ### Batch Execution
//!
//! [`core`] adapts requests, runs the transform and writes responses.
//! Failures are attributed per request where possible: a malformed input or a
//! failed output copy fails only its own request, while an exception from the
//! transform call fails every request in the batch.
//!
//! ### Models
//!
//! [`model`] parses the model configuration and owns the per-instance
//! [`ModelInstance`](model::ModelInstance) the host calls into.
//!
//! ## Assumptions
//!
//! - The `0th` dimension of every tensor is the row dimension
//! - Only CPU-resident buffers are read or written
//! - STRING and FP16 outputs are not supported
//!

pub mod core;
pub mod error;
pub mod host;
pub mod model;
pub mod runtime;
pub mod tensor;

/// Constants for client reference
pub use tensor::constant;

pub use crate::core::executor::{BatchReport, RequestOutcome};
pub use error::{BackendError, Result};
pub use model::{BatchDispatcher, ModelInstance, ModelState};
pub use runtime::{EmbeddedRuntime, InterpreterGate, Transformer};
