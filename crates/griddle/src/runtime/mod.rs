//! # Embedded Runtime
//!
//! The scripting runtime that hosts the transform is single-threaded: only
//! one thread may run interpreter code at a time. This module puts that
//! constraint behind an explicit, shared [`InterpreterGate`] and describes the
//! runtime and its transform as capabilities ([`EmbeddedRuntime`],
//! [`Transformer`]) so batch execution does not depend on how a particular
//! runtime is bound.

mod core_trait;
mod gate;

pub use core_trait::*;
pub use gate::{GateGuard, GateState, InterpreterGate};

#[cfg(test)]
/// Mock runtime implementation.
///
/// Counts lifecycle calls and serves closure-backed transformers
pub(crate) mod mock_runtime;
