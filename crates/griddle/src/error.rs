//! Error types for the transform backend.
//!
//! Every failure that can reach a host response is a [`BackendError`]. The
//! enum is `Clone` because a batch-level failure is attributed to every
//! request of that batch.

use thiserror::Error;

use crate::host::HostError;
use crate::tensor::{DataType, MemoryType};

/// Convenience alias used throughout the crate.
pub type Result<T, E = BackendError> = std::result::Result<T, E>;

/// Errors produced while adapting, transforming or writing a batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// A tensor is split across more than one physical buffer.
    #[error("input_buffer_count {buffer_count} not supported for input '{input}'")]
    UnsupportedBufferLayout { input: String, buffer_count: u32 },

    /// A buffer lives somewhere other than CPU memory.
    #[error("{tensor}: {memory} memory is not supported, only CPU buffers can be read or written")]
    UnsupportedMemory { tensor: String, memory: MemoryType },

    /// A dtype, or native kind/itemsize pair, outside the supported set.
    #[error("unhandled dtype: {0}")]
    UnsupportedDType(String),

    /// The transform answered with a different number of responses than it was given requests.
    #[error("number of responses ({responses}) doesn't match number of requests ({requests})")]
    ResponseCountMismatch { requests: usize, responses: usize },

    /// The transform raised while executing.
    #[error("transform failed: {0}")]
    TransformFailure(String),

    /// A length-prefixed string tensor could not be decoded.
    #[error("malformed string tensor '{input}': {reason}")]
    MalformedStringTensor { input: String, reason: String },

    /// Shape or byte size of an input tensor is inconsistent.
    #[error("invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// A configured output was not produced by the transform.
    #[error("transform produced no output named '{0}'")]
    MissingOutput(String),

    /// The produced array, or the host buffer, is too small for the output.
    #[error("output '{name}' needs {expected} bytes but only {actual} are available")]
    OutputSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The produced array's dtype differs from the configured output dtype.
    #[error("output '{name}' is configured as {expected} but the transform produced '{actual}'")]
    OutputDTypeMismatch {
        name: String,
        expected: DataType,
        actual: String,
    },

    /// The embedded runtime library could not be located or loaded.
    #[error("failed to load embedded runtime: {0}")]
    RuntimeLoad(String),

    /// The interpreter gate was used before `start`.
    #[error("interpreter gate has not been started")]
    GateNotStarted,

    /// The interpreter gate was used after `stop`.
    #[error("interpreter gate has been stopped")]
    GateStopped,

    /// The model configuration is unusable.
    #[error("model configuration error: {0}")]
    Config(String),

    /// Marshaling a request panicked outside the transform call.
    #[error("{stage} panicked: {message}")]
    Panicked { stage: String, message: String },

    /// A blocking batch could not be handed to, or joined from, a worker thread.
    #[error("batch dispatch failed: {0}")]
    Dispatch(String),

    /// A host capability call reported an error.
    #[error(transparent)]
    Host(#[from] HostError),
}
