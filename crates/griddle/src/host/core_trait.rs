use std::fmt;

use thiserror::Error;

use crate::core::stats::ExecutionTimestamps;
use crate::error::BackendError;
use crate::tensor::{DataType, MemoryType};

/// Category of a host-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorCode {
    Internal,
    InvalidArg,
    NotFound,
    Unsupported,
    Unavailable,
}

impl fmt::Display for HostErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Internal => "Internal",
            Self::InvalidArg => "Invalid argument",
            Self::NotFound => "Not found",
            Self::Unsupported => "Unsupported",
            Self::Unavailable => "Unavailable",
        };
        f.write_str(name)
    }
}

/// An error returned by one of the host's capability calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct HostError {
    pub code: HostErrorCode,
    pub message: String,
}

impl HostError {
    pub fn new(code: HostErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Properties the host reports for one named request input.
#[derive(Debug, Clone, Copy)]
pub struct InputProperties<'a> {
    pub name: &'a str,
    pub dtype: DataType,
    pub shape: &'a [i64],
    pub byte_size: u64,
    pub buffer_count: u32,
}

/// One physical buffer of a request input.
#[derive(Debug, Clone, Copy)]
pub struct InputBuffer<'a> {
    pub data: &'a [u8],
    pub memory: MemoryType,
    pub memory_id: i64,
}

/// A host-allocated output buffer and the memory the host actually offered.
#[derive(Debug)]
pub struct OutputBuffer<'a> {
    pub data: &'a mut [u8],
    pub memory: MemoryType,
    pub memory_id: i64,
}

/// Read access to one incoming host request.
///
/// Everything handed out borrows from the request and stays valid until the
/// request is released.
pub trait HostRequest {
    fn id(&self) -> Result<&str, HostError>;

    fn correlation_id(&self) -> Result<u64, HostError>;

    fn input_count(&self) -> Result<u32, HostError>;

    fn input_properties(&self, name: &str) -> Result<InputProperties<'_>, HostError>;

    /// Buffer `index` of the input called `name`.
    fn input_buffer(&self, name: &str, index: u32) -> Result<InputBuffer<'_>, HostError>;
}

/// A response under construction.
pub trait HostResponse {
    /// Create the output tensor `name` and allocate `byte_size` bytes for it,
    /// preferably in `preferred` memory.
    fn output_buffer(
        &mut self,
        name: &str,
        dtype: DataType,
        shape: &[i64],
        byte_size: usize,
        preferred: MemoryType,
    ) -> Result<OutputBuffer<'_>, HostError>;
}

/// The lifecycle capabilities the host exposes to one model instance.
///
/// `send_response` and `release_request` take their handle by value, so a
/// response can be sent at most once and a request released at most once.
/// Every send is final: a request never receives a second response.
pub trait Host: Send + Sync {
    type Request: HostRequest + Send;
    type Response: HostResponse + Send;

    fn new_response(&self, request: &Self::Request) -> Result<Self::Response, HostError>;

    /// Send the final response for a request, with `error` set if the request failed.
    fn send_response(&self, response: Self::Response, error: Option<&BackendError>) -> Result<(), HostError>;

    fn report_statistics(
        &self,
        request: &Self::Request,
        success: bool,
        timestamps: &ExecutionTimestamps,
    ) -> Result<(), HostError>;

    fn report_batch_statistics(&self, batch_size: u64, timestamps: &ExecutionTimestamps) -> Result<(), HostError>;

    fn release_request(&self, request: Self::Request) -> Result<(), HostError>;
}
