//! The gated call into the transform.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

use super::adapter::InferenceRequest;
use crate::error::{BackendError, Result};
use crate::runtime::{InterpreterGate, Transformer};
use crate::tensor::constant::ROW_DIM;
use crate::tensor::NativeArray;

/// What the transform sees for one batch: the adapted requests and the
/// output names it is asked to produce, in configured order.
#[derive(Debug, Clone, Copy)]
pub struct TransformBatch<'b, 'a> {
    requests: &'b [InferenceRequest<'a>],
    output_names: &'b [String],
}

impl<'b, 'a> TransformBatch<'b, 'a> {
    pub fn new(requests: &'b [InferenceRequest<'a>], output_names: &'b [String]) -> Self {
        Self { requests, output_names }
    }

    pub fn requests(&self) -> &'b [InferenceRequest<'a>] {
        self.requests
    }

    pub fn output_names(&self) -> &'b [String] {
        self.output_names
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// A named output array produced by the transform.
///
/// `rows` is the length the transform reports for this column. It need not
/// match the input row count, since transforms may explode or aggregate rows.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub name: String,
    pub array: NativeArray<'static>,
    pub rows: usize,
}

impl OutputTensor {
    /// Output whose row count is the leading dimension of `array`.
    pub fn new(name: impl Into<String>, array: NativeArray<'static>) -> Self {
        let rows = array.shape().get(ROW_DIM).copied().unwrap_or(0);
        Self {
            name: name.into(),
            array,
            rows,
        }
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }
}

/// The transform's answer for a single request: its outputs, or the error
/// that request alone failed with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InferenceResponse {
    pub outputs: Vec<OutputTensor>,
    pub error: Option<String>,
}

impl InferenceResponse {
    pub fn success(outputs: Vec<OutputTensor>) -> Self {
        Self { outputs, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            outputs: vec![],
            error: Some(error.into()),
        }
    }

    pub fn output(&self, name: &str) -> Option<&OutputTensor> {
        self.outputs.iter().find(|output| output.name == name)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs one transform call per batch under the interpreter gate.
pub struct TransformEngine<'t> {
    transformer: &'t dyn Transformer,
}

impl<'t> TransformEngine<'t> {
    pub fn new(transformer: &'t dyn Transformer) -> Self {
        Self { transformer }
    }

    /// Acquire the gate, run the transform over `requests`, release the gate.
    ///
    /// Returns exactly one response per request. A panic inside the
    /// transform is caught and reported as [`BackendError::TransformFailure`],
    /// as is any other exception it raises. The gate is released before this
    /// returns on every path.
    pub fn execute(
        &self,
        gate: &InterpreterGate,
        requests: &[InferenceRequest<'_>],
        output_names: &[String],
    ) -> Result<Vec<InferenceResponse>> {
        if requests.is_empty() {
            return Ok(vec![]);
        }

        let batch = TransformBatch::new(requests, output_names);
        let responses = {
            let guard = gate.acquire()?;
            debug!(requests = batch.len(), outputs = output_names.len(), "entering transform");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.transformer.execute(&guard, &batch)));
            drop(guard);
            outcome.map_err(|payload| {
                let message = panic_message(payload.as_ref());
                error!(%message, "transform panicked");
                BackendError::TransformFailure(message)
            })??
        };

        if responses.len() != requests.len() {
            error!(
                requests = requests.len(),
                responses = responses.len(),
                "transform returned the wrong number of responses"
            );
            return Err(BackendError::ResponseCountMismatch {
                requests: requests.len(),
                responses: responses.len(),
            });
        }
        Ok(responses)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
