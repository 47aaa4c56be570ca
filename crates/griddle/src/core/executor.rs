//! One batch, end to end.
//!
//! The executor walks a batch through `Adapting → Transforming → Writing →
//! Reporting → Released`. Failures are tracked per request: a request that
//! cannot be adapted or written fails alone, while a failure of the transform
//! call itself fails every request that reached it. Whatever happens, every
//! request gets one response (when one could be created), one statistics
//! report and one release, and the batch gets one statistics report.
//! A panic while adapting or writing a request is caught and fails that
//! request alone.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use super::adapter::RequestAdapter;
use super::engine::{panic_message, TransformEngine};
use super::stats::ExecutionTimestamps;
use super::writer::ResponseWriter;
use crate::error::BackendError;
use crate::host::{Host, HostError, HostRequest};
use crate::model::{ColumnTypeMap, ModelState};
use crate::runtime::{InterpreterGate, Transformer};

/// Stages of a batch, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Adapting,
    Transforming,
    Writing,
    Reporting,
    Released,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Adapting => "adapting",
            Self::Transforming => "transforming",
            Self::Writing => "writing",
            Self::Reporting => "reporting",
            Self::Released => "released",
        };
        f.write_str(stage)
    }
}

/// Final status of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub request_id: String,
    pub correlation_id: u64,
    pub error: Option<BackendError>,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened to a batch, in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RequestOutcome>,
    pub timestamps: ExecutionTimestamps,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

// Per-request bookkeeping while the batch is in flight
struct RequestSlot<R> {
    request_id: String,
    correlation_id: u64,
    response: Option<R>,
    error: Option<BackendError>,
}

impl<R> RequestSlot<R> {
    fn fail(&mut self, error: BackendError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn is_live(&self) -> bool {
        self.response.is_some() && self.error.is_none()
    }
}

/// Runs batches for one model instance.
pub struct BatchExecutor<'e, H: Host> {
    host: &'e H,
    gate: &'e InterpreterGate,
    transformer: &'e dyn Transformer,
    model: &'e ModelState,
    column_types: &'e ColumnTypeMap,
}

impl<'e, H: Host> BatchExecutor<'e, H> {
    pub fn new(
        host: &'e H,
        gate: &'e InterpreterGate,
        transformer: &'e dyn Transformer,
        model: &'e ModelState,
        column_types: &'e ColumnTypeMap,
    ) -> Self {
        Self {
            host,
            gate,
            transformer,
            model,
            column_types,
        }
    }

    /// Execute a batch, consuming (and releasing) every request in it.
    ///
    /// Never fails as a whole; per-request errors are sent to the host and
    /// returned in the report.
    pub fn execute(&self, requests: Vec<H::Request>) -> BatchReport {
        let mut timestamps = ExecutionTimestamps::begin();
        if requests.is_empty() {
            return BatchReport {
                outcomes: vec![],
                timestamps,
            };
        }

        let mut slots = self.create_responses(&requests);
        let completed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.transform_and_write(&requests, &mut slots, &mut timestamps)
        }));
        if let Err(payload) = completed {
            let error = panicked(BatchStage::Transforming, payload.as_ref());
            for slot in &mut slots {
                slot.fail(error.clone());
            }
        }
        timestamps.mark_end();
        self.report_and_release(requests, slots, timestamps)
    }

    fn create_responses(&self, requests: &[H::Request]) -> Vec<RequestSlot<H::Response>> {
        requests
            .iter()
            .map(|request| {
                let request_id = request.id().map(str::to_string).unwrap_or_default();
                let correlation_id = request.correlation_id().unwrap_or_default();
                let mut slot = RequestSlot {
                    request_id,
                    correlation_id,
                    response: None,
                    error: None,
                };
                match self.host.new_response(request) {
                    Ok(response) => slot.response = Some(response),
                    Err(e) => {
                        error!(request_id = %slot.request_id, error = %e, "failed to create response object");
                        slot.fail(e.into());
                    }
                }
                slot
            })
            .collect()
    }

    fn transform_and_write(
        &self,
        requests: &[H::Request],
        slots: &mut [RequestSlot<H::Response>],
        timestamps: &mut ExecutionTimestamps,
    ) {
        debug!(stage = %BatchStage::Adapting, requests = requests.len());
        let adapter = RequestAdapter::new(self.model.input_names());
        let mut adapted = Vec::with_capacity(requests.len());
        let mut positions = Vec::with_capacity(requests.len());
        for (position, (request, slot)) in requests.iter().zip(slots.iter_mut()).enumerate() {
            if !slot.is_live() {
                continue;
            }
            let adapted_request = panic::catch_unwind(AssertUnwindSafe(|| adapter.adapt(request)))
                .unwrap_or_else(|payload| Err(panicked(BatchStage::Adapting, payload.as_ref())));
            match adapted_request {
                Ok(inference_request) => {
                    adapted.push(inference_request);
                    positions.push(position);
                }
                Err(e) => {
                    warn!(request_id = %slot.request_id, error = %e, "failed to adapt request");
                    slot.fail(e);
                }
            }
        }

        debug!(stage = %BatchStage::Transforming, requests = adapted.len());
        let output_names = self.model.output_names();
        timestamps.mark_compute_start();
        let result = TransformEngine::new(self.transformer).execute(self.gate, &adapted, &output_names);
        timestamps.mark_compute_end();
        drop(adapted);

        let responses = match result {
            Ok(responses) => responses,
            Err(e) => {
                error!(error = %e, requests = positions.len(), "transform failed for the whole batch");
                for &position in &positions {
                    slots[position].fail(e.clone());
                }
                return;
            }
        };

        debug!(stage = %BatchStage::Writing, requests = positions.len());
        let writer = ResponseWriter::new(self.model.outputs(), self.column_types);
        for (position, inference) in positions.into_iter().zip(responses) {
            let slot = &mut slots[position];
            if let Some(message) = &inference.error {
                warn!(request_id = %slot.request_id, error = %message, "transform failed for request");
                slot.fail(BackendError::TransformFailure(message.clone()));
                continue;
            }
            let Some(response) = slot.response.as_mut() else {
                continue;
            };
            let written = panic::catch_unwind(AssertUnwindSafe(|| writer.write(response, &inference)))
                .unwrap_or_else(|payload| Err(panicked(BatchStage::Writing, payload.as_ref())));
            if let Err(e) = written {
                warn!(request_id = %slot.request_id, error = %e, "failed to write response");
                slot.fail(e);
            }
        }
    }

    fn report_and_release(
        &self,
        requests: Vec<H::Request>,
        slots: Vec<RequestSlot<H::Response>>,
        timestamps: ExecutionTimestamps,
    ) -> BatchReport {
        debug!(stage = %BatchStage::Reporting, requests = requests.len());
        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(response) = slot.response {
                log_if_error(
                    self.host.send_response(response, slot.error.as_ref()),
                    "failed sending response",
                );
            }
            outcomes.push(RequestOutcome {
                request_id: slot.request_id,
                correlation_id: slot.correlation_id,
                error: slot.error,
            });
        }

        for (request, outcome) in requests.iter().zip(&outcomes) {
            log_if_error(
                self.host.report_statistics(request, outcome.is_success(), &timestamps),
                "failed reporting request statistics",
            );
        }

        let batch_size = u64::try_from(requests.len()).unwrap_or(u64::MAX);
        log_if_error(
            self.host.report_batch_statistics(batch_size, &timestamps),
            "failed reporting batch request statistics",
        );

        for request in requests {
            log_if_error(self.host.release_request(request), "failed releasing request");
        }
        debug!(stage = %BatchStage::Released, requests = outcomes.len());

        BatchReport { outcomes, timestamps }
    }
}

fn panicked(stage: BatchStage, payload: &(dyn Any + Send)) -> BackendError {
    let message = panic_message(payload);
    error!(%stage, %message, "panic while handling batch");
    BackendError::Panicked {
        stage: stage.to_string(),
        message,
    }
}

fn log_if_error(result: Result<(), HostError>, message: &str) {
    if let Err(e) = result {
        error!(error = %e, "{message}");
    }
}
