use std::collections::HashSet;

use parking_lot::Mutex;

use super::core_trait::*;
use crate::core::stats::ExecutionTimestamps;
use crate::error::BackendError;
use crate::tensor::{string, DataType, Element, MemoryType};

// A simple in-memory host for testing
#[derive(Debug, Clone)]
pub struct MockInput {
    pub name: String,
    pub dtype: DataType,
    pub shape: Vec<i64>,
    pub buffers: Vec<Vec<u8>>,
    pub memory: MemoryType,
}

impl MockInput {
    pub fn from_slice<T: Element>(name: &str, shape: Vec<i64>, values: &[T]) -> Self {
        let mut data = Vec::new();
        for value in values {
            value.extend_le(&mut data);
        }
        Self {
            name: name.to_string(),
            dtype: T::DTYPE,
            shape,
            buffers: vec![data],
            memory: MemoryType::Cpu,
        }
    }

    pub fn strings(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            dtype: DataType::Bytes,
            shape: vec![values.len() as i64],
            buffers: vec![string::encode(values).expect("test strings fit a length prefix")],
            memory: MemoryType::Cpu,
        }
    }

    pub fn split(mut self) -> Self {
        let data = self.buffers.remove(0);
        let (head, tail) = data.split_at(data.len() / 2);
        self.buffers = vec![head.to_vec(), tail.to_vec()];
        self
    }

    pub fn on_gpu(mut self) -> Self {
        self.memory = MemoryType::Gpu;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockRequest {
    pub id: String,
    pub correlation_id: u64,
    pub inputs: Vec<MockInput>,
    pub panic_on_read: bool,
}

impl MockRequest {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            correlation_id: 0,
            inputs: vec![],
            panic_on_read: false,
        }
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_read = true;
        self
    }

    pub fn with_input(mut self, input: MockInput) -> Self {
        self.inputs.push(input);
        self
    }

    fn find(&self, name: &str) -> Result<&MockInput, HostError> {
        self.inputs
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| HostError::new(HostErrorCode::NotFound, format!("no input named '{name}'")))
    }
}

impl HostRequest for MockRequest {
    fn id(&self) -> Result<&str, HostError> {
        Ok(&self.id)
    }

    fn correlation_id(&self) -> Result<u64, HostError> {
        Ok(self.correlation_id)
    }

    fn input_count(&self) -> Result<u32, HostError> {
        Ok(self.inputs.len() as u32)
    }

    fn input_properties(&self, name: &str) -> Result<InputProperties<'_>, HostError> {
        if self.panic_on_read {
            panic!("input table for '{}' is corrupt", self.id);
        }
        let input = self.find(name)?;
        Ok(InputProperties {
            name: &input.name,
            dtype: input.dtype,
            shape: &input.shape,
            byte_size: input.buffers.iter().map(|b| b.len() as u64).sum(),
            buffer_count: input.buffers.len() as u32,
        })
    }

    fn input_buffer(&self, name: &str, index: u32) -> Result<InputBuffer<'_>, HostError> {
        let input = self.find(name)?;
        let data = input
            .buffers
            .get(index as usize)
            .ok_or_else(|| HostError::new(HostErrorCode::InvalidArg, format!("no buffer {index}")))?;
        Ok(InputBuffer {
            data,
            memory: input.memory,
            memory_id: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockOutput {
    pub name: String,
    pub dtype: DataType,
    pub shape: Vec<i64>,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct MockResponse {
    request_id: String,
    offer: MemoryType,
    outputs: Vec<MockOutput>,
    panic_on_write: bool,
}

impl HostResponse for MockResponse {
    fn output_buffer(
        &mut self,
        name: &str,
        dtype: DataType,
        shape: &[i64],
        byte_size: usize,
        _preferred: MemoryType,
    ) -> Result<OutputBuffer<'_>, HostError> {
        if self.panic_on_write {
            panic!("allocator lost output '{name}'");
        }
        self.outputs.push(MockOutput {
            name: name.to_string(),
            dtype,
            shape: shape.to_vec(),
            data: vec![0; byte_size],
        });
        let memory = self.offer;
        let output = self.outputs.last_mut().expect("output was just pushed");
        Ok(OutputBuffer {
            data: &mut output.data,
            memory,
            memory_id: 0,
        })
    }
}

impl MockResponse {
    pub fn new(request_id: &str, offer: MemoryType) -> Self {
        Self {
            request_id: request_id.to_string(),
            offer,
            outputs: vec![],
            panic_on_write: false,
        }
    }

    pub fn outputs(&self) -> &[MockOutput] {
        &self.outputs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ResponseSent {
        request_id: String,
        error: Option<String>,
        outputs: Vec<MockOutput>,
    },
    Statistics {
        request_id: String,
        success: bool,
        timestamps: ExecutionTimestamps,
    },
    BatchStatistics {
        batch_size: u64,
    },
    Released {
        request_id: String,
    },
}

#[derive(Debug, Default)]
pub struct MockHost {
    events: Mutex<Vec<HostEvent>>,
    refuse_responses_for: HashSet<String>,
    panic_writes_for: HashSet<String>,
    offer: MemoryType,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offering(offer: MemoryType) -> Self {
        Self {
            offer,
            ..Self::default()
        }
    }

    pub fn refusing_response_for(mut self, request_id: &str) -> Self {
        self.refuse_responses_for.insert(request_id.to_string());
        self
    }

    pub fn panicking_writes_for(mut self, request_id: &str) -> Self {
        self.panic_writes_for.insert(request_id.to_string());
        self
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    pub fn sent(&self) -> Vec<(String, Option<String>, Vec<MockOutput>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::ResponseSent { request_id, error, outputs } => Some((request_id, error, outputs)),
                _ => None,
            })
            .collect()
    }

    pub fn statistics(&self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Statistics { request_id, success, .. } => Some((request_id, success)),
                _ => None,
            })
            .collect()
    }

    pub fn batch_statistics(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::BatchStatistics { batch_size } => Some(batch_size),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Released { request_id } => Some(request_id),
                _ => None,
            })
            .collect()
    }
}

impl Host for MockHost {
    type Request = MockRequest;
    type Response = MockResponse;

    fn new_response(&self, request: &Self::Request) -> Result<Self::Response, HostError> {
        if self.refuse_responses_for.contains(&request.id) {
            return Err(HostError::new(HostErrorCode::Unavailable, "response factory exhausted"));
        }
        let mut response = MockResponse::new(&request.id, self.offer);
        response.panic_on_write = self.panic_writes_for.contains(&request.id);
        Ok(response)
    }

    fn send_response(&self, response: Self::Response, error: Option<&BackendError>) -> Result<(), HostError> {
        self.events.lock().push(HostEvent::ResponseSent {
            request_id: response.request_id,
            error: error.map(ToString::to_string),
            outputs: response.outputs,
        });
        Ok(())
    }

    fn report_statistics(
        &self,
        request: &Self::Request,
        success: bool,
        timestamps: &ExecutionTimestamps,
    ) -> Result<(), HostError> {
        self.events.lock().push(HostEvent::Statistics {
            request_id: request.id.clone(),
            success,
            timestamps: *timestamps,
        });
        Ok(())
    }

    fn report_batch_statistics(&self, batch_size: u64, _timestamps: &ExecutionTimestamps) -> Result<(), HostError> {
        self.events.lock().push(HostEvent::BatchStatistics { batch_size });
        Ok(())
    }

    fn release_request(&self, request: Self::Request) -> Result<(), HostError> {
        self.events.lock().push(HostEvent::Released { request_id: request.id });
        Ok(())
    }
}
