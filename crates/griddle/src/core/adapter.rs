//! Turning host requests into borrowed, runtime-ready inputs.

use tracing::debug;

use crate::error::{BackendError, Result};
use crate::host::HostRequest;
use crate::tensor::{
    string,
    to_native_descriptor,
    DataType,
    NativeArray,
    NativeDescriptor,
    StringTensorBuffer,
    TensorDescriptor,
    TensorView,
};

/// One adapted input: a view over the host buffer plus, for string tensors,
/// the fixed-width text materialized from it.
#[derive(Debug, Clone)]
pub struct InputTensor<'a> {
    view: TensorView<'a>,
    layout: InputLayout,
}

#[derive(Debug, Clone)]
enum InputLayout {
    /// Host bytes are already in native layout.
    Numeric(NativeDescriptor),
    /// Host records decoded into fixed-width text.
    Text(StringTensorBuffer),
}

impl<'a> InputTensor<'a> {
    pub fn name(&self) -> &str {
        self.view.name()
    }

    pub fn view(&self) -> &TensorView<'a> {
        &self.view
    }

    pub fn strings(&self) -> Option<&StringTensorBuffer> {
        match &self.layout {
            InputLayout::Text(strings) => Some(strings),
            InputLayout::Numeric(_) => None,
        }
    }

    /// The input as a native array. Numeric inputs point straight at host
    /// memory; string inputs point at the materialized text buffer.
    pub fn as_native(&self) -> NativeArray<'_> {
        let dims = self.view.dims().to_vec();
        match &self.layout {
            InputLayout::Numeric(descriptor) => NativeArray::borrowed(*descriptor, dims, self.view.data()),
            InputLayout::Text(strings) => NativeArray::borrowed(strings.descriptor(), dims, strings.as_bytes()),
        }
    }
}

/// A host request after adaptation, borrowing from the request handle.
#[derive(Debug, Clone)]
pub struct InferenceRequest<'a> {
    request_id: &'a str,
    correlation_id: u64,
    inputs: Vec<InputTensor<'a>>,
}

impl<'a> InferenceRequest<'a> {
    pub fn request_id(&self) -> &'a str {
        self.request_id
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    /// Inputs in the model's configured order.
    pub fn inputs(&self) -> &[InputTensor<'a>] {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&InputTensor<'a>> {
        self.inputs.iter().find(|input| input.name() == name)
    }
}

/// Builds [`InferenceRequest`]s by reading inputs in the model's configured
/// name order.
///
/// Input names are validated against the model configuration when the model
/// loads; a request missing one of them surfaces as a host error here.
pub struct RequestAdapter<'m> {
    input_names: &'m [String],
}

impl<'m> RequestAdapter<'m> {
    pub fn new(input_names: &'m [String]) -> Self {
        Self { input_names }
    }

    pub fn adapt<'r, R: HostRequest>(&self, request: &'r R) -> Result<InferenceRequest<'r>> {
        let request_id = request.id()?;
        let correlation_id = request.correlation_id()?;
        let input_count = request.input_count()?;
        debug!(request_id, correlation_id, input_count, "adapting request");

        let inputs = self
            .input_names
            .iter()
            .map(|name| adapt_input(request, name))
            .collect::<Result<Vec<_>>>()?;

        Ok(InferenceRequest {
            request_id,
            correlation_id,
            inputs,
        })
    }
}

fn adapt_input<'r, R: HostRequest>(request: &'r R, name: &str) -> Result<InputTensor<'r>> {
    let properties = request.input_properties(name)?;
    if properties.buffer_count != 1 {
        return Err(BackendError::UnsupportedBufferLayout {
            input: name.to_string(),
            buffer_count: properties.buffer_count,
        });
    }
    let buffer = request.input_buffer(name, 0)?;

    let descriptor = TensorDescriptor {
        name: name.to_string(),
        dtype: properties.dtype,
        shape: properties.shape.to_vec(),
        memory: buffer.memory,
    };
    let view = TensorView::new(descriptor, properties.buffer_count, buffer.data)?;

    if view.dtype() == DataType::Bytes {
        let strings = string::decode_fixed_width(view.data(), view.element_count()).map_err(|e| {
            BackendError::MalformedStringTensor {
                input: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        return Ok(InputTensor {
            view,
            layout: InputLayout::Text(strings),
        });
    }

    let native = to_native_descriptor(view.dtype())?;
    let expected = view
        .element_count()
        .checked_mul(native.itemsize())
        .ok_or_else(|| BackendError::InvalidInput {
            input: name.to_string(),
            reason: format!("byte size of shape {:?} of {} overflows", view.dims(), view.dtype()),
        })?;
    if view.byte_length() != expected {
        return Err(BackendError::InvalidInput {
            input: name.to_string(),
            reason: format!(
                "shape {:?} of {} needs {} bytes, buffer holds {}",
                view.dims(),
                view.dtype(),
                expected,
                view.byte_length()
            ),
        });
    }
    Ok(InputTensor {
        view,
        layout: InputLayout::Numeric(native),
    })
}
