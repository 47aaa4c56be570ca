//! Copying transform outputs into host response buffers.

use tracing::debug;

use super::engine::{InferenceResponse, OutputTensor};
use crate::error::{BackendError, Result};
use crate::host::HostResponse;
use crate::model::{ColumnTypeMap, OutputDescriptor};
use crate::tensor::{to_native_descriptor, DataType, MemoryType};

/// Writes a request's outputs into its host response, in configured output
/// order.
pub struct ResponseWriter<'m> {
    outputs: &'m [OutputDescriptor],
    column_types: &'m ColumnTypeMap,
}

impl<'m> ResponseWriter<'m> {
    pub fn new(outputs: &'m [OutputDescriptor], column_types: &'m ColumnTypeMap) -> Self {
        Self { outputs, column_types }
    }

    /// Copy every configured output of `inference` into `response`.
    ///
    /// Stops at the first output that cannot be written; the request then
    /// fails as a whole.
    pub fn write<R: HostResponse>(&self, response: &mut R, inference: &InferenceResponse) -> Result<()> {
        for descriptor in self.outputs {
            let output = inference
                .output(&descriptor.name)
                .ok_or_else(|| BackendError::MissingOutput(descriptor.name.clone()))?;
            self.write_output(response, descriptor, output)?;
        }
        Ok(())
    }

    /// Copy one output as a `[rows, width]` tensor.
    ///
    /// `width` is 1 for categorical columns, otherwise the number of elements
    /// per row. The bytes are copied verbatim, so the array must already be in
    /// the configured dtype's little-endian layout.
    pub fn write_output<R: HostResponse>(
        &self,
        response: &mut R,
        descriptor: &OutputDescriptor,
        output: &OutputTensor,
    ) -> Result<()> {
        let name = descriptor.name.as_str();
        if matches!(descriptor.dtype, DataType::Fp16 | DataType::Bytes) {
            return Err(BackendError::UnsupportedDType(format!(
                "{} output '{}'",
                descriptor.dtype, name
            )));
        }

        let native = to_native_descriptor(descriptor.dtype)?;
        let array = &output.array;
        if *array.descriptor() != native {
            return Err(BackendError::OutputDTypeMismatch {
                name: name.to_string(),
                expected: descriptor.dtype,
                actual: array.typestr(),
            });
        }

        let rows = output.rows;
        let itemsize = native.itemsize();
        let width = if self.column_types.is_categorical(name) || rows == 0 {
            1
        } else if array.len() % rows == 0 {
            array.len() / rows
        } else {
            return Err(BackendError::OutputSizeMismatch {
                name: name.to_string(),
                expected: rows
                    .saturating_mul(array.len().div_ceil(rows))
                    .saturating_mul(itemsize),
                actual: array.nbytes(),
            });
        };

        // rows come from the transform; saturating keeps an absurd count on the short-array path
        let byte_size = rows.saturating_mul(width).saturating_mul(itemsize);
        if array.nbytes() < byte_size {
            return Err(BackendError::OutputSizeMismatch {
                name: name.to_string(),
                expected: byte_size,
                actual: array.nbytes(),
            });
        }

        let shape = [to_dim(rows), to_dim(width)];
        debug!(output = name, rows, width, byte_size, "writing output");
        let mut buffer = response.output_buffer(name, descriptor.dtype, &shape, byte_size, MemoryType::Cpu)?;
        if buffer.memory != MemoryType::Cpu {
            return Err(BackendError::UnsupportedMemory {
                tensor: format!("output '{name}'"),
                memory: buffer.memory,
            });
        }
        if buffer.data.len() < byte_size {
            return Err(BackendError::OutputSizeMismatch {
                name: name.to_string(),
                expected: byte_size,
                actual: buffer.data.len(),
            });
        }
        buffer.data[..byte_size].copy_from_slice(&array.as_bytes()[..byte_size]);
        Ok(())
    }
}

fn to_dim(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock_host::MockResponse;
    use crate::tensor::NativeArray;

    fn outputs(specs: &[(&str, DataType)]) -> Vec<OutputDescriptor> {
        specs
            .iter()
            .map(|(name, dtype)| OutputDescriptor {
                name: name.to_string(),
                dtype: *dtype,
            })
            .collect()
    }

    #[test]
    fn test_write_copies_bytes_verbatim() {
        let descriptors = outputs(&[("price", DataType::Fp64), ("user", DataType::Int64)]);
        let columns = ColumnTypeMap::default();
        let inference = InferenceResponse::success(vec![
            OutputTensor::new("user", NativeArray::from_slice(vec![2], &[7i64, 9]).unwrap()),
            OutputTensor::new("price", NativeArray::from_slice(vec![2], &[1.5f64, -2.0]).unwrap()),
        ]);

        let mut response = MockResponse::new("r1", MemoryType::Cpu);
        ResponseWriter::new(&descriptors, &columns)
            .write(&mut response, &inference)
            .unwrap();

        let written = response.outputs();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].name, "price");
        assert_eq!(written[0].shape, vec![2, 1]);
        assert_eq!(written[0].data, inference.output("price").unwrap().array.as_bytes());
        assert_eq!(written[1].name, "user");
        assert_eq!(written[1].dtype, DataType::Int64);
    }

    #[test]
    fn test_multi_hot_width_follows_elements_per_row() {
        let descriptors = outputs(&[("genres", DataType::Int32)]);
        let columns = ColumnTypeMap::default();
        let array = NativeArray::from_slice(vec![6], &[1i32, 2, 3, 4, 5, 6]).unwrap();
        let inference = InferenceResponse::success(vec![OutputTensor::new("genres", array).with_rows(2)]);

        let mut response = MockResponse::new("r1", MemoryType::Cpu);
        ResponseWriter::new(&descriptors, &columns)
            .write(&mut response, &inference)
            .unwrap();
        assert_eq!(response.outputs()[0].shape, vec![2, 3]);
        assert_eq!(response.outputs()[0].data.len(), 24);
    }

    #[test]
    fn test_categorical_width_is_always_one() {
        let descriptors = outputs(&[("user", DataType::Int64)]);
        let columns: ColumnTypeMap = [("user", true)].into_iter().collect();

        for rows in [1usize, 3, 4] {
            let array = NativeArray::from_slice(vec![8], &[1i64, 2, 3, 4, 5, 6, 7, 8]).unwrap();
            let inference = InferenceResponse::success(vec![OutputTensor::new("user", array).with_rows(rows)]);
            let mut response = MockResponse::new("r1", MemoryType::Cpu);
            ResponseWriter::new(&descriptors, &columns)
                .write(&mut response, &inference)
                .unwrap();

            let written = &response.outputs()[0];
            assert_eq!(written.shape, vec![rows as i64, 1]);
            assert_eq!(written.data.len(), rows * 8);
        }
    }

    #[test]
    fn test_fp16_and_string_outputs_are_unsupported() {
        let columns = ColumnTypeMap::default();
        let array = NativeArray::from_slice(vec![1], &[1u8]).unwrap();
        let output = OutputTensor::new("y", array);

        for dtype in [DataType::Fp16, DataType::Bytes] {
            let descriptors = outputs(&[("y", dtype)]);
            let mut response = MockResponse::new("r1", MemoryType::Cpu);
            let err = ResponseWriter::new(&descriptors, &columns)
                .write_output(&mut response, &descriptors[0], &output)
                .unwrap_err();
            assert!(matches!(err, BackendError::UnsupportedDType(_)));
            assert!(response.outputs().is_empty());
        }
    }

    #[test]
    fn test_gpu_output_buffer_is_rejected() {
        let descriptors = outputs(&[("y", DataType::Fp32)]);
        let columns = ColumnTypeMap::default();
        let inference = InferenceResponse::success(vec![OutputTensor::new(
            "y",
            NativeArray::from_slice(vec![1], &[1f32]).unwrap(),
        )]);

        let mut response = MockResponse::new("r1", MemoryType::Gpu);
        let err = ResponseWriter::new(&descriptors, &columns)
            .write(&mut response, &inference)
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::UnsupportedMemory {
                tensor: "output 'y'".to_string(),
                memory: MemoryType::Gpu
            }
        );
    }

    #[test]
    fn test_dtype_mismatch() {
        let descriptors = outputs(&[("y", DataType::Int64)]);
        let columns = ColumnTypeMap::default();
        let inference = InferenceResponse::success(vec![OutputTensor::new(
            "y",
            NativeArray::from_slice(vec![1], &[1i32]).unwrap(),
        )]);

        let mut response = MockResponse::new("r1", MemoryType::Cpu);
        let err = ResponseWriter::new(&descriptors, &columns)
            .write(&mut response, &inference)
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::OutputDTypeMismatch {
                name: "y".to_string(),
                expected: DataType::Int64,
                actual: "<i4".to_string()
            }
        );
    }

    #[test]
    fn test_absurd_row_counts_are_size_mismatches() {
        let descriptors = outputs(&[("user", DataType::Int64)]);
        let array = NativeArray::from_slice(vec![2], &[1i64, 2]).unwrap();
        let output = OutputTensor::new("user", array).with_rows(usize::MAX / 2);

        let categorical: ColumnTypeMap = [("user", true)].into_iter().collect();
        let continuous = ColumnTypeMap::default();
        for columns in [&categorical, &continuous] {
            let mut response = MockResponse::new("r1", MemoryType::Cpu);
            let err = ResponseWriter::new(&descriptors, columns)
                .write_output(&mut response, &descriptors[0], &output)
                .unwrap_err();
            assert_eq!(
                err,
                BackendError::OutputSizeMismatch {
                    name: "user".to_string(),
                    expected: usize::MAX,
                    actual: 16
                }
            );
            assert!(response.outputs().is_empty());
        }
    }

    #[test]
    fn test_missing_and_short_outputs() {
        let descriptors = outputs(&[("y", DataType::Fp32)]);
        let columns = ColumnTypeMap::default();

        let mut response = MockResponse::new("r1", MemoryType::Cpu);
        let err = ResponseWriter::new(&descriptors, &columns)
            .write(&mut response, &InferenceResponse::success(vec![]))
            .unwrap_err();
        assert_eq!(err, BackendError::MissingOutput("y".to_string()));

        // five elements cannot be laid out over two rows
        let array = NativeArray::from_slice(vec![5], &[0f32; 5]).unwrap();
        let inference = InferenceResponse::success(vec![OutputTensor::new("y", array).with_rows(2)]);
        let err = ResponseWriter::new(&descriptors, &columns)
            .write(&mut response, &inference)
            .unwrap_err();
        assert!(matches!(err, BackendError::OutputSizeMismatch { .. }));
    }
}
