use super::dtype::{DataType, MemoryType};
use crate::error::{BackendError, Result};

/// Name, dtype, shape and residency of one host tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    pub name: String,
    pub dtype: DataType,
    pub shape: Vec<i64>,
    pub memory: MemoryType,
}

impl TensorDescriptor {
    /// Shape as `usize`, rejecting empty shapes and negative dimensions.
    pub fn dims(&self) -> Result<Vec<usize>> {
        if self.shape.is_empty() {
            return Err(BackendError::InvalidInput {
                input: self.name.clone(),
                reason: "rank 0 tensors are not supported".to_string(),
            });
        }
        self.shape
            .iter()
            .map(|dim| {
                usize::try_from(*dim).map_err(|_| BackendError::InvalidInput {
                    input: self.name.clone(),
                    reason: format!("negative dimension in shape {:?}", self.shape),
                })
            })
            .collect()
    }
}

/// Non-owning view over the single CPU buffer backing one host input.
///
/// The view borrows host memory and cannot outlive the request it came from.
#[derive(Debug, Clone)]
pub struct TensorView<'a> {
    descriptor: TensorDescriptor,
    dims: Vec<usize>,
    element_count: usize,
    data: &'a [u8],
}

impl<'a> TensorView<'a> {
    /// Validates that the tensor is backed by exactly one buffer, that the
    /// buffer is CPU resident, and that the element count of its shape fits
    /// in a `usize`.
    pub fn new(descriptor: TensorDescriptor, buffer_count: u32, data: &'a [u8]) -> Result<Self> {
        if buffer_count != 1 {
            return Err(BackendError::UnsupportedBufferLayout {
                input: descriptor.name,
                buffer_count,
            });
        }
        if descriptor.memory != MemoryType::Cpu {
            return Err(BackendError::UnsupportedMemory {
                tensor: format!("input '{}'", descriptor.name),
                memory: descriptor.memory,
            });
        }
        let dims = descriptor.dims()?;
        let element_count = dims
            .iter()
            .try_fold(1usize, |count, dim| count.checked_mul(*dim))
            .ok_or_else(|| BackendError::InvalidInput {
                input: descriptor.name.clone(),
                reason: format!("element count of shape {:?} overflows", descriptor.shape),
            })?;
        Ok(Self {
            descriptor,
            dims,
            element_count,
            data,
        })
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn dtype(&self) -> DataType {
        self.descriptor.dtype
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn byte_length(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(memory: MemoryType, shape: Vec<i64>) -> TensorDescriptor {
        TensorDescriptor {
            name: "x".to_string(),
            dtype: DataType::Int32,
            shape,
            memory,
        }
    }

    #[test]
    fn test_view_over_single_cpu_buffer() {
        let raw = [0u8; 24];
        let view = TensorView::new(descriptor(MemoryType::Cpu, vec![3, 2]), 1, &raw).unwrap();
        assert_eq!(view.element_count(), 6);
        assert_eq!(view.byte_length(), 24);
        assert_eq!(view.dims(), &[3, 2]);
        assert_eq!(view.data().as_ptr(), raw.as_ptr());
    }

    #[test]
    fn test_split_buffers_are_rejected() {
        let err = TensorView::new(descriptor(MemoryType::Cpu, vec![1]), 2, &[0; 4]).unwrap_err();
        assert_eq!(
            err,
            BackendError::UnsupportedBufferLayout { input: "x".to_string(), buffer_count: 2 }
        );
    }

    #[test]
    fn test_gpu_buffers_are_rejected() {
        let err = TensorView::new(descriptor(MemoryType::Gpu, vec![1]), 1, &[0; 4]).unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedMemory { memory: MemoryType::Gpu, .. }));
    }

    #[test]
    fn test_bad_shapes_are_rejected() {
        assert!(TensorView::new(descriptor(MemoryType::Cpu, vec![]), 1, &[]).is_err());
        assert!(TensorView::new(descriptor(MemoryType::Cpu, vec![-1]), 1, &[]).is_err());
    }

    #[test]
    fn test_overflowing_element_count_is_rejected() {
        let err = TensorView::new(descriptor(MemoryType::Cpu, vec![1 << 62, 8]), 1, &[0; 8]).unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput { ref input, .. } if input == "x"));

        let view = TensorView::new(descriptor(MemoryType::Cpu, vec![i64::MAX]), 1, &[]).unwrap();
        assert_eq!(view.element_count(), i64::MAX as usize);
    }
}
