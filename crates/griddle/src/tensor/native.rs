use std::borrow::Cow;

use super::constant::ARRAY_INTERFACE_VERSION;
use super::dtype::{from_native_descriptor, to_native_descriptor, DataType, NativeDescriptor};
use crate::error::{BackendError, Result};

/// A fixed-width element that can be laid out in a native array.
pub trait Element: Copy {
    const DTYPE: DataType;

    /// Append the little-endian bytes of `self`.
    fn extend_le(&self, out: &mut Vec<u8>);

    /// Read one element from exactly `DTYPE.byte_size()` little-endian bytes.
    fn from_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {$(
        impl Element for $ty {
            const DTYPE: DataType = DataType::$dtype;

            fn extend_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn from_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }
        }
    )*};
}

impl_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Fp32,
    f64 => Fp64,
);

impl Element for bool {
    const DTYPE: DataType = DataType::Bool;

    fn extend_le(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn from_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// An array in the runtime's native representation: a dtype descriptor, a
/// shape and the raw little-endian bytes.
///
/// Inputs borrow host memory (or a materialized string buffer) for the
/// duration of one batch. Outputs own their bytes so nothing produced under
/// the interpreter gate refers back into the runtime once the gate is released.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeArray<'a> {
    descriptor: NativeDescriptor,
    shape: Vec<usize>,
    data: Cow<'a, [u8]>,
}

impl<'a> NativeArray<'a> {
    /// Zero-copy view over `data`.
    pub fn borrowed(descriptor: NativeDescriptor, shape: Vec<usize>, data: &'a [u8]) -> Self {
        Self {
            descriptor,
            shape,
            data: Cow::Borrowed(data),
        }
    }

    pub fn owned(descriptor: NativeDescriptor, shape: Vec<usize>, data: Vec<u8>) -> NativeArray<'static> {
        NativeArray {
            descriptor,
            shape,
            data: Cow::Owned(data),
        }
    }

    /// Owned array from raw bytes of a fixed-width host dtype.
    pub fn from_dtype(dtype: DataType, shape: Vec<usize>, data: Vec<u8>) -> Result<NativeArray<'static>> {
        Ok(NativeArray::owned(to_native_descriptor(dtype)?, shape, data))
    }

    /// Owned array laid out from typed values.
    pub fn from_slice<T: Element>(shape: Vec<usize>, values: &[T]) -> Result<NativeArray<'static>> {
        let mut data = Vec::with_capacity(std::mem::size_of_val(values));
        for value in values {
            value.extend_le(&mut data);
        }
        NativeArray::from_dtype(T::DTYPE, shape, data)
    }

    pub fn descriptor(&self) -> &NativeDescriptor {
        &self.descriptor
    }

    pub fn typestr(&self) -> String {
        self.descriptor.typestr()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements implied by the shape.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the backing bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Host dtype of this array, if its descriptor is one of the fixed-width kinds.
    pub fn dtype(&self) -> Result<DataType> {
        from_native_descriptor(self.descriptor.kind(), self.descriptor.itemsize())
    }

    /// Decode the elements as `T`, which must match the array's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let dtype = self.dtype()?;
        if dtype != T::DTYPE {
            return Err(BackendError::UnsupportedDType(format!(
                "cannot read {} array as {}",
                dtype,
                T::DTYPE
            )));
        }
        let width = self.descriptor.itemsize();
        Ok(self.data.chunks_exact(width).map(T::from_le).collect())
    }

    pub fn into_owned(self) -> NativeArray<'static> {
        NativeArray {
            descriptor: self.descriptor,
            shape: self.shape,
            data: Cow::Owned(self.data.into_owned()),
        }
    }

    /// The array-interface description handed to the transform.
    pub fn interface(&self) -> ArrayInterface<'_> {
        ArrayInterface {
            shape: self.shape.clone(),
            typestr: self.descriptor.typestr(),
            descr: self.descriptor.descr(),
            data: &self.data,
            read_only: false,
            version: ARRAY_INTERFACE_VERSION,
        }
    }
}

/// Version 3 array interface: enough for the runtime to wrap the bytes in
/// its own array type without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInterface<'a> {
    pub shape: Vec<usize>,
    pub typestr: String,
    pub descr: Vec<(String, String)>,
    pub data: &'a [u8],
    pub read_only: bool,
    pub version: u32,
}
