//! # Tensors
//!
//! Host-side tensor metadata and its translation into the embedded runtime's
//! native array representation.
//!
//! * [`dtype`] maps host dtypes to native descriptors and back
//! * [`string`] decodes the host's length-prefixed string tensors
//! * [`view`] wraps a single host buffer without copying it
//! * [`native`] is the array form the transform consumes and produces

pub mod constant;
pub mod dtype;
pub mod native;
pub mod string;
pub mod view;

pub use dtype::{
    from_native_descriptor,
    to_native_descriptor,
    ByteOrder,
    DataType,
    MemoryType,
    NativeDescriptor,
};
pub use native::{ArrayInterface, Element, NativeArray};
pub use string::{StringTensorBuffer, StringTensorError};
pub use view::{TensorDescriptor, TensorView};
