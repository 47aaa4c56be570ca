use std::fmt;

use super::constant::TEXT_CODE_UNIT;
use crate::error::{BackendError, Result};

/// Tensor element types understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Fp16,
    Fp32,
    Fp64,
    /// Variable-length strings, stored as length-prefixed byte records.
    Bytes,
}

impl DataType {
    /// Every dtype the host can describe, in host enumeration order.
    pub const ALL: [DataType; 13] = [
        DataType::Bool,
        DataType::Uint8,
        DataType::Uint16,
        DataType::Uint32,
        DataType::Uint64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Fp16,
        DataType::Fp32,
        DataType::Fp64,
        DataType::Bytes,
    ];

    /// Width of one element in bytes, `None` for variable-length strings.
    pub const fn byte_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 | Self::Fp16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Fp32 => Some(4),
            Self::Int64 | Self::Uint64 | Self::Fp64 => Some(8),
            Self::Bytes => None,
        }
    }

    /// Parses the `TYPE_*` spelling used by model configurations.
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "TYPE_BOOL" => Some(Self::Bool),
            "TYPE_UINT8" => Some(Self::Uint8),
            "TYPE_UINT16" => Some(Self::Uint16),
            "TYPE_UINT32" => Some(Self::Uint32),
            "TYPE_UINT64" => Some(Self::Uint64),
            "TYPE_INT8" => Some(Self::Int8),
            "TYPE_INT16" => Some(Self::Int16),
            "TYPE_INT32" => Some(Self::Int32),
            "TYPE_INT64" => Some(Self::Int64),
            "TYPE_FP16" => Some(Self::Fp16),
            "TYPE_FP32" => Some(Self::Fp32),
            "TYPE_FP64" => Some(Self::Fp64),
            "TYPE_STRING" => Some(Self::Bytes),
            _ => None,
        }
    }

    /// The `TYPE_*` spelling used by model configurations.
    pub const fn as_config_str(self) -> &'static str {
        match self {
            Self::Bool => "TYPE_BOOL",
            Self::Uint8 => "TYPE_UINT8",
            Self::Uint16 => "TYPE_UINT16",
            Self::Uint32 => "TYPE_UINT32",
            Self::Uint64 => "TYPE_UINT64",
            Self::Int8 => "TYPE_INT8",
            Self::Int16 => "TYPE_INT16",
            Self::Int32 => "TYPE_INT32",
            Self::Int64 => "TYPE_INT64",
            Self::Fp16 => "TYPE_FP16",
            Self::Fp32 => "TYPE_FP32",
            Self::Fp64 => "TYPE_FP64",
            Self::Bytes => "TYPE_STRING",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "BOOL",
            Self::Uint8 => "UINT8",
            Self::Uint16 => "UINT16",
            Self::Uint32 => "UINT32",
            Self::Uint64 => "UINT64",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Fp16 => "FP16",
            Self::Fp32 => "FP32",
            Self::Fp64 => "FP64",
            Self::Bytes => "BYTES",
        };
        f.write_str(name)
    }
}

/// Where a host buffer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryType {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("CPU"),
            Self::Gpu => f.write_str("GPU"),
        }
    }
}

/// Byte order tag of a native dtype descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// `<`
    Little,
    /// `|`, single-byte types with no meaningful order
    NotApplicable,
}

impl ByteOrder {
    pub const fn as_char(self) -> char {
        match self {
            Self::Little => '<',
            Self::NotApplicable => '|',
        }
    }
}

/// The runtime's dtype descriptor: a kind character, an item size in bytes
/// and a byte order, printed as an array-interface typestr such as `<i4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeDescriptor {
    kind: char,
    itemsize: usize,
    byteorder: ByteOrder,
}

impl NativeDescriptor {
    const fn new(kind: char, itemsize: usize, byteorder: ByteOrder) -> Self {
        Self { kind, itemsize, byteorder }
    }

    /// Fixed-width text holding `width` code units per element (`<U{width}`).
    pub const fn unicode(width: usize) -> Self {
        Self::new('U', width * TEXT_CODE_UNIT, ByteOrder::Little)
    }

    pub const fn kind(&self) -> char {
        self.kind
    }

    pub const fn itemsize(&self) -> usize {
        self.itemsize
    }

    pub const fn byteorder(&self) -> ByteOrder {
        self.byteorder
    }

    /// Array-interface typestr, e.g. `<f4`, `|b1` or `<U7`.
    ///
    /// Text types count code units rather than bytes.
    pub fn typestr(&self) -> String {
        let count = if self.kind == 'U' {
            self.itemsize / TEXT_CODE_UNIT
        } else {
            self.itemsize
        };
        format!("{}{}{}", self.byteorder.as_char(), self.kind, count)
    }

    /// Array-interface `descr`: a single unnamed field.
    pub fn descr(&self) -> Vec<(String, String)> {
        vec![(String::new(), self.typestr())]
    }
}

/// Maps a host dtype to the runtime's descriptor.
///
/// Strings have no fixed width and go through the string codec instead.
pub fn to_native_descriptor(dtype: DataType) -> Result<NativeDescriptor> {
    let descriptor = match dtype {
        DataType::Bool => NativeDescriptor::new('b', 1, ByteOrder::NotApplicable),
        DataType::Int8 => NativeDescriptor::new('i', 1, ByteOrder::Little),
        DataType::Int16 => NativeDescriptor::new('i', 2, ByteOrder::Little),
        DataType::Int32 => NativeDescriptor::new('i', 4, ByteOrder::Little),
        DataType::Int64 => NativeDescriptor::new('i', 8, ByteOrder::Little),
        DataType::Uint8 => NativeDescriptor::new('u', 1, ByteOrder::Little),
        DataType::Uint16 => NativeDescriptor::new('u', 2, ByteOrder::Little),
        DataType::Uint32 => NativeDescriptor::new('u', 4, ByteOrder::Little),
        DataType::Uint64 => NativeDescriptor::new('u', 8, ByteOrder::Little),
        DataType::Fp16 => NativeDescriptor::new('f', 2, ByteOrder::Little),
        DataType::Fp32 => NativeDescriptor::new('f', 4, ByteOrder::Little),
        DataType::Fp64 => NativeDescriptor::new('f', 8, ByteOrder::Little),
        DataType::Bytes => {
            return Err(BackendError::UnsupportedDType(
                "BYTES has no fixed-width native descriptor".to_string(),
            ));
        }
    };
    Ok(descriptor)
}

/// Maps a runtime kind/itemsize pair back to a host dtype.
pub fn from_native_descriptor(kind: char, itemsize: usize) -> Result<DataType> {
    let dtype = match (kind, itemsize) {
        ('b', 1) => DataType::Bool,
        ('i', 1) => DataType::Int8,
        ('i', 2) => DataType::Int16,
        ('i', 4) => DataType::Int32,
        ('i', 8) => DataType::Int64,
        ('u', 1) => DataType::Uint8,
        ('u', 2) => DataType::Uint16,
        ('u', 4) => DataType::Uint32,
        ('u', 8) => DataType::Uint64,
        ('f', 2) => DataType::Fp16,
        ('f', 4) => DataType::Fp32,
        ('f', 8) => DataType::Fp64,
        _ => {
            return Err(BackendError::UnsupportedDType(format!(
                "kind {kind} itemsize {itemsize}"
            )));
        }
    };
    Ok(dtype)
}
