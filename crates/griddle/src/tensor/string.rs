//! Codec for the host's variable-length string tensors.
//!
//! The host stores a string tensor as one record per element, each record
//! being a 4-byte little-endian length followed by that many UTF-8 bytes.
//! The runtime wants fixed-width text (`<U{n}`), so decoding scans the
//! records once for the widest element and then lays every element out
//! right-padded with zero code units to that width.

use thiserror::Error;

use super::constant::{STRING_LENGTH_PREFIX, TEXT_CODE_UNIT};
use super::dtype::NativeDescriptor;

/// Why a string tensor buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StringTensorError {
    #[error("truncated length prefix at byte {offset}")]
    TruncatedPrefix { offset: usize },

    #[error("record at byte {offset} declares {length} bytes but only {available} remain")]
    TruncatedRecord {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("record {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },

    #[error("expected {expected} records, found {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error("{elements} elements of width {width} do not fit in memory")]
    TooLarge { width: usize, elements: usize },

    #[error("record {index} is {length} bytes, longer than a length prefix can hold")]
    RecordTooLong { index: usize, length: usize },
}

/// Iterator over the raw records of a string tensor buffer.
pub struct Records<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<&'a [u8], StringTensorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buffer.len() {
            return None;
        }
        let rest = &self.buffer[self.offset..];
        if rest.len() < STRING_LENGTH_PREFIX {
            let offset = self.offset;
            self.offset = self.buffer.len();
            return Some(Err(StringTensorError::TruncatedPrefix { offset }));
        }
        let mut prefix = [0u8; STRING_LENGTH_PREFIX];
        prefix.copy_from_slice(&rest[..STRING_LENGTH_PREFIX]);
        let length = u32::from_le_bytes(prefix) as usize;
        let available = rest.len() - STRING_LENGTH_PREFIX;
        if length > available {
            let offset = self.offset;
            self.offset = self.buffer.len();
            return Some(Err(StringTensorError::TruncatedRecord { offset, length, available }));
        }
        let record = &rest[STRING_LENGTH_PREFIX..STRING_LENGTH_PREFIX + length];
        self.offset += STRING_LENGTH_PREFIX + length;
        Some(Ok(record))
    }
}

pub fn records(buffer: &[u8]) -> Records<'_> {
    Records { buffer, offset: 0 }
}

fn decoded(buffer: &[u8], element_count: usize) -> Result<Vec<&str>, StringTensorError> {
    // the shape is untrusted; every record takes at least a prefix
    let mut values = Vec::with_capacity(element_count.min(buffer.len() / STRING_LENGTH_PREFIX));
    for (index, record) in records(buffer).enumerate() {
        let record = record?;
        let value = std::str::from_utf8(record).map_err(|_| StringTensorError::InvalidUtf8 { index })?;
        values.push(value);
    }
    if values.len() != element_count {
        return Err(StringTensorError::CountMismatch {
            expected: element_count,
            found: values.len(),
        });
    }
    Ok(values)
}

/// Greatest decoded length, in characters, over all elements.
pub fn max_string_len(buffer: &[u8], element_count: usize) -> Result<usize, StringTensorError> {
    let values = decoded(buffer, element_count)?;
    Ok(values.iter().map(|v| v.chars().count()).max().unwrap_or(0))
}

/// Decode into owned strings.
pub fn decode_strings(buffer: &[u8], element_count: usize) -> Result<Vec<String>, StringTensorError> {
    Ok(decoded(buffer, element_count)?
        .into_iter()
        .map(str::to_owned)
        .collect())
}

/// Decode into a fixed-width text buffer as wide as the widest element.
pub fn decode_fixed_width(buffer: &[u8], element_count: usize) -> Result<StringTensorBuffer, StringTensorError> {
    let values = decoded(buffer, element_count)?;
    let width = values.iter().map(|v| v.chars().count()).max().unwrap_or(0);
    let too_large = || StringTensorError::TooLarge {
        width,
        elements: values.len(),
    };
    let stride = width.checked_mul(TEXT_CODE_UNIT).ok_or_else(too_large)?;
    let total = stride.checked_mul(values.len()).ok_or_else(too_large)?;
    let mut data = Vec::new();
    data.try_reserve_exact(total).map_err(|_| too_large())?;
    data.resize(total, 0);
    for (slot, value) in data.chunks_exact_mut(stride.max(1)).zip(&values) {
        for (unit, ch) in slot.chunks_exact_mut(TEXT_CODE_UNIT).zip(value.chars()) {
            unit.copy_from_slice(&u32::from(ch).to_le_bytes());
        }
    }
    Ok(StringTensorBuffer {
        width,
        element_count: values.len(),
        data,
    })
}

/// Encode strings in the host's length-prefixed record format.
pub fn encode<S: AsRef<str>>(values: &[S]) -> Result<Vec<u8>, StringTensorError> {
    let total: usize = values
        .iter()
        .map(|v| STRING_LENGTH_PREFIX.saturating_add(v.as_ref().len()))
        .fold(0, usize::saturating_add);
    let mut out = Vec::new();
    out.try_reserve(total).map_err(|_| StringTensorError::TooLarge {
        width: total,
        elements: values.len(),
    })?;
    for (index, value) in values.iter().enumerate() {
        let bytes = value.as_ref().as_bytes();
        out.extend_from_slice(&length_prefix(index, bytes.len())?);
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

fn length_prefix(index: usize, length: usize) -> Result<[u8; STRING_LENGTH_PREFIX], StringTensorError> {
    u32::try_from(length)
        .map(u32::to_le_bytes)
        .map_err(|_| StringTensorError::RecordTooLong { index, length })
}

/// Fixed-width text materialized from one string input.
///
/// Owned by the adapted request and dropped once the batch's transform call
/// has returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTensorBuffer {
    width: usize,
    element_count: usize,
    data: Vec<u8>,
}

impl StringTensorBuffer {
    /// Code units per element.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    pub fn descriptor(&self) -> NativeDescriptor {
        NativeDescriptor::unicode(self.width)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Element `index` with its padding stripped.
    pub fn get(&self, index: usize) -> Option<String> {
        if index >= self.element_count {
            return None;
        }
        let stride = self.width * TEXT_CODE_UNIT;
        let slot = &self.data[index * stride..(index + 1) * stride];
        Some(
            slot.chunks_exact(TEXT_CODE_UNIT)
                .map(|unit| u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]))
                .take_while(|code| *code != 0)
                .filter_map(char::from_u32)
                .collect(),
        )
    }
}
