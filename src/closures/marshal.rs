/*!
 * Marshaling Engine
 *
 * The packing law shared by argument and result buffers:
 * - values are laid out back-to-back in declared order
 * - each value takes its type's natural width (i32/f32 = 4, i64/f64 = 8)
 * - little-endian, no padding between values
 * - a buffer is valid for a type list only if its length is exactly the sum of widths
 *
 * Nothing here calls anything; the dispatch engine uses the widths to validate
 * call shape and backing functions use encode/decode to interpret the bytes.
 */

use super::value::{Value, ValueType};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marshaling errors
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum MarshalError {
    #[error("Unrecognized value type code: {0}")]
    UnknownTypeCode(u8),

    #[error("Buffer length {actual} does not match signature width {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Value {index} is {actual}, signature declares {expected}")]
    TypeMismatch {
        index: usize,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Got {actual} values, signature declares {expected}")]
    ArityMismatch { expected: usize, actual: usize },
}

/// Sum of natural widths for a type list
#[inline]
pub fn byte_width(types: &[ValueType]) -> usize {
    types.iter().map(|ty| ty.width()).sum()
}

/// Parse a list of guest wire codes; all-or-nothing
pub fn parse_type_codes(codes: &[u8]) -> Result<Vec<ValueType>, MarshalError> {
    codes.iter().map(|code| ValueType::from_code(*code)).collect()
}

/// Pack values in order
pub fn encode(values: &[Value]) -> Bytes {
    let mut buf = BytesMut::with_capacity(values.iter().map(|v| v.ty().width()).sum());
    for value in values {
        put_value(&mut buf, value);
    }
    buf.freeze()
}

/// Pack values after checking them against a declared type list
pub fn encode_as(types: &[ValueType], values: &[Value]) -> Result<Bytes, MarshalError> {
    check_shape(types, values)?;
    Ok(encode(values))
}

/// Pack values into an exactly-sized buffer
///
/// Nothing is written unless the values match `types` and `out` has exactly
/// the declared width.
pub fn write_values(
    types: &[ValueType],
    values: &[Value],
    out: &mut [u8],
) -> Result<(), MarshalError> {
    check_shape(types, values)?;
    let expected = byte_width(types);
    if out.len() != expected {
        return Err(MarshalError::LengthMismatch {
            expected,
            actual: out.len(),
        });
    }

    let mut cursor = &mut out[..];
    for value in values {
        put_value(&mut cursor, value);
    }
    Ok(())
}

/// Unpack a buffer according to a type list
pub fn decode(types: &[ValueType], bytes: &[u8]) -> Result<Vec<Value>, MarshalError> {
    let expected = byte_width(types);
    if bytes.len() != expected {
        return Err(MarshalError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let mut cursor = bytes;
    let values = types
        .iter()
        .map(|ty| match ty {
            ValueType::I32 => Value::I32(cursor.get_i32_le()),
            ValueType::I64 => Value::I64(cursor.get_i64_le()),
            ValueType::F32 => Value::F32(cursor.get_f32_le()),
            ValueType::F64 => Value::F64(cursor.get_f64_le()),
        })
        .collect();
    debug_assert!(!cursor.has_remaining());
    Ok(values)
}

fn put_value<B: BufMut>(buf: &mut B, value: &Value) {
    match *value {
        Value::I32(v) => buf.put_i32_le(v),
        Value::I64(v) => buf.put_i64_le(v),
        Value::F32(v) => buf.put_f32_le(v),
        Value::F64(v) => buf.put_f64_le(v),
    }
}

fn check_shape(types: &[ValueType], values: &[Value]) -> Result<(), MarshalError> {
    if types.len() != values.len() {
        return Err(MarshalError::ArityMismatch {
            expected: types.len(),
            actual: values.len(),
        });
    }
    for (index, (expected, value)) in types.iter().zip(values).enumerate() {
        if value.ty() != *expected {
            return Err(MarshalError::TypeMismatch {
                index,
                expected: *expected,
                actual: value.ty(),
            });
        }
    }
    Ok(())
}
