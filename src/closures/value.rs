/*!
 * Value Types
 * The four primitive wire types and typed values
 */

use super::marshal::MarshalError;
use crate::core::limits::{TYPE_CODE_F32, TYPE_CODE_F64, TYPE_CODE_I32, TYPE_CODE_I64};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive wire type of a closure argument or result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ValueType {
    I32 = TYPE_CODE_I32,
    I64 = TYPE_CODE_I64,
    F32 = TYPE_CODE_F32,
    F64 = TYPE_CODE_F64,
}

impl ValueType {
    /// Natural byte width on the wire
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Guest wire code
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a guest wire code
    pub const fn from_code(code: u8) -> Result<Self, MarshalError> {
        match code {
            TYPE_CODE_I32 => Ok(Self::I32),
            TYPE_CODE_I64 => Ok(Self::I64),
            TYPE_CODE_F32 => Ok(Self::F32),
            TYPE_CODE_F64 => Ok(Self::F64),
            other => Err(MarshalError::UnknownTypeCode(other)),
        }
    }
}

impl TryFrom<u8> for ValueType {
    type Error = MarshalError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

/// A typed value carried in an argument or result buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    #[inline]
    pub const fn ty(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}
