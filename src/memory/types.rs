/*!
 * Memory Types
 * Common types for guest memory access
 */

use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum MemoryError {
    #[error("Guest access out of bounds: 0x{address:x}+{len} exceeds memory of {memory_size} bytes")]
    OutOfBounds {
        address: Address,
        len: Size,
        memory_size: Size,
    },
}

impl MemoryError {
    /// Faulting guest address
    pub fn address(&self) -> Address {
        match self {
            Self::OutOfBounds { address, .. } => *address,
        }
    }

    /// Length of the rejected access
    pub fn access_len(&self) -> Size {
        match self {
            Self::OutOfBounds { len, .. } => *len,
        }
    }
}

/// Guest memory statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub size: Size,
    pub bytes_read: u64,
    pub bytes_written: u64,
}
