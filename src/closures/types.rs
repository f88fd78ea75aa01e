/*!
 * Closure Types
 * Handles, lifecycle states, errors, and statistics for the closure table
 */

use super::marshal::MarshalError;
use crate::memory::MemoryError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closure operation result
pub type ClosureResult<T> = Result<T, ClosureError>;

/// Opaque closure handle
///
/// Non-zero; the raw value is the arena index plus one. A handle is only
/// meaningful while live; after free the same value may be issued again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClosureHandle(u32);

impl ClosureHandle {
    /// Interpret a raw guest value; zero is never a handle
    #[inline]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(super) const fn from_index(index: u32) -> Self {
        Self(index + 1)
    }

    #[inline]
    pub(super) const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for ClosureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a host backing function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackingId(pub u32);

impl fmt::Display for BackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureState {
    #[default]
    Free,
    Allocated,
    Prepared,
}

impl ClosureState {
    /// Slot is owned by a caller (allocated or prepared)
    #[inline]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Closure errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ClosureError {
    #[error("Invalid closure handle: {0}")]
    #[diagnostic(
        code(closure::invalid_handle),
        help("The handle was never allocated, has been freed, or is not prepared yet.")
    )]
    InvalidHandle(u32),

    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(closure::invalid_argument),
        help("Check type codes and that buffer lengths match the prepared signature.")
    )]
    InvalidArgument(String),

    #[error("Closure table exhausted: all {capacity} slots are live")]
    #[diagnostic(
        code(closure::resource_exhausted),
        help("Free unused closures or raise CLOSURE_TABLE_CAPACITY.")
    )]
    ResourceExhausted { capacity: usize },

    #[error("Memory access violation at 0x{address:x} ({len} bytes)")]
    #[diagnostic(
        code(closure::memory_access_violation),
        help("A guest pointer does not resolve to addressable memory of the required size.")
    )]
    MemoryAccessViolation { address: usize, len: usize },

    #[error("Closure {0} is executing on this thread")]
    #[diagnostic(
        code(closure::busy),
        help("A backing function cannot free or prepare its own closure; do it after the call returns.")
    )]
    Busy(u32),

    #[error("Backing function failed: {0}")]
    #[diagnostic(
        code(closure::internal),
        help("The host backing function reported an error; see its logs.")
    )]
    Internal(String),
}

impl ClosureError {
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn busy(handle: ClosureHandle) -> Self {
        Self::Busy(handle.raw())
    }

    #[inline]
    pub fn invalid_handle(handle: ClosureHandle) -> Self {
        Self::InvalidHandle(handle.raw())
    }
}

impl From<MarshalError> for ClosureError {
    fn from(err: MarshalError) -> Self {
        ClosureError::InvalidArgument(err.to_string())
    }
}

impl From<MemoryError> for ClosureError {
    fn from(err: MemoryError) -> Self {
        ClosureError::MemoryAccessViolation {
            address: err.address(),
            len: err.access_len(),
        }
    }
}

/// Closure table statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClosureStats {
    /// Maximum number of slots
    pub capacity: usize,
    /// Slots created so far (high-water mark)
    pub arena_size: usize,
    /// Allocated or prepared handles
    pub live: usize,
    /// Prepared handles
    pub prepared: usize,
    /// Slots waiting on the free list
    pub free_slots: usize,
    /// Successful invocations since construction
    pub invocations: u64,
    /// Successful prepares since construction
    pub prepares: u64,
}
