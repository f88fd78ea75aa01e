/*!
 * Errno
 * Numeric status codes returned across the guest boundary
 */

use crate::closures::ClosureError;
use crate::memory::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// WASI preview1 errno subset used by the closure syscalls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Errno {
    /// No error
    Success = 0,
    /// Handle unknown, free, or not prepared
    Badf = 8,
    /// Closure is executing on this thread
    Busy = 10,
    /// Guest pointer outside memory
    Fault = 21,
    /// Malformed request
    Inval = 28,
    /// Backing function failed
    Io = 29,
    /// Table exhausted
    Nomem = 48,
}

impl Errno {
    /// Raw value handed back to the guest
    #[inline]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Errno::Success => write!(f, "success"),
            Errno::Badf => write!(f, "bad handle"),
            Errno::Busy => write!(f, "device or resource busy"),
            Errno::Fault => write!(f, "bad address"),
            Errno::Inval => write!(f, "invalid argument"),
            Errno::Io => write!(f, "I/O error"),
            Errno::Nomem => write!(f, "not enough space"),
        }
    }
}

impl From<&ClosureError> for Errno {
    fn from(err: &ClosureError) -> Self {
        match err {
            ClosureError::InvalidHandle(_) => Errno::Badf,
            ClosureError::InvalidArgument(_) => Errno::Inval,
            ClosureError::ResourceExhausted { .. } => Errno::Nomem,
            ClosureError::MemoryAccessViolation { .. } => Errno::Fault,
            ClosureError::Busy(_) => Errno::Busy,
            ClosureError::Internal(_) => Errno::Io,
        }
    }
}

impl From<ClosureError> for Errno {
    fn from(err: ClosureError) -> Self {
        Errno::from(&err)
    }
}

impl From<MemoryError> for Errno {
    fn from(_: MemoryError) -> Self {
        Errno::Fault
    }
}
