/*!
 * Closure Host Library
 * Dynamic closures for guest code: allocation, signatures, marshaling, and dispatch
 */

pub mod closures;
pub mod core;
pub mod memory;
pub mod monitoring;
pub mod runtime;
pub mod syscalls;

// Re-exports
pub use closures::{
    BackingFunction, BackingId, CallContext, ClosureError, ClosureHandle, ClosureResult,
    ClosureState, ClosureStats, ClosureTable, FunctionTable, Signature, Value, ValueType,
};
pub use crate::core::RuntimeConfig;
pub use memory::{GuestMemory, MemoryError};
pub use monitoring::init_tracing;
pub use runtime::{ClosureRuntime, ClosureRuntimeBuilder};
pub use syscalls::Errno;
