/*!
 * Closures Module
 *
 * Dynamic closures for guest code: opaque handles that carry a runtime-declared
 * signature, a backing host function, and a user payload, invoked through a
 * packed little-endian calling convention.
 *
 * Lifecycle: allocate → prepare (repeatable) → invoke (any number of times) → free
 */

pub mod backing;
pub mod dispatch;
pub mod marshal;
mod registry;
pub mod signature;
pub mod table;
pub mod types;
pub mod value;

// Re-export public API
pub use backing::{BackingFunction, BackingRef, FunctionTable};
pub use dispatch::CallContext;
pub use marshal::{byte_width, decode, encode, encode_as, write_values, MarshalError};
pub use signature::Signature;
pub use table::ClosureTable;
pub use types::{
    BackingId, ClosureError, ClosureHandle, ClosureResult, ClosureState, ClosureStats,
};
pub use value::{Value, ValueType};
