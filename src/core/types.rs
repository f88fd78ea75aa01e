/*!
 * Core Types
 * Common types used across the runtime
 */

/// Address type for host-side memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Guest pointer (offset into 32-bit linear memory)
pub type GuestPtr = u32;

/// Guest-side length argument
pub type GuestLen = u32;
