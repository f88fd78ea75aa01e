/*!
 * System Limits and Constants
 *
 * Centralized location for closure table limits, wire codes, and guest memory sizing.
 * Organized by domain for maintainability and discoverability.
 *
 * ## Conventions
 * - Performance-critical constants are marked with [PERF]
 * - Security-critical constants are marked with [SECURITY]
 * - Values shared with the guest ABI are marked with [ABI]
 */

// =============================================================================
// CLOSURE TABLE LIMITS
// =============================================================================

/// Default number of closure slots the table may grow to
pub const DEFAULT_TABLE_CAPACITY: usize = 4096;

/// Restricted table capacity for untrusted guests
pub const RESTRICTED_TABLE_CAPACITY: usize = 64;

/// Hard ceiling on table capacity
/// Handles are `index + 1` stored in a u32, so the arena can never exceed this
pub const MAX_TABLE_CAPACITY: usize = (u32::MAX - 1) as usize;

/// Maximum size of the user payload copied into a signature (256 bytes)
/// [SECURITY] Bounds the per-slot copy made at prepare time
pub const MAX_USER_DATA: usize = 256;

/// Restricted user payload bound
pub const RESTRICTED_USER_DATA: usize = 32;

/// Maximum number of argument or result types in one signature
/// [SECURITY] Prevents unbounded allocation when parsing guest type lists
pub const MAX_SIGNATURE_ARITY: usize = 1024;

// =============================================================================
// GUEST MEMORY
// =============================================================================

/// Default guest linear memory size (1MB)
pub const DEFAULT_GUEST_MEMORY: usize = 1024 * 1024;

/// Restricted guest memory size (64KB, one wasm page)
pub const RESTRICTED_GUEST_MEMORY: usize = 64 * 1024;

/// Width of a guest handle written by `closure_allocate`
/// [ABI] Handles cross the boundary as little-endian u32
pub const HANDLE_WIDTH: usize = 4;

// =============================================================================
// VALUE TYPE WIRE CODES
// =============================================================================

/// [ABI] 32-bit integer
pub const TYPE_CODE_I32: u8 = 0;

/// [ABI] 64-bit integer
pub const TYPE_CODE_I64: u8 = 1;

/// [ABI] 32-bit float
pub const TYPE_CODE_F32: u8 = 2;

/// [ABI] 64-bit float
pub const TYPE_CODE_F64: u8 = 3;

// =============================================================================
// OBSERVABILITY
// =============================================================================

/// Boundary calls slower than this are logged at warn (10ms)
/// [PERF] Backing functions run synchronously on the caller's thread
pub const SLOW_SYSCALL_THRESHOLD_MS: u128 = 10;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Convert bytes to kilobytes
#[inline]
pub const fn bytes_to_kb(bytes: usize) -> usize {
    bytes / 1024
}
