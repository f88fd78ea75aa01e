/*!
 * Syscalls Module
 * Guest boundary for the closure runtime
 */

mod closure;
mod errno;

// Re-export public API
pub use errno::Errno;
