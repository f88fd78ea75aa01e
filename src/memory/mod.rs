/*!
 * Memory Module
 * Guest linear memory addressed by guest pointers
 */

pub mod guest;
pub mod types;

// Re-export for convenience
pub use guest::GuestMemory;
pub use types::*;
