/*!
 * Guest Linear Memory
 * Bounds-checked byte storage addressed by guest pointers
 */

use super::types::{MemoryError, MemoryResult, MemoryStats};
use crate::core::types::{Address, GuestPtr, Size};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Guest linear memory
///
/// Every access is checked against the memory size before any byte is
/// touched, so a rejected access never leaves a partial write behind.
///
/// # Performance
/// - RwLock so concurrent guest reads do not contend
/// - Cheap to clone (shared storage)
#[derive(Clone)]
pub struct GuestMemory {
    bytes: Arc<RwLock<Vec<u8>>>,
    bytes_read: Arc<AtomicU64>,
    bytes_written: Arc<AtomicU64>,
}

impl GuestMemory {
    /// Create zeroed guest memory of the given size
    pub fn new(size: Size) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(vec![0u8; size])),
            bytes_read: Arc::new(AtomicU64::new(0)),
            bytes_written: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn size(&self) -> Size {
        self.bytes.read().len()
    }

    /// Check that `[ptr, ptr + len)` lies inside memory
    pub fn check_range(&self, ptr: GuestPtr, len: Size) -> MemoryResult<()> {
        let size = self.size();
        resolve(ptr, len, size).map(|_| ())
    }

    /// Copy `len` bytes out of guest memory
    pub fn read_bytes(&self, ptr: GuestPtr, len: Size) -> MemoryResult<Vec<u8>> {
        let memory = self.bytes.read();
        let range = resolve(ptr, len, memory.len())?;
        self.bytes_read.fetch_add(len as u64, Ordering::Relaxed);
        trace!(ptr, len, "guest read");
        Ok(memory[range].to_vec())
    }

    /// Copy `data` into guest memory
    pub fn write_bytes(&self, ptr: GuestPtr, data: &[u8]) -> MemoryResult<()> {
        let mut memory = self.bytes.write();
        let range = resolve(ptr, data.len(), memory.len())?;
        memory[range].copy_from_slice(data);
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        trace!(ptr, len = data.len(), "guest write");
        Ok(())
    }

    pub fn read_u32(&self, ptr: GuestPtr) -> MemoryResult<u32> {
        let raw = self.read_bytes(ptr, 4)?;
        let mut le = [0u8; 4];
        le.copy_from_slice(&raw);
        Ok(u32::from_le_bytes(le))
    }

    pub fn write_u32(&self, ptr: GuestPtr, value: u32) -> MemoryResult<()> {
        self.write_bytes(ptr, &value.to_le_bytes())
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            size: self.size(),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

fn resolve(ptr: GuestPtr, len: Size, memory_size: Size) -> MemoryResult<std::ops::Range<usize>> {
    let start = ptr as Address;
    match start.checked_add(len) {
        Some(end) if end <= memory_size => Ok(start..end),
        _ => Err(MemoryError::OutOfBounds {
            address: start,
            len,
            memory_size,
        }),
    }
}
