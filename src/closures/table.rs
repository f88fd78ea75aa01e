/*!
 * Closure Table
 *
 * Arena of tagged slots with a free list. Handles are arena indices plus one,
 * never addresses; the table owns every slot's contents.
 *
 * ## Locking
 *
 * - `pool` (Mutex): free list and live count. Held only for O(1) bookkeeping,
 *   never across a backing call.
 * - `slots` (RwLock): the arena vector. Written only when the arena grows.
 * - per-slot RwLock: exclusive for allocate/prepare/free, shared for invoke.
 *
 * Lock order is `pool` → `slots` → slot. `free` takes the slot lock first and
 * releases it before touching `pool`, so a free waiting on an in-flight call
 * never blocks allocation.
 */

use super::signature::Signature;
use super::types::{ClosureError, ClosureHandle, ClosureResult, ClosureState, ClosureStats};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// One arena entry
#[derive(Default)]
pub(super) struct Slot {
    pub(super) state: ClosureState,
    pub(super) signature: Option<Arc<Signature>>,
}

impl Slot {
    fn reset(&mut self) {
        self.state = ClosureState::Free;
        self.signature = None;
    }
}

pub(super) type SlotRef = Arc<RwLock<Slot>>;

#[derive(Default)]
struct SlotPool {
    free: Vec<u32>,
    live: usize,
}

/// Process-wide closure table
///
/// # Performance
/// - O(1) allocate and free
pub struct ClosureTable {
    pool: Mutex<SlotPool>,
    slots: RwLock<Vec<SlotRef>>,
    capacity: usize,
    pub(super) max_user_data: usize,
    pub(super) invocations: AtomicU64,
    pub(super) prepares: AtomicU64,
}

impl ClosureTable {
    pub fn new(capacity: usize, max_user_data: usize) -> Self {
        info!(
            capacity,
            max_user_data, "Closure table initialized with free-list arena"
        );
        Self {
            pool: Mutex::new(SlotPool::default()),
            slots: RwLock::new(Vec::new()),
            capacity,
            max_user_data,
            invocations: AtomicU64::new(0),
            prepares: AtomicU64::new(0),
        }
    }

    /// Issue a fresh handle in the `Allocated` state
    ///
    /// Reuses a freed slot when one exists, otherwise grows the arena.
    /// The slot is marked `Allocated` before the pool lock is released, so no
    /// two callers can ever be handed the same live handle.
    pub fn allocate(&self) -> ClosureResult<ClosureHandle> {
        let mut pool = self.pool.lock();

        let index = match pool.free.pop() {
            Some(index) => {
                let slot = self.slot_at(index as usize).ok_or_else(|| {
                    ClosureError::Internal(format!("free list names missing slot {}", index))
                })?;
                slot.write().state = ClosureState::Allocated;
                index
            }
            None => {
                let mut slots = self.slots.write();
                if slots.len() >= self.capacity {
                    debug!(capacity = self.capacity, "Closure table exhausted");
                    return Err(ClosureError::ResourceExhausted {
                        capacity: self.capacity,
                    });
                }
                slots.push(Arc::new(RwLock::new(Slot {
                    state: ClosureState::Allocated,
                    signature: None,
                })));
                (slots.len() - 1) as u32
            }
        };

        pool.live += 1;
        let handle = ClosureHandle::from_index(index);
        trace!(handle = %handle, live = pool.live, "Allocated closure");
        Ok(handle)
    }

    /// Release a live handle and clear its signature
    ///
    /// Waits for invocations in flight on the same handle to finish. Called
    /// from inside that handle's own invocation it fails with `Busy`.
    pub fn free(&self, handle: ClosureHandle) -> ClosureResult<()> {
        let slot = self
            .slot(handle)
            .ok_or_else(|| ClosureError::invalid_handle(handle))?;
        if self.in_flight_here(handle) {
            return Err(ClosureError::busy(handle));
        }

        {
            let mut guard = slot.write();
            if !guard.state.is_live() {
                return Err(ClosureError::invalid_handle(handle));
            }
            guard.reset();
        }

        let mut pool = self.pool.lock();
        pool.free.push(handle.index() as u32);
        pool.live -= 1;
        trace!(handle = %handle, live = pool.live, "Freed closure");
        Ok(())
    }

    /// Current lifecycle state, `None` for values never issued
    pub fn state(&self, handle: ClosureHandle) -> Option<ClosureState> {
        self.slot(handle).map(|slot| slot.read_recursive().state)
    }

    /// Signature currently attached to a prepared handle
    pub fn signature(&self, handle: ClosureHandle) -> Option<Arc<Signature>> {
        self.slot(handle)
            .and_then(|slot| slot.read_recursive().signature.clone())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest user payload a signature may carry
    pub fn max_user_data(&self) -> usize {
        self.max_user_data
    }

    /// Number of allocated or prepared handles
    pub fn live(&self) -> usize {
        self.pool.lock().live
    }

    /// Free every live handle; returns how many were released
    ///
    /// Like `free`, each slot is reset under its own lock before the pool is
    /// touched, so teardown never holds the pool lock while waiting on a call.
    /// Closures executing on the calling thread are skipped.
    pub fn clear(&self) -> usize {
        let slots = self.snapshot();
        let mut released = Vec::new();

        for (index, slot) in slots.iter().enumerate() {
            if self.in_flight_here(ClosureHandle::from_index(index as u32)) {
                debug!(index, "Skipping closure executing on this thread");
                continue;
            }
            let mut guard = slot.write();
            if guard.state.is_live() {
                guard.reset();
                released.push(index as u32);
            }
        }

        let mut pool = self.pool.lock();
        pool.live -= released.len();
        pool.free.extend_from_slice(&released);
        info!(released = released.len(), "Closure table cleared");
        released.len()
    }

    pub fn stats(&self) -> ClosureStats {
        let slots = self.snapshot();
        let prepared = slots
            .iter()
            .filter(|slot| slot.read_recursive().state == ClosureState::Prepared)
            .count();

        let pool = self.pool.lock();
        ClosureStats {
            capacity: self.capacity,
            arena_size: slots.len(),
            live: pool.live,
            prepared,
            free_slots: pool.free.len(),
            invocations: self.invocations.load(Ordering::Relaxed),
            prepares: self.prepares.load(Ordering::Relaxed),
        }
    }

    fn snapshot(&self) -> Vec<SlotRef> {
        self.slots.read().clone()
    }

    #[inline]
    pub(super) fn slot(&self, handle: ClosureHandle) -> Option<SlotRef> {
        self.slot_at(handle.index())
    }

    #[inline]
    fn slot_at(&self, index: usize) -> Option<SlotRef> {
        self.slots.read().get(index).cloned()
    }
}
