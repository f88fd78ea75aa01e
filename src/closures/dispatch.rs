/*!
 * Dispatch Engine
 *
 * Validates a call against the prepared signature and runs the backing
 * function synchronously on the caller's thread.
 */

use super::marshal::{decode, encode_as, write_values, MarshalError};
use super::signature::Signature;
use super::table::{ClosureTable, Slot};
use super::types::{ClosureError, ClosureHandle, ClosureResult, ClosureState};
use super::value::Value;
use std::cell::RefCell;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// What a backing function sees during one call
pub struct CallContext<'a> {
    handle: ClosureHandle,
    signature: &'a Signature,
    input: &'a [u8],
    output: &'a mut [u8],
    mode_flag: bool,
}

impl<'a> CallContext<'a> {
    pub fn handle(&self) -> ClosureHandle {
        self.handle
    }

    pub fn signature(&self) -> &Signature {
        self.signature
    }

    /// Raw argument bytes, exactly the declared argument width
    pub fn input(&self) -> &[u8] {
        self.input
    }

    /// Result buffer, exactly the declared result width
    pub fn output(&mut self) -> &mut [u8] {
        &mut *self.output
    }

    /// Payload copied at prepare time
    pub fn user_data(&self) -> &[u8] {
        self.signature.user_data()
    }

    /// Caller's mode flag, forwarded untouched
    pub fn mode_flag(&self) -> bool {
        self.mode_flag
    }

    /// Decode the input per the declared argument types
    pub fn arguments(&self) -> Result<Vec<Value>, MarshalError> {
        decode(self.signature.arguments(), self.input)
    }

    /// Pack results per the declared result types
    pub fn write_results(&mut self, values: &[Value]) -> Result<(), MarshalError> {
        write_values(self.signature.results(), values, &mut *self.output)
    }
}

thread_local! {
    /// Closures this thread is currently inside, keyed by table address
    static IN_FLIGHT: RefCell<Vec<(usize, u32)>> = RefCell::new(Vec::new());
}

/// Marks a closure as executing on the current thread until dropped
struct InFlight {
    key: (usize, u32),
}

impl InFlight {
    fn enter(table: &ClosureTable, handle: ClosureHandle) -> Self {
        let key = (table as *const ClosureTable as usize, handle.raw());
        IN_FLIGHT.with(|cell| cell.borrow_mut().push(key));
        Self { key }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|cell| {
            let mut active = cell.borrow_mut();
            if let Some(pos) = active.iter().rposition(|key| *key == self.key) {
                active.remove(pos);
            }
        });
    }
}

impl ClosureTable {
    /// Invoke a prepared closure
    ///
    /// `input` must be exactly the argument width and `output` at least the
    /// result width. On success the first `result_width` bytes of `output`
    /// hold the results and that width is returned. On any failure `output`
    /// is left untouched: the backing function writes into scratch space that
    /// is copied out only after it returns `Ok`.
    ///
    /// Holds a shared lock on the slot for the duration of the call, so a
    /// concurrent prepare or free of the same handle waits for it. The lock
    /// is recursive, which lets a backing function invoke closures itself.
    /// Freeing or preparing the running closure from inside its own backing
    /// function returns [`ClosureError::Busy`].
    pub fn invoke(
        &self,
        handle: ClosureHandle,
        input: &[u8],
        output: &mut [u8],
        mode_flag: bool,
    ) -> ClosureResult<usize> {
        let slot = self
            .slot(handle)
            .ok_or_else(|| ClosureError::invalid_handle(handle))?;
        let guard = slot.read_recursive();
        let signature = prepared(handle, &guard)?;
        self.dispatch(handle, signature, input, output, mode_flag)
    }

    /// Encode arguments, invoke, and decode results
    ///
    /// All three steps use the signature seen under the slot lock, so a
    /// concurrent re-prepare cannot change the types between them.
    pub fn call(
        &self,
        handle: ClosureHandle,
        arguments: &[Value],
        mode_flag: bool,
    ) -> ClosureResult<Vec<Value>> {
        let slot = self
            .slot(handle)
            .ok_or_else(|| ClosureError::invalid_handle(handle))?;
        let guard = slot.read_recursive();
        let signature = prepared(handle, &guard)?;

        let input = encode_as(signature.arguments(), arguments)?;
        let mut output = vec![0u8; signature.result_width()];
        self.dispatch(handle, signature, &input, &mut output, mode_flag)?;
        Ok(decode(signature.results(), &output)?)
    }

    /// True while `handle` is executing further up this thread's stack
    pub(super) fn in_flight_here(&self, handle: ClosureHandle) -> bool {
        let key = (self as *const ClosureTable as usize, handle.raw());
        IN_FLIGHT.with(|cell| cell.borrow().contains(&key))
    }

    fn dispatch(
        &self,
        handle: ClosureHandle,
        signature: &Signature,
        input: &[u8],
        output: &mut [u8],
        mode_flag: bool,
    ) -> ClosureResult<usize> {
        if input.len() != signature.argument_width() {
            return Err(ClosureError::invalid_argument(format!(
                "input is {} bytes, signature expects {}",
                input.len(),
                signature.argument_width()
            )));
        }
        let result_width = signature.result_width();
        if output.len() < result_width {
            return Err(ClosureError::invalid_argument(format!(
                "output capacity {} is below result width {}",
                output.len(),
                result_width
            )));
        }

        let mut scratch = vec![0u8; result_width];
        let mut ctx = CallContext {
            handle,
            signature,
            input,
            output: &mut scratch,
            mode_flag,
        };

        trace!(handle = %handle, backing_id = %signature.backing_id(), mode_flag, "Dispatching closure");
        let _in_flight = InFlight::enter(self, handle);
        if let Err(e) = signature.backing().call(&mut ctx) {
            debug!(handle = %handle, error = %e, "Backing function failed");
            return Err(ClosureError::Internal(format!("{:#}", e)));
        }

        output[..result_width].copy_from_slice(&scratch);
        self.invocations.fetch_add(1, Ordering::Relaxed);
        Ok(result_width)
    }
}

fn prepared<'g>(handle: ClosureHandle, slot: &'g Slot) -> ClosureResult<&'g Signature> {
    match (slot.state, slot.signature.as_deref()) {
        (ClosureState::Prepared, Some(signature)) => Ok(signature),
        _ => Err(ClosureError::invalid_handle(handle)),
    }
}
