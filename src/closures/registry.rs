/*!
 * Signature Registry
 * Attaching and replacing closure signatures
 */

use super::backing::BackingRef;
use super::signature::Signature;
use super::table::ClosureTable;
use super::types::{ClosureError, ClosureHandle, ClosureResult, ClosureState};
use super::value::ValueType;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

impl ClosureTable {
    /// Attach a signature described by raw guest type codes
    ///
    /// Type codes and payload are validated before the slot is touched; a
    /// rejected call leaves any previously attached signature in place.
    pub fn prepare(
        &self,
        handle: ClosureHandle,
        backing: BackingRef,
        argument_codes: &[u8],
        result_codes: &[u8],
        user_data: &[u8],
    ) -> ClosureResult<()> {
        let signature = Signature::from_codes(
            backing,
            argument_codes,
            result_codes,
            user_data,
            self.max_user_data,
        )?;
        self.prepare_signature(handle, signature)
    }

    /// Attach a signature described by typed lists
    pub fn prepare_typed(
        &self,
        handle: ClosureHandle,
        backing: BackingRef,
        arguments: &[ValueType],
        results: &[ValueType],
        user_data: &[u8],
    ) -> ClosureResult<()> {
        let signature =
            Signature::new(backing, arguments, results, user_data, self.max_user_data)?;
        self.prepare_signature(handle, signature)
    }

    /// Attach an already validated signature
    ///
    /// The only check left is the handle itself, so callers can report
    /// signature errors ahead of handle errors.
    pub fn prepare_signature(
        &self,
        handle: ClosureHandle,
        signature: Signature,
    ) -> ClosureResult<()> {
        let slot = self
            .slot(handle)
            .ok_or_else(|| ClosureError::invalid_handle(handle))?;

        if self.in_flight_here(handle) {
            return Err(ClosureError::busy(handle));
        }

        let mut guard = slot.write();
        if !guard.state.is_live() {
            return Err(ClosureError::invalid_handle(handle));
        }

        let generation = self.prepares.fetch_add(1, Ordering::Relaxed) + 1;
        let signature = Arc::new(signature.with_generation(generation));
        debug!(
            handle = %handle,
            backing_id = %signature.backing_id(),
            args = signature.arguments().len(),
            results = signature.results().len(),
            generation,
            replaced = guard.signature.is_some(),
            "Prepared closure"
        );

        guard.signature = Some(signature);
        guard.state = ClosureState::Prepared;
        Ok(())
    }
}
