/*!
 * Closure Signatures
 * Validated calling shape, backing capability, and owned user payload
 */

use super::backing::BackingRef;
use super::marshal::{byte_width, parse_type_codes};
use super::types::{BackingId, ClosureError, ClosureResult};
use super::value::ValueType;
use crate::core::limits::MAX_SIGNATURE_ARITY;
use bytes::Bytes;
use std::fmt;

/// Signature attached to a prepared closure
///
/// Immutable once built; re-preparing a closure swaps in a new `Arc<Signature>`,
/// so invocations already in flight keep the shape they started with.
pub struct Signature {
    arguments: Box<[ValueType]>,
    results: Box<[ValueType]>,
    argument_width: usize,
    result_width: usize,
    backing: BackingRef,
    user_data: Bytes,
    generation: u64,
}

impl Signature {
    /// Build a signature from already-typed lists
    ///
    /// Fails with `InvalidArgument` if the payload exceeds `max_user_data` or a
    /// list is longer than the supported arity.
    pub fn new(
        backing: BackingRef,
        arguments: &[ValueType],
        results: &[ValueType],
        user_data: &[u8],
        max_user_data: usize,
    ) -> ClosureResult<Self> {
        if arguments.len() > MAX_SIGNATURE_ARITY || results.len() > MAX_SIGNATURE_ARITY {
            return Err(ClosureError::invalid_argument(format!(
                "Signature arity {}/{} exceeds limit {}",
                arguments.len(),
                results.len(),
                MAX_SIGNATURE_ARITY
            )));
        }
        if user_data.len() > max_user_data {
            return Err(ClosureError::invalid_argument(format!(
                "User data of {} bytes exceeds limit {}",
                user_data.len(),
                max_user_data
            )));
        }

        Ok(Self {
            argument_width: byte_width(arguments),
            result_width: byte_width(results),
            arguments: arguments.into(),
            results: results.into(),
            backing,
            user_data: Bytes::copy_from_slice(user_data),
            generation: 0,
        })
    }

    /// Build a signature from raw guest wire codes
    pub fn from_codes(
        backing: BackingRef,
        argument_codes: &[u8],
        result_codes: &[u8],
        user_data: &[u8],
        max_user_data: usize,
    ) -> ClosureResult<Self> {
        let arguments = parse_type_codes(argument_codes)?;
        let results = parse_type_codes(result_codes)?;
        Self::new(backing, &arguments, &results, user_data, max_user_data)
    }

    pub(super) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn arguments(&self) -> &[ValueType] {
        &self.arguments
    }

    pub fn results(&self) -> &[ValueType] {
        &self.results
    }

    /// Required input buffer length
    #[inline]
    pub fn argument_width(&self) -> usize {
        self.argument_width
    }

    /// Minimum output buffer capacity
    #[inline]
    pub fn result_width(&self) -> usize {
        self.result_width
    }

    pub fn backing(&self) -> &BackingRef {
        &self.backing
    }

    pub fn backing_id(&self) -> BackingId {
        self.backing.id()
    }

    /// Owned copy of the payload supplied at prepare time
    pub fn user_data(&self) -> &[u8] {
        &self.user_data
    }

    /// Prepare counter value when this signature was installed
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("arguments", &self.arguments)
            .field("results", &self.results)
            .field("backing", &self.backing.id())
            .field("user_data_len", &self.user_data.len())
            .field("generation", &self.generation)
            .finish()
    }
}
