/*!
 * Closure Syscalls
 *
 * Guest-facing closure operations. Every pointer argument is resolved against
 * guest memory before the table is touched, and every outcome is reported as
 * an [`Errno`].
 */

use super::errno::Errno;
use crate::closures::{BackingId, ClosureError, ClosureHandle, ClosureResult, Signature};
use crate::core::limits::HANDLE_WIDTH;
use crate::core::types::{GuestLen, GuestPtr};
use crate::monitoring::{span_syscall, SyscallSpan};
use crate::runtime::ClosureRuntime;
use tracing::{debug, warn};

impl ClosureRuntime {
    /// Allocate a closure and store its handle at `ret_handle`
    ///
    /// The destination is checked before allocating. Should the write still
    /// fail, the slot is released again so the pool is left as it was.
    pub fn closure_allocate(&self, ret_handle: GuestPtr) -> Errno {
        let span = span_syscall("closure_allocate", 0);
        let _entered = span.enter();

        let result = (|| -> ClosureResult<()> {
            self.memory().check_range(ret_handle, HANDLE_WIDTH)?;
            let handle = self.table().allocate()?;
            span.record_handle(handle.raw());

            if let Err(e) = self.memory().write_u32(ret_handle, handle.raw()) {
                warn!(handle = %handle, ret_handle, "Handle write failed, releasing slot");
                self.table().free(handle)?;
                return Err(e.into());
            }
            Ok(())
        })();

        complete(&span, result)
    }

    /// Release a closure
    pub fn closure_free(&self, closure: u32) -> Errno {
        let span = span_syscall("closure_free", closure);
        let _entered = span.enter();

        let result = lookup(closure).and_then(|handle| self.table().free(handle));
        complete(&span, result)
    }

    /// Attach a signature, backing function, and payload to a closure
    ///
    /// `argument_types_ptr` and `result_types_ptr` point at arrays of one-byte
    /// type codes. May be called again on a prepared closure to redefine it.
    #[allow(clippy::too_many_arguments)]
    pub fn closure_prepare(
        &self,
        backing_function: u32,
        closure: u32,
        argument_types_ptr: GuestPtr,
        argument_types_len: GuestLen,
        result_types_ptr: GuestPtr,
        result_types_len: GuestLen,
        user_data_ptr: GuestPtr,
        user_data_len: GuestLen,
    ) -> Errno {
        let span = span_syscall("closure_prepare", closure);
        let _entered = span.enter();

        let result = (|| -> ClosureResult<()> {
            let memory = self.memory();
            let argument_codes =
                memory.read_bytes(argument_types_ptr, argument_types_len as usize)?;
            let result_codes = memory.read_bytes(result_types_ptr, result_types_len as usize)?;
            let user_data = memory.read_bytes(user_data_ptr, user_data_len as usize)?;

            let backing = self
                .functions()
                .resolve(BackingId(backing_function))
                .ok_or_else(|| {
                    ClosureError::invalid_argument(format!(
                        "no backing function registered as {}",
                        backing_function
                    ))
                })?;

            let signature = Signature::from_codes(
                backing,
                &argument_codes,
                &result_codes,
                &user_data,
                self.table().max_user_data(),
            )?;
            let handle = lookup(closure)?;
            self.table().prepare_signature(handle, signature)
        })();

        complete(&span, result)
    }

    /// Invoke a prepared closure
    ///
    /// Reads `input_len` argument bytes from `input_ptr` and, on success,
    /// writes exactly the result width to `output_ptr`. Guest memory is not
    /// written on failure.
    pub fn closure_invoke(
        &self,
        closure: u32,
        input_ptr: GuestPtr,
        input_len: GuestLen,
        output_ptr: GuestPtr,
        output_capacity: GuestLen,
        mode_flag: bool,
    ) -> Errno {
        let span = span_syscall("closure_invoke", closure);
        let _entered = span.enter();

        let result = (|| -> ClosureResult<()> {
            let memory = self.memory();
            let input = memory.read_bytes(input_ptr, input_len as usize)?;
            memory.check_range(output_ptr, output_capacity as usize)?;

            let handle = lookup(closure)?;
            let mut output = vec![0u8; output_capacity as usize];
            let written = self.table().invoke(handle, &input, &mut output, mode_flag)?;

            memory.write_bytes(output_ptr, &output[..written])?;
            Ok(())
        })();

        complete(&span, result)
    }
}

fn lookup(closure: u32) -> ClosureResult<ClosureHandle> {
    ClosureHandle::from_raw(closure).ok_or(ClosureError::InvalidHandle(closure))
}

fn complete(span: &SyscallSpan, result: ClosureResult<()>) -> Errno {
    let errno = match result {
        Ok(()) => Errno::Success,
        Err(e) => {
            debug!(error = %e, "Closure syscall rejected");
            span.record_error(&e.to_string());
            Errno::from(&e)
        }
    };
    span.record_errno(errno.raw());
    errno
}
