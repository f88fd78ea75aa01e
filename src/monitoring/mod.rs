/*!
 * Monitoring
 * Structured tracing for the closure runtime
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, span_syscall, SyscallSpan, ENV_TRACE_JSON};
