/*!
 * Structured Tracing
 * Subscriber setup and per-syscall spans using the tracing crate
 */

use crate::core::limits::SLOW_SYSCALL_THRESHOLD_MS;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Environment variable enabling JSON output
pub const ENV_TRACE_JSON: &str = "CLOSURE_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - CLOSURE_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one guest boundary call
pub struct SyscallSpan {
    span: tracing::Span,
    start: Instant,
    syscall_name: &'static str,
    trace_id: String,
}

impl SyscallSpan {
    pub fn new(syscall_name: &'static str, handle: u32) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "syscall",
            trace_id = %trace_id,
            syscall = syscall_name,
            handle = handle,
            duration_us = tracing::field::Empty,
            errno = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            syscall_name,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the handle once it is known (allocate)
    pub fn record_handle(&self, handle: u32) {
        self.span.record("handle", handle);
    }

    /// Record the errno returned to the guest
    pub fn record_errno(&self, errno: u16) {
        self.span.record("errno", errno);
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration.as_millis() > SLOW_SYSCALL_THRESHOLD_MS {
            warn!(
                trace_id = %self.trace_id,
                syscall = self.syscall_name,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow syscall detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                syscall = self.syscall_name,
                duration_us = duration.as_micros() as u64,
                "syscall completed"
            );
        }
    }
}

/// Helper to create a syscall span
#[inline]
pub fn span_syscall(name: &'static str, handle: u32) -> SyscallSpan {
    SyscallSpan::new(name, handle)
}
