/*!
 * Tracing
 * Subscriber installation and per-call spans using the tracing crate
 *
 * The host never installs a subscriber by itself. Embedders call
 * `init_tracing` once at startup (or install their own).
 */

use crate::core::Handle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Non-blocking calls slower than this are reported
pub const SLOW_CALL_THRESHOLD: Duration = Duration::from_millis(10);

static CALL_IDS: AtomicU64 = AtomicU64::new(1);

/// Install the global subscriber
///
/// Environment variables:
/// - RUST_LOG: filter directives (default: info)
/// - WASI_HOST_TRACE_JSON: JSON output when `1` or `true`
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("WASI_HOST_TRACE_JSON")
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
                    .with_line_number(true)
                    .with_file(true)
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
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "host tracing initialized");
    }
    installed
}

/// Span around one call-surface operation
///
/// Reports the call duration on drop. Calls that are expected to park
/// (`blocking_*`, `poll.block`) are marked so they are never flagged slow.
pub struct CallSpan {
    span: Span,
    start: Instant,
    operation: &'static str,
    call_id: u64,
    may_block: bool,
}

impl CallSpan {
    pub fn new(operation: &'static str, handle: Option<Handle>) -> Self {
        let call_id = CALL_IDS.fetch_add(1, Ordering::Relaxed);
        let span = span!(
            Level::DEBUG,
            "host_call",
            call_id,
            operation,
            handle = handle.map(|h| h.0),
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            operation,
            call_id,
            may_block: false,
        }
    }

    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.may_block = true;
        self
    }

    #[inline]
    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    pub fn record_result<T, E: std::fmt::Display>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => {
                self.span.record("result", "ok");
            }
            Err(err) => {
                self.span.record("result", tracing::field::display(err));
            }
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for CallSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", elapsed.as_micros() as u64);

        if !self.may_block && elapsed > SLOW_CALL_THRESHOLD {
            warn!(
                call_id = self.call_id,
                operation = self.operation,
                duration_ms = elapsed.as_millis() as u64,
                slow = true,
                "slow non-blocking call"
            );
        } else {
            debug!(
                call_id = self.call_id,
                operation = self.operation,
                duration_us = elapsed.as_micros() as u64,
                "call completed"
            );
        }
    }
}

/// Open a span for a call-surface operation
#[inline]
pub fn call_span(operation: &'static str, handle: Option<Handle>) -> CallSpan {
    CallSpan::new(operation, handle)
}
