/*!
 * Monitoring
 * Structured tracing setup and call spans for the host surface
 */

mod tracer;

pub use tracer::{call_span, init_tracing, CallSpan, SLOW_CALL_THRESHOLD};
