/*!
 * AI-OS WASI Host
 * Capability-based system interface for sandboxed components
 *
 * Guest calls are plain synchronous calls over opaque handles. Native work
 * (sockets, DNS, body and file pumps) runs on a tokio runtime owned by the
 * instantiation, with readiness observed through pollables.
 */

pub mod clocks;
pub mod config;
pub mod core;
pub mod filesystem;
pub mod host;
pub mod http;
pub mod monitoring;
pub mod poll;
pub mod random;
pub mod sockets;
pub mod streams;
pub mod table;
pub mod translate;

// Re-exports
pub use crate::config::{ConfigError, HostConfig, HostLimits, InstanceConfig};
pub use crate::core::{Handle, HostError, HostResult, ProtocolViolation};
pub use host::{HostContext, HostContextBuilder};
pub use monitoring::init_tracing;
pub use streams::StreamError;
pub use table::{ResourceKind, ResourceTable};
pub use translate::{ErrorCode, ErrorCodeTranslator};
