/*!
 * Core Module
 * Handles, limits, and the host error taxonomy
 */

pub mod errors;
pub mod id;
pub mod limits;

pub use errors::{HostError, HostResult, ProtocolViolation};
pub use id::{Handle, HandleGenerator};
