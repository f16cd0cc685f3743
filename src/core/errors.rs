/*!
 * Error Types
 * Host error taxonomy with thiserror, miette, and serde support
 *
 * Three classes reach callers:
 * - `Code`: sandbox refusals and translated host failures (recoverable)
 * - `Stream`: terminal stream states
 * - `Header`: header fields refused by syntax or host policy
 * - `Fatal`: caller defects such as use of a dropped handle
 */

use crate::core::id::Handle;
use crate::http::HeaderError;
use crate::streams::StreamError;
use crate::table::{ResourceKind, TableError};
use crate::translate::ErrorCode;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller defects that are never retried
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "violation", content = "details", rename_all = "snake_case")]
pub enum ProtocolViolation {
    #[error("Handle {0} is not live")]
    #[diagnostic(
        code(protocol::unknown_handle),
        help("The handle was never issued or has already been dropped.")
    )]
    UnknownHandle(Handle),

    #[error("Handle {handle} is a {actual}, expected {expected}")]
    #[diagnostic(code(protocol::wrong_resource_type))]
    WrongResourceType {
        handle: Handle,
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("Response outparam already used")]
    #[diagnostic(
        code(protocol::already_responded),
        help("A response outparam accepts exactly one response.")
    )]
    AlreadyResponded,

    #[error("{0} was already taken")]
    #[diagnostic(code(protocol::already_consumed))]
    AlreadyConsumed(ResourceKind),
}

/// Unified host error
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum HostError {
    #[error("{0}")]
    #[diagnostic(transparent)]
    Code(#[from] ErrorCode),

    #[error("Stream error: {0}")]
    #[diagnostic(transparent)]
    Stream(#[from] StreamError),

    #[error("Header error: {0}")]
    #[diagnostic(transparent)]
    Header(#[from] HeaderError),

    #[error("Protocol violation: {0}")]
    #[diagnostic(transparent)]
    Fatal(#[from] ProtocolViolation),
}

impl HostError {
    /// Portable code carried by this error, if any
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            HostError::Code(code) => Some(*code),
            HostError::Stream(StreamError::LastOperationFailed(code)) => Some(*code),
            HostError::Stream(StreamError::Closed) | HostError::Header(_) | HostError::Fatal(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, HostError::Fatal(_))
    }
}

impl From<TableError> for HostError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::NotFound(handle) => ProtocolViolation::UnknownHandle(handle).into(),
            TableError::WrongType {
                handle,
                expected,
                actual,
            } => ProtocolViolation::WrongResourceType {
                handle,
                expected,
                actual,
            }
            .into(),
            TableError::Full { .. } => ErrorCode::NoSpace.into(),
        }
    }
}

/// Result type for host operations
///
/// # Must Use
/// Fatal variants indicate a defect in the caller and should abort the guest
pub type HostResult<T> = std::result::Result<T, HostError>;
