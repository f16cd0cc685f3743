/*!
 * Portable Error Codes
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Portable error code returned by every fallible host operation
///
/// Serialized names are the kebab-case spellings guests see.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    #[error("not-found")]
    #[diagnostic(code(host::not_found))]
    NotFound,

    #[error("access-denied")]
    #[diagnostic(
        code(host::access_denied),
        help("The sandbox or the host refused the operation.")
    )]
    AccessDenied,

    #[error("exists")]
    #[diagnostic(code(host::exists))]
    Exists,

    #[error("not-directory")]
    #[diagnostic(code(host::not_directory))]
    NotDirectory,

    #[error("is-directory")]
    #[diagnostic(code(host::is_directory))]
    IsDirectory,

    #[error("too-many-links")]
    #[diagnostic(
        code(host::too_many_links),
        help("Symlink chain exceeded the configured depth or loops.")
    )]
    TooManyLinks,

    #[error("no-space")]
    #[diagnostic(code(host::no_space))]
    NoSpace,

    #[error("in-progress")]
    #[diagnostic(code(host::in_progress))]
    InProgress,

    #[error("would-block")]
    #[diagnostic(
        code(host::would_block),
        help("Wait on a pollable for this resource, then retry.")
    )]
    WouldBlock,

    #[error("interrupted")]
    #[diagnostic(code(host::interrupted))]
    Interrupted,

    #[error("invalid-argument")]
    #[diagnostic(code(host::invalid_argument))]
    InvalidArgument,

    #[error("timeout")]
    #[diagnostic(code(host::timeout))]
    Timeout,

    #[error("connection-refused")]
    #[diagnostic(code(host::connection_refused))]
    ConnectionRefused,

    #[error("connection-reset")]
    #[diagnostic(code(host::connection_reset))]
    ConnectionReset,

    #[error("address-in-use")]
    #[diagnostic(code(host::address_in_use))]
    AddressInUse,

    #[error("unsupported")]
    #[diagnostic(code(host::unsupported))]
    Unsupported,

    #[error("io")]
    #[diagnostic(code(host::io))]
    Io,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 17] = [
        ErrorCode::NotFound,
        ErrorCode::AccessDenied,
        ErrorCode::Exists,
        ErrorCode::NotDirectory,
        ErrorCode::IsDirectory,
        ErrorCode::TooManyLinks,
        ErrorCode::NoSpace,
        ErrorCode::InProgress,
        ErrorCode::WouldBlock,
        ErrorCode::Interrupted,
        ErrorCode::InvalidArgument,
        ErrorCode::Timeout,
        ErrorCode::ConnectionRefused,
        ErrorCode::ConnectionReset,
        ErrorCode::AddressInUse,
        ErrorCode::Unsupported,
        ErrorCode::Io,
    ];

    /// Guest-visible name
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not-found",
            ErrorCode::AccessDenied => "access-denied",
            ErrorCode::Exists => "exists",
            ErrorCode::NotDirectory => "not-directory",
            ErrorCode::IsDirectory => "is-directory",
            ErrorCode::TooManyLinks => "too-many-links",
            ErrorCode::NoSpace => "no-space",
            ErrorCode::InProgress => "in-progress",
            ErrorCode::WouldBlock => "would-block",
            ErrorCode::Interrupted => "interrupted",
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ConnectionRefused => "connection-refused",
            ErrorCode::ConnectionReset => "connection-reset",
            ErrorCode::AddressInUse => "address-in-use",
            ErrorCode::Unsupported => "unsupported",
            ErrorCode::Io => "io",
        }
    }

    /// Coarse mapping used when no raw OS code is available
    #[must_use]
    pub fn from_kind(kind: io::ErrorKind) -> Self {
        use io::ErrorKind as K;
        match kind {
            K::NotFound => ErrorCode::NotFound,
            K::PermissionDenied => ErrorCode::AccessDenied,
            K::AlreadyExists => ErrorCode::Exists,
            K::WouldBlock => ErrorCode::WouldBlock,
            K::Interrupted => ErrorCode::Interrupted,
            K::InvalidInput | K::InvalidData => ErrorCode::InvalidArgument,
            K::TimedOut => ErrorCode::Timeout,
            K::ConnectionRefused => ErrorCode::ConnectionRefused,
            K::ConnectionReset | K::ConnectionAborted | K::BrokenPipe => {
                ErrorCode::ConnectionReset
            }
            K::AddrInUse => ErrorCode::AddressInUse,
            K::AddrNotAvailable => ErrorCode::InvalidArgument,
            K::Unsupported => ErrorCode::Unsupported,
            K::OutOfMemory => ErrorCode::NoSpace,
            _ => ErrorCode::Io,
        }
    }
}
