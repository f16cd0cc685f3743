/*!
 * Platform Error Tables
 *
 * Declarative raw-code mappings per host platform. Each platform has a base
 * table (raw code to portable code) and an override table consulted first,
 * keyed by the operation that failed. Platform quirks live here as data so
 * each platform can be checked on any host.
 */

use super::code::ErrorCode;
use super::translator::Operation;
use serde::{Deserialize, Serialize};

use ErrorCode::*;

/// Host platform whose raw error numbering is being translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform this binary was compiled for
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(any(target_os = "macos", target_os = "ios", target_os = "freebsd")) {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    #[must_use]
    pub fn tables(self) -> PlatformTables {
        match self {
            Platform::Linux => PlatformTables {
                base: LINUX_ERRNO,
                overrides: LINUX_OVERRIDES,
            },
            Platform::MacOs => PlatformTables {
                base: MACOS_ERRNO,
                overrides: MACOS_OVERRIDES,
            },
            Platform::Windows => PlatformTables {
                base: WINDOWS_ERRORS,
                overrides: WINDOWS_OVERRIDES,
            },
        }
    }
}

/// Borrowed view of one platform's mapping data
#[derive(Debug, Clone, Copy)]
pub struct PlatformTables {
    pub base: &'static [(i32, ErrorCode)],
    pub overrides: &'static [(Operation, i32, ErrorCode)],
}

impl PlatformTables {
    #[inline]
    pub fn lookup(&self, op: Operation, raw: i32) -> Option<ErrorCode> {
        self.overrides
            .iter()
            .find(|(o, r, _)| *o == op && *r == raw)
            .map(|(_, _, code)| *code)
            .or_else(|| {
                self.base
                    .iter()
                    .find(|(r, _)| *r == raw)
                    .map(|(_, code)| *code)
            })
    }
}

// =============================================================================
// LINUX (errno, asm-generic numbering)
// =============================================================================

static LINUX_ERRNO: &[(i32, ErrorCode)] = &[
    (1, AccessDenied),       // EPERM
    (2, NotFound),           // ENOENT
    (4, Interrupted),        // EINTR
    (5, Io),                 // EIO
    (9, InvalidArgument),    // EBADF
    (11, WouldBlock),        // EAGAIN
    (12, NoSpace),           // ENOMEM
    (13, AccessDenied),      // EACCES
    (17, Exists),            // EEXIST
    (18, Unsupported),       // EXDEV
    (20, NotDirectory),      // ENOTDIR
    (21, IsDirectory),       // EISDIR
    (22, InvalidArgument),   // EINVAL
    (23, NoSpace),           // ENFILE
    (24, NoSpace),           // EMFILE
    (26, AccessDenied),      // ETXTBSY
    (27, NoSpace),           // EFBIG
    (28, NoSpace),           // ENOSPC
    (30, AccessDenied),      // EROFS
    (31, TooManyLinks),      // EMLINK
    (32, ConnectionReset),   // EPIPE
    (36, InvalidArgument),   // ENAMETOOLONG
    (38, Unsupported),       // ENOSYS
    (39, Exists),            // ENOTEMPTY
    (40, TooManyLinks),      // ELOOP
    (95, Unsupported),       // EOPNOTSUPP
    (97, Unsupported),       // EAFNOSUPPORT
    (98, AddressInUse),      // EADDRINUSE
    (99, InvalidArgument),   // EADDRNOTAVAIL
    (101, ConnectionRefused), // ENETUNREACH
    (103, ConnectionReset),  // ECONNABORTED
    (104, ConnectionReset),  // ECONNRESET
    (106, InvalidArgument),  // EISCONN
    (107, InvalidArgument),  // ENOTCONN
    (110, Timeout),          // ETIMEDOUT
    (111, ConnectionRefused), // ECONNREFUSED
    (113, ConnectionRefused), // EHOSTUNREACH
    (114, InProgress),       // EALREADY
    (115, InProgress),       // EINPROGRESS
    (122, NoSpace),          // EDQUOT
];

// Linux reports every quirk handled elsewhere with the expected errno.
static LINUX_OVERRIDES: &[(Operation, i32, ErrorCode)] = &[];

// =============================================================================
// MACOS / BSD (errno, BSD numbering)
// =============================================================================

static MACOS_ERRNO: &[(i32, ErrorCode)] = &[
    (1, AccessDenied),       // EPERM
    (2, NotFound),           // ENOENT
    (4, Interrupted),        // EINTR
    (5, Io),                 // EIO
    (9, InvalidArgument),    // EBADF
    (12, NoSpace),           // ENOMEM
    (13, AccessDenied),      // EACCES
    (17, Exists),            // EEXIST
    (18, Unsupported),       // EXDEV
    (20, NotDirectory),      // ENOTDIR
    (21, IsDirectory),       // EISDIR
    (22, InvalidArgument),   // EINVAL
    (23, NoSpace),           // ENFILE
    (24, NoSpace),           // EMFILE
    (26, AccessDenied),      // ETXTBSY
    (27, NoSpace),           // EFBIG
    (28, NoSpace),           // ENOSPC
    (30, AccessDenied),      // EROFS
    (31, TooManyLinks),      // EMLINK
    (32, ConnectionReset),   // EPIPE
    (35, WouldBlock),        // EAGAIN
    (36, InProgress),        // EINPROGRESS
    (37, InProgress),        // EALREADY
    (45, Unsupported),       // ENOTSUP
    (47, Unsupported),       // EAFNOSUPPORT
    (48, AddressInUse),      // EADDRINUSE
    (49, InvalidArgument),   // EADDRNOTAVAIL
    (51, ConnectionRefused), // ENETUNREACH
    (53, ConnectionReset),   // ECONNABORTED
    (54, ConnectionReset),   // ECONNRESET
    (56, InvalidArgument),   // EISCONN
    (57, InvalidArgument),   // ENOTCONN
    (60, Timeout),           // ETIMEDOUT
    (61, ConnectionRefused), // ECONNREFUSED
    (62, TooManyLinks),      // ELOOP
    (63, InvalidArgument),   // ENAMETOOLONG
    (65, ConnectionRefused), // EHOSTUNREACH
    (66, Exists),            // ENOTEMPTY
    (69, NoSpace),           // EDQUOT
    (78, Unsupported),       // ENOSYS
    (102, Unsupported),      // EOPNOTSUPP
];

static MACOS_OVERRIDES: &[(Operation, i32, ErrorCode)] = &[
    // unlink(2) on a directory reports EPERM
    (Operation::UnlinkFile, 1, IsDirectory),
];

// =============================================================================
// WINDOWS (Win32 system errors and WSA socket errors)
// =============================================================================

static WINDOWS_ERRORS: &[(i32, ErrorCode)] = &[
    (2, NotFound),           // ERROR_FILE_NOT_FOUND
    (3, NotFound),           // ERROR_PATH_NOT_FOUND
    (4, NoSpace),            // ERROR_TOO_MANY_OPEN_FILES
    (5, AccessDenied),       // ERROR_ACCESS_DENIED
    (6, InvalidArgument),    // ERROR_INVALID_HANDLE
    (8, NoSpace),            // ERROR_NOT_ENOUGH_MEMORY
    (14, NoSpace),           // ERROR_OUTOFMEMORY
    (17, Unsupported),       // ERROR_NOT_SAME_DEVICE
    (19, AccessDenied),      // ERROR_WRITE_PROTECT
    (32, AccessDenied),      // ERROR_SHARING_VIOLATION
    (33, AccessDenied),      // ERROR_LOCK_VIOLATION
    (39, NoSpace),           // ERROR_HANDLE_DISK_FULL
    (50, Unsupported),       // ERROR_NOT_SUPPORTED
    (80, Exists),            // ERROR_FILE_EXISTS
    (87, InvalidArgument),   // ERROR_INVALID_PARAMETER
    (109, ConnectionReset),  // ERROR_BROKEN_PIPE
    (112, NoSpace),          // ERROR_DISK_FULL
    (123, InvalidArgument),  // ERROR_INVALID_NAME
    (145, Exists),           // ERROR_DIR_NOT_EMPTY
    (183, Exists),           // ERROR_ALREADY_EXISTS
    (206, InvalidArgument),  // ERROR_FILENAME_EXCED_RANGE
    (267, NotDirectory),     // ERROR_DIRECTORY
    (1314, AccessDenied),    // ERROR_PRIVILEGE_NOT_HELD
    (1921, TooManyLinks),    // ERROR_CANT_RESOLVE_FILENAME
    (10004, Interrupted),    // WSAEINTR
    (10013, AccessDenied),   // WSAEACCES
    (10022, InvalidArgument), // WSAEINVAL
    (10024, NoSpace),        // WSAEMFILE
    (10035, WouldBlock),     // WSAEWOULDBLOCK
    (10036, InProgress),     // WSAEINPROGRESS
    (10037, InProgress),     // WSAEALREADY
    (10047, Unsupported),    // WSAEAFNOSUPPORT
    (10048, AddressInUse),   // WSAEADDRINUSE
    (10049, InvalidArgument), // WSAEADDRNOTAVAIL
    (10051, ConnectionRefused), // WSAENETUNREACH
    (10053, ConnectionReset), // WSAECONNABORTED
    (10054, ConnectionReset), // WSAECONNRESET
    (10056, InvalidArgument), // WSAEISCONN
    (10057, InvalidArgument), // WSAENOTCONN
    (10060, Timeout),        // WSAETIMEDOUT
    (10061, ConnectionRefused), // WSAECONNREFUSED
    (10065, ConnectionRefused), // WSAEHOSTUNREACH
];

static WINDOWS_OVERRIDES: &[(Operation, i32, ErrorCode)] = &[
    // MoveFileEx onto an existing directory reports ERROR_ACCESS_DENIED
    (Operation::Rename, 5, Exists),
    // DeleteFile on a directory reports ERROR_ACCESS_DENIED
    (Operation::UnlinkFile, 5, IsDirectory),
    // RemoveDirectory on a regular file
    (Operation::RemoveDirectory, 267, NotDirectory),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tables_have_no_duplicate_raw_codes() {
        for platform in [Platform::Linux, Platform::MacOs, Platform::Windows] {
            let tables = platform.tables();
            let mut seen = HashSet::new();
            for (raw, _) in tables.base {
                assert!(seen.insert(*raw), "{platform:?} maps {raw} twice");
            }
        }
    }

    #[test]
    fn test_override_wins_over_base() {
        let windows = Platform::Windows.tables();
        assert_eq!(windows.lookup(Operation::Rename, 5), Some(Exists));
        assert_eq!(windows.lookup(Operation::Open, 5), Some(AccessDenied));

        let macos = Platform::MacOs.tables();
        assert_eq!(macos.lookup(Operation::UnlinkFile, 1), Some(IsDirectory));
        assert_eq!(macos.lookup(Operation::Open, 1), Some(AccessDenied));
    }

    #[test]
    fn test_unknown_raw_code() {
        assert_eq!(Platform::Linux.tables().lookup(Operation::Other, 9999), None);
    }
}
