/*!
 * Error Code Translator
 */

use super::code::ErrorCode;
use super::tables::{Platform, PlatformTables};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::trace;

/// Native primitive whose failure is being translated
///
/// Used only to select per-operation overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Open,
    Read,
    Write,
    Stat,
    SetTimes,
    SetSize,
    Sync,
    ReadDirectory,
    CreateDirectory,
    RemoveDirectory,
    UnlinkFile,
    Rename,
    Symlink,
    ReadLink,
    Link,
    Bind,
    Listen,
    Accept,
    Connect,
    Shutdown,
    Lookup,
    Http,
    Other,
}

/// Translates native failures for one platform
#[derive(Debug, Clone, Copy)]
pub struct ErrorCodeTranslator {
    platform: Platform,
    tables: PlatformTables,
}

impl ErrorCodeTranslator {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            tables: platform.tables(),
        }
    }

    /// Translator for the platform this binary runs on
    pub fn native() -> Self {
        Self::new(Platform::current())
    }

    #[inline]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Translate a raw OS error number
    ///
    /// Unknown numbers map to `io`.
    pub fn translate_raw(&self, raw: i32, op: Operation) -> ErrorCode {
        let code = self.tables.lookup(op, raw).unwrap_or(ErrorCode::Io);
        trace!(raw, ?op, platform = ?self.platform, code = %code, "translated raw error");
        code
    }

    /// Translate an `io::Error`, preferring its raw OS number
    pub fn translate(&self, err: &io::Error, op: Operation) -> ErrorCode {
        match err.raw_os_error() {
            Some(raw) => self
                .tables
                .lookup(op, raw)
                .unwrap_or_else(|| ErrorCode::from_kind(err.kind())),
            None => ErrorCode::from_kind(err.kind()),
        }
    }
}

impl Default for ErrorCodeTranslator {
    fn default() -> Self {
        Self::native()
    }
}
