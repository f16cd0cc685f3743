/*!
 * Stream Types
 */

use crate::translate::ErrorCode;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal stream conditions
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum StreamError {
    /// The other end is gone; no further bytes can move
    #[error("Stream closed")]
    #[diagnostic(code(stream::closed))]
    Closed,

    /// A native fault moved the stream to the errored state
    #[error("Last operation failed: {0}")]
    #[diagnostic(
        code(stream::failed),
        help("The stream is errored and reports this on every call until dropped.")
    )]
    LastOperationFailed(ErrorCode),
}

/// Result of a non-blocking read
///
/// Empty `bytes` with `ended == false` means no data is available yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes: Vec<u8>,
    pub ended: bool,
}

impl ReadOutcome {
    #[inline]
    #[must_use]
    pub fn would_block(&self) -> bool {
        self.bytes.is_empty() && !self.ended
    }
}

/// Result of a skip or splice: byte count plus end-of-stream flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    pub moved: u64,
    pub ended: bool,
}
