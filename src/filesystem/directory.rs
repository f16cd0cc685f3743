/*!
 * Directory Entry Streams
 */

use super::native::NativeDirIter;
use super::types::DirectoryEntry;
use crate::table::HostResource;
use crate::translate::{ErrorCode, ErrorCodeTranslator, Operation};
use parking_lot::Mutex;
use std::fmt;

enum Cursor {
    Open(NativeDirIter),
    Done,
    Failed(ErrorCode),
}

/// Lazy, finite, single-pass listing of one directory
///
/// Entries already returned stay valid; a failure is reported on the next
/// call and on every call after it.
pub struct DirectoryEntryStream {
    cursor: Mutex<Cursor>,
    translator: ErrorCodeTranslator,
}

impl DirectoryEntryStream {
    pub(crate) fn new(entries: NativeDirIter, translator: ErrorCodeTranslator) -> Self {
        Self {
            cursor: Mutex::new(Cursor::Open(entries)),
            translator,
        }
    }

    /// Next entry, `Ok(None)` once the listing is exhausted
    pub fn read_entry(&self) -> Result<Option<DirectoryEntry>, ErrorCode> {
        let mut cursor = self.cursor.lock();
        let next = match &mut *cursor {
            Cursor::Open(entries) => entries.next(),
            Cursor::Done => return Ok(None),
            Cursor::Failed(code) => return Err(*code),
        };
        match next {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => {
                let code = self.translator.translate(&e, Operation::ReadDirectory);
                *cursor = Cursor::Failed(code);
                Err(code)
            }
            None => {
                *cursor = Cursor::Done;
                Ok(None)
            }
        }
    }
}

impl HostResource for DirectoryEntryStream {
    fn release(&self) {
        let mut cursor = self.cursor.lock();
        if matches!(*cursor, Cursor::Open(_)) {
            *cursor = Cursor::Done;
        }
    }
}

impl fmt::Debug for DirectoryEntryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.cursor.lock() {
            Cursor::Open(_) => "open",
            Cursor::Done => "done",
            Cursor::Failed(_) => "failed",
        };
        f.debug_struct("DirectoryEntryStream")
            .field("state", &state)
            .finish()
    }
}
