/*!
 * Handle Identifiers
 * Opaque resource handles and the monotonic generator that issues them
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque resource handle (32-bit)
///
/// The only guest-visible reference to host state. Handles are never
/// reissued by the table that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(pub u32);

impl Handle {
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Handle {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Monotonic handle generator without recycling
///
/// # Performance
/// Lock-free; a single relaxed `fetch_update` per allocation.
#[derive(Debug)]
pub struct HandleGenerator {
    next: AtomicU32,
}

impl HandleGenerator {
    /// Handle 0 is never issued
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Next fresh handle, or `None` once the 32-bit space is spent
    #[inline]
    pub fn next(&self) -> Option<Handle> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_add(1)
            })
            .ok()
            .map(Handle)
    }

    /// Number of handles issued so far
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::Relaxed).saturating_sub(1)
    }
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_starts_at_one() {
        let gen = HandleGenerator::new();
        assert_eq!(gen.next(), Some(Handle(1)));
        assert_eq!(gen.next(), Some(Handle(2)));
        assert_eq!(gen.issued(), 2);
    }

    #[test]
    fn test_generator_exhaustion() {
        let gen = HandleGenerator {
            next: AtomicU32::new(u32::MAX),
        };
        assert_eq!(gen.next(), None);
        assert_eq!(gen.next(), None);
    }

    #[test]
    fn test_handle_serializes_transparently() {
        let json = serde_json::to_string(&Handle(7)).unwrap();
        assert_eq!(json, "7");
    }
}
