/*!
 * Preopens
 * Host directories exposed under a guest-visible path prefix
 */

use super::types::Rights;
use std::path::{Path, PathBuf};

/// Immutable sandbox root established at instantiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preopen {
    guest_path: String,
    host_root: PathBuf,
    rights: Rights,
}

impl Preopen {
    /// `host_root` must already be canonical
    pub fn new(guest_path: impl Into<String>, host_root: impl Into<PathBuf>, rights: Rights) -> Self {
        Self {
            guest_path: guest_path.into(),
            host_root: host_root.into(),
            rights,
        }
    }

    #[inline]
    pub fn guest_path(&self) -> &str {
        &self.guest_path
    }

    #[inline]
    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    #[inline]
    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Host path for components relative to the root
    pub fn host_path(&self, components: &[String]) -> PathBuf {
        let mut path = self.host_root.clone();
        path.extend(components);
        path
    }
}
