/*!
 * Descriptors
 * Open filesystem objects bound to a preopen
 */

use super::preopen::Preopen;
use super::types::{DescriptorType, Rights};
use crate::table::HostResource;
use crate::translate::ErrorCode;
use parking_lot::Mutex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Open file or directory
///
/// Directories carry no native handle: every directory operation is a
/// path-based call on the resolved host path, so the handle is the
/// location plus rights. Files own their native handle until released.
#[derive(Debug)]
pub struct Descriptor {
    preopen: Arc<Preopen>,
    components: Vec<String>,
    host_path: PathBuf,
    kind: DescriptorType,
    rights: Rights,
    file: Mutex<Option<Arc<File>>>,
    listed: AtomicBool,
}

impl Descriptor {
    /// Descriptor for a preopen root
    pub(crate) fn root(preopen: Arc<Preopen>) -> Self {
        let host_path = preopen.host_root().to_path_buf();
        let rights = preopen.rights();
        Self::directory(preopen, Vec::new(), host_path, rights)
    }

    pub(crate) fn directory(
        preopen: Arc<Preopen>,
        components: Vec<String>,
        host_path: PathBuf,
        rights: Rights,
    ) -> Self {
        Self {
            preopen,
            components,
            host_path,
            kind: DescriptorType::Directory,
            rights,
            file: Mutex::new(None),
            listed: AtomicBool::new(false),
        }
    }

    pub(crate) fn file(
        preopen: Arc<Preopen>,
        components: Vec<String>,
        host_path: PathBuf,
        kind: DescriptorType,
        rights: Rights,
        file: File,
    ) -> Self {
        Self {
            preopen,
            components,
            host_path,
            kind,
            rights,
            file: Mutex::new(Some(Arc::new(file))),
            listed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn kind(&self) -> DescriptorType {
        self.kind
    }

    #[inline]
    pub fn rights(&self) -> Rights {
        self.rights
    }

    #[inline]
    pub fn preopen(&self) -> &Arc<Preopen> {
        &self.preopen
    }

    /// Location relative to the preopen root
    #[inline]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    #[inline]
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind == DescriptorType::Directory
    }

    pub(crate) fn require(&self, rights: Rights) -> Result<(), ErrorCode> {
        if self.rights.contains(rights) {
            Ok(())
        } else {
            Err(ErrorCode::AccessDenied)
        }
    }

    /// Directory descriptors only
    pub(crate) fn require_directory(&self) -> Result<(), ErrorCode> {
        if self.is_directory() {
            Ok(())
        } else {
            Err(ErrorCode::NotDirectory)
        }
    }

    /// Native file handle for data operations
    pub(crate) fn native_file(&self) -> Result<Arc<File>, ErrorCode> {
        if self.is_directory() {
            return Err(ErrorCode::IsDirectory);
        }
        self.file.lock().clone().ok_or(ErrorCode::InvalidArgument)
    }

    /// Claim the single directory listing this descriptor allows
    pub(crate) fn claim_listing(&self) -> Result<(), ErrorCode> {
        if self.listed.swap(true, Ordering::AcqRel) {
            Err(ErrorCode::InvalidArgument)
        } else {
            Ok(())
        }
    }
}

impl HostResource for Descriptor {
    fn release(&self) {
        self.file.lock().take();
    }
}
