/*!
 * Descriptor Manager
 * Sandboxed filesystem operations over descriptors
 *
 * Every operation checks rights and resolves paths inside the owning
 * preopen first; refusals happen before any native call. Native failures
 * go through the error translator with the failing operation named, so
 * platform quirks are handled by the translator tables rather than here.
 */

use super::descriptor::Descriptor;
use super::directory::DirectoryEntryStream;
use super::native::{NativeFs, NativeOpenOptions};
use super::resolve::{escapes_lexically, validate, PathResolver, ResolvedPath};
use super::types::{
    DescriptorStat, DescriptorType, NewTimestamp, OpenFlags, PathFlags, Rights,
};
use crate::core::limits::{DEFAULT_MAX_SYMLINK_DEPTH, DEFAULT_STREAM_CAPACITY, MAX_POSITIONAL_READ};
use crate::streams::{InputStream, OutputStream};
use crate::translate::{ErrorCode, ErrorCodeTranslator, Operation};
use std::fs::{File, FileTimes};
use std::io::{self, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::{debug, trace};

pub struct DescriptorManager {
    fs: Arc<dyn NativeFs>,
    translator: ErrorCodeTranslator,
    max_symlink_depth: usize,
    stream_capacity: usize,
    runtime: RuntimeHandle,
}

impl DescriptorManager {
    pub fn new(fs: Arc<dyn NativeFs>, translator: ErrorCodeTranslator, runtime: RuntimeHandle) -> Self {
        Self {
            fs,
            translator,
            max_symlink_depth: DEFAULT_MAX_SYMLINK_DEPTH,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            runtime,
        }
    }

    pub fn with_limits(mut self, max_symlink_depth: usize, stream_capacity: usize) -> Self {
        self.max_symlink_depth = max_symlink_depth;
        self.stream_capacity = stream_capacity;
        self
    }

    #[inline]
    fn native(&self, op: Operation) -> impl Fn(io::Error) -> ErrorCode + '_ {
        move |e| self.translator.translate(&e, op)
    }

    /// Resolve `path` under directory `dir`, requiring lookup rights
    fn resolve(&self, dir: &Descriptor, path: &str, follow: bool) -> Result<ResolvedPath, ErrorCode> {
        dir.require_directory()?;
        dir.require(Rights::LOOKUP)?;
        PathResolver::new(
            self.fs.as_ref(),
            dir.preopen(),
            self.translator,
            self.max_symlink_depth,
        )
        .resolve(dir.components(), path, follow)
    }

    /// Resolve to a named entry, refusing the preopen root itself
    fn resolve_entry(&self, dir: &Descriptor, path: &str) -> Result<ResolvedPath, ErrorCode> {
        let resolved = self.resolve(dir, path, false)?;
        if resolved.file_name().is_none() {
            return Err(ErrorCode::AccessDenied);
        }
        Ok(resolved)
    }

    // =========================================================================
    // Opening
    // =========================================================================

    pub fn open_at(
        &self,
        parent: &Descriptor,
        path_flags: PathFlags,
        path: &str,
        open_flags: OpenFlags,
        rights: Rights,
    ) -> Result<Descriptor, ErrorCode> {
        parent.require_directory()?;
        if !rights.is_subset_of(parent.rights()) {
            debug!(requested = %rights, held = %parent.rights(), "open_at rights escalation refused");
            return Err(ErrorCode::AccessDenied);
        }
        if open_flags.create {
            parent.require(Rights::CREATE)?;
        }
        if open_flags.truncate && !rights.contains(Rights::WRITE) {
            return Err(ErrorCode::AccessDenied);
        }

        let resolved = self.resolve(parent, path, path_flags.symlink_follow)?;
        let existing = match self.fs.symlink_metadata(&resolved.host_path) {
            Ok(stat) => Some(stat.kind),
            Err(e) => match self.translator.translate(&e, Operation::Open) {
                ErrorCode::NotFound => None,
                code => return Err(code),
            },
        };

        match existing {
            Some(DescriptorType::Directory) => {
                if open_flags.create && open_flags.exclusive {
                    return Err(ErrorCode::Exists);
                }
                if rights.contains(Rights::WRITE) {
                    return Err(ErrorCode::IsDirectory);
                }
                debug!(path, "opened directory");
                return Ok(Descriptor::directory(
                    Arc::clone(parent.preopen()),
                    resolved.components,
                    resolved.host_path,
                    rights,
                ));
            }
            // Only reachable without symlink_follow
            Some(DescriptorType::SymbolicLink) => {
                return Err(if open_flags.directory {
                    ErrorCode::NotDirectory
                } else {
                    ErrorCode::TooManyLinks
                });
            }
            Some(_) if open_flags.directory => return Err(ErrorCode::NotDirectory),
            Some(_) if open_flags.create && open_flags.exclusive => return Err(ErrorCode::Exists),
            None if !open_flags.create || open_flags.directory => return Err(ErrorCode::NotFound),
            _ => {}
        }

        let options = NativeOpenOptions {
            read: rights.contains(Rights::READ),
            write: rights.contains(Rights::WRITE) || open_flags.create,
            create: open_flags.create,
            create_new: open_flags.create && open_flags.exclusive,
            truncate: open_flags.truncate,
            // Links were already walked, so a link here was swapped in
            nofollow: true,
        };
        let file = self
            .fs
            .open(&resolved.host_path, options)
            .map_err(self.native(Operation::Open))?;
        let kind = file
            .metadata()
            .map(|md| DescriptorType::from_std(md.file_type()))
            .unwrap_or(DescriptorType::RegularFile);
        debug!(path, %kind, %rights, "opened file");

        Ok(Descriptor::file(
            Arc::clone(parent.preopen()),
            resolved.components,
            resolved.host_path,
            kind,
            rights,
            file,
        ))
    }

    // =========================================================================
    // Directory operations
    // =========================================================================

    /// Start the single listing a directory descriptor allows
    pub fn read_directory(&self, dir: &Descriptor) -> Result<DirectoryEntryStream, ErrorCode> {
        dir.require_directory()?;
        dir.require(Rights::READ)?;
        dir.claim_listing()?;
        let entries = self
            .fs
            .read_dir(dir.host_path())
            .map_err(self.native(Operation::ReadDirectory))?;
        Ok(DirectoryEntryStream::new(entries, self.translator))
    }

    pub fn create_directory_at(&self, dir: &Descriptor, path: &str) -> Result<(), ErrorCode> {
        dir.require(Rights::CREATE)?;
        let resolved = self.resolve(dir, path, false)?;
        if resolved.file_name().is_none() {
            return Err(ErrorCode::Exists);
        }
        self.fs
            .create_dir(&resolved.host_path)
            .map_err(self.native(Operation::CreateDirectory))
    }

    pub fn remove_directory_at(&self, dir: &Descriptor, path: &str) -> Result<(), ErrorCode> {
        dir.require(Rights::MUTATE_DIRECTORY)?;
        let resolved = self.resolve_entry(dir, path)?;
        self.fs
            .remove_dir(&resolved.host_path)
            .map_err(self.native(Operation::RemoveDirectory))
    }

    pub fn unlink_file_at(&self, dir: &Descriptor, path: &str) -> Result<(), ErrorCode> {
        dir.require(Rights::MUTATE_DIRECTORY)?;
        let resolved = self.resolve_entry(dir, path)?;
        self.fs
            .remove_file(&resolved.host_path)
            .map_err(self.native(Operation::UnlinkFile))
    }

    pub fn rename_at(
        &self,
        old_dir: &Descriptor,
        old_path: &str,
        new_dir: &Descriptor,
        new_path: &str,
    ) -> Result<(), ErrorCode> {
        old_dir.require(Rights::MUTATE_DIRECTORY)?;
        new_dir.require(Rights::MUTATE_DIRECTORY)?;
        let from = self.resolve_entry(old_dir, old_path)?;
        let to = self.resolve_entry(new_dir, new_path)?;
        self.fs
            .rename(&from.host_path, &to.host_path)
            .map_err(self.native(Operation::Rename))
    }

    /// Create a symlink at `link_path` pointing to the relative `target`
    pub fn symlink_at(&self, dir: &Descriptor, target: &str, link_path: &str) -> Result<(), ErrorCode> {
        dir.require(Rights::CREATE)?;
        validate(target)?;
        let link = self.resolve_entry(dir, link_path)?;
        let parent_depth = link.components.len().saturating_sub(1);
        if escapes_lexically(parent_depth, target) {
            return Err(ErrorCode::AccessDenied);
        }
        self.fs
            .symlink(Path::new(target), &link.host_path)
            .map_err(self.native(Operation::Symlink))
    }

    pub fn readlink_at(&self, dir: &Descriptor, path: &str) -> Result<String, ErrorCode> {
        let resolved = self.resolve_entry(dir, path)?;
        let target = self
            .fs
            .read_link(&resolved.host_path)
            .map_err(self.native(Operation::ReadLink))?;
        Ok(target.to_string_lossy().into_owned())
    }

    pub fn link_at(
        &self,
        old_dir: &Descriptor,
        old_flags: PathFlags,
        old_path: &str,
        new_dir: &Descriptor,
        new_path: &str,
    ) -> Result<(), ErrorCode> {
        new_dir.require(Rights::CREATE)?;
        let original = self.resolve(old_dir, old_path, old_flags.symlink_follow)?;
        let link = self.resolve_entry(new_dir, new_path)?;
        self.fs
            .hard_link(&original.host_path, &link.host_path)
            .map_err(self.native(Operation::Link))
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn stat(&self, desc: &Descriptor) -> Result<DescriptorStat, ErrorCode> {
        if desc.is_directory() {
            return self
                .fs
                .metadata(desc.host_path())
                .map_err(self.native(Operation::Stat));
        }
        let file = desc.native_file()?;
        file.metadata()
            .map(|md| DescriptorStat::from_metadata(&md))
            .map_err(self.native(Operation::Stat))
    }

    pub fn stat_at(&self, dir: &Descriptor, path_flags: PathFlags, path: &str) -> Result<DescriptorStat, ErrorCode> {
        let resolved = self.resolve(dir, path, path_flags.symlink_follow)?;
        let stat = if path_flags.symlink_follow {
            self.fs.metadata(&resolved.host_path)
        } else {
            self.fs.symlink_metadata(&resolved.host_path)
        };
        stat.map_err(self.native(Operation::Stat))
    }

    pub fn set_times(
        &self,
        desc: &Descriptor,
        accessed: NewTimestamp,
        modified: NewTimestamp,
    ) -> Result<(), ErrorCode> {
        desc.require(Rights::WRITE)?;
        let (atime, mtime) = (accessed.resolve(), modified.resolve());
        if desc.is_directory() {
            return self
                .fs
                .set_times(desc.host_path(), atime, mtime, true)
                .map_err(self.native(Operation::SetTimes));
        }
        let file = desc.native_file()?;
        let mut times = FileTimes::new();
        if let Some(atime) = atime {
            times = times.set_accessed(atime);
        }
        if let Some(mtime) = mtime {
            times = times.set_modified(mtime);
        }
        file.set_times(times).map_err(self.native(Operation::SetTimes))
    }

    pub fn set_times_at(
        &self,
        dir: &Descriptor,
        path_flags: PathFlags,
        path: &str,
        accessed: NewTimestamp,
        modified: NewTimestamp,
    ) -> Result<(), ErrorCode> {
        dir.require(Rights::WRITE)?;
        let resolved = self.resolve(dir, path, path_flags.symlink_follow)?;
        self.fs
            .set_times(
                &resolved.host_path,
                accessed.resolve(),
                modified.resolve(),
                path_flags.symlink_follow,
            )
            .map_err(self.native(Operation::SetTimes))
    }

    #[inline]
    pub fn get_type(&self, desc: &Descriptor) -> DescriptorType {
        desc.kind()
    }

    #[inline]
    pub fn get_flags(&self, desc: &Descriptor) -> Rights {
        desc.rights()
    }

    // =========================================================================
    // File data
    // =========================================================================

    /// Positional read; `ended` is set when end of file cut the read short
    pub fn read(&self, desc: &Descriptor, len: u64, offset: u64) -> Result<(Vec<u8>, bool), ErrorCode> {
        desc.require(Rights::READ)?;
        let file = desc.native_file()?;
        let len = usize::try_from(len).unwrap_or(usize::MAX).min(MAX_POSITIONAL_READ);
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let at = offset.checked_add(filled as u64).ok_or(ErrorCode::InvalidArgument)?;
            match read_at(&file, &mut buf[filled..], at) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.translator.translate(&e, Operation::Read)),
            }
        }
        buf.truncate(filled);
        trace!(requested = len, read = filled, offset, "positional read");
        Ok((buf, filled < len))
    }

    /// Positional write of every byte
    pub fn write(&self, desc: &Descriptor, bytes: &[u8], offset: u64) -> Result<u64, ErrorCode> {
        desc.require(Rights::WRITE)?;
        let file = desc.native_file()?;
        let mut written = 0;
        while written < bytes.len() {
            let at = offset.checked_add(written as u64).ok_or(ErrorCode::InvalidArgument)?;
            match write_at(&file, &bytes[written..], at) {
                Ok(0) => return Err(ErrorCode::NoSpace),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.translator.translate(&e, Operation::Write)),
            }
        }
        Ok(written as u64)
    }

    pub fn set_size(&self, desc: &Descriptor, size: u64) -> Result<(), ErrorCode> {
        desc.require(Rights::WRITE)?;
        desc.native_file()?
            .set_len(size)
            .map_err(self.native(Operation::SetSize))
    }

    pub fn sync(&self, desc: &Descriptor) -> Result<(), ErrorCode> {
        if desc.is_directory() {
            return Ok(());
        }
        desc.native_file()?
            .sync_all()
            .map_err(self.native(Operation::Sync))
    }

    pub fn sync_data(&self, desc: &Descriptor) -> Result<(), ErrorCode> {
        if desc.is_directory() {
            return Ok(());
        }
        desc.native_file()?
            .sync_data()
            .map_err(self.native(Operation::Sync))
    }

    // =========================================================================
    // Streams
    // =========================================================================

    /// Independent native handle positioned at `position`
    fn stream_handle(&self, desc: &Descriptor, position: SeekFrom) -> Result<tokio::fs::File, ErrorCode> {
        let file = desc.native_file()?;
        let mut clone: File = file.try_clone().map_err(self.native(Operation::Open))?;
        clone.seek(position).map_err(self.native(Operation::Other))?;
        Ok(tokio::fs::File::from_std(clone))
    }

    pub fn read_via_stream(&self, desc: &Descriptor, offset: u64) -> Result<InputStream, ErrorCode> {
        desc.require(Rights::READ)?;
        let handle = self.stream_handle(desc, SeekFrom::Start(offset))?;
        Ok(InputStream::from_async_read(
            &self.runtime,
            handle,
            self.stream_capacity,
            self.translator,
        ))
    }

    pub fn write_via_stream(&self, desc: &Descriptor, offset: u64) -> Result<OutputStream, ErrorCode> {
        desc.require(Rights::WRITE)?;
        let handle = self.stream_handle(desc, SeekFrom::Start(offset))?;
        Ok(OutputStream::from_async_write(
            &self.runtime,
            handle,
            self.stream_capacity,
            self.translator,
        ))
    }

    /// Stream positioned at the end of file as of this call
    pub fn append_via_stream(&self, desc: &Descriptor) -> Result<OutputStream, ErrorCode> {
        desc.require(Rights::WRITE)?;
        let handle = self.stream_handle(desc, SeekFrom::End(0))?;
        Ok(OutputStream::from_async_write(
            &self.runtime,
            handle,
            self.stream_capacity,
            self.translator,
        ))
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}
