/*!
 * Native Filesystem
 * Path-based host primitives behind one trait
 *
 * Every path-based native call made by the descriptor manager goes through
 * `NativeFs`, so a wrapper can observe or count them. Paths passed in are
 * already resolved host paths inside a preopen root.
 */

use super::types::{DescriptorStat, DescriptorType, DirectoryEntry};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Options for `NativeFs::open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeOpenOptions {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub create_new: bool,
    pub truncate: bool,
    /// Refuse a symlink in the final component
    pub nofollow: bool,
}

/// Lazy directory listing
pub type NativeDirIter = Box<dyn Iterator<Item = io::Result<DirectoryEntry>> + Send>;

/// Host filesystem primitives
pub trait NativeFs: Send + Sync {
    fn open(&self, path: &Path, options: NativeOpenOptions) -> io::Result<File>;

    /// Follows symlinks
    fn metadata(&self, path: &Path) -> io::Result<DescriptorStat>;

    /// Does not follow a final symlink
    fn symlink_metadata(&self, path: &Path) -> io::Result<DescriptorStat>;

    fn read_dir(&self, path: &Path) -> io::Result<NativeDirIter>;

    fn create_dir(&self, path: &Path) -> io::Result<()>;

    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create `link` pointing at `target` (stored verbatim)
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    fn set_times(
        &self,
        path: &Path,
        accessed: Option<SystemTime>,
        modified: Option<SystemTime>,
        follow: bool,
    ) -> io::Result<()>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// `std::fs` backed implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl NativeFs for HostFs {
    fn open(&self, path: &Path, options: NativeOpenOptions) -> io::Result<File> {
        let mut open = OpenOptions::new();
        open.read(options.read || !options.write)
            .write(options.write)
            .create(options.create && !options.create_new)
            .create_new(options.create_new)
            .truncate(options.truncate);
        #[cfg(unix)]
        if options.nofollow {
            use std::os::unix::fs::OpenOptionsExt;
            open.custom_flags(nix::fcntl::OFlag::O_NOFOLLOW.bits());
        }
        open.open(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<DescriptorStat> {
        fs::metadata(path).map(|md| DescriptorStat::from_metadata(&md))
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<DescriptorStat> {
        fs::symlink_metadata(path).map(|md| DescriptorStat::from_metadata(&md))
    }

    fn read_dir(&self, path: &Path) -> io::Result<NativeDirIter> {
        let entries = fs::read_dir(path)?.map(|entry| {
            let entry = entry?;
            let kind = entry
                .file_type()
                .map(DescriptorType::from_std)
                .unwrap_or_default();
            Ok(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            })
        });
        Ok(Box::new(entries))
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    #[cfg(unix)]
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        use std::os::windows::fs::{symlink_dir, symlink_file};
        let resolved = link
            .parent()
            .map(|parent| parent.join(target))
            .unwrap_or_else(|| target.to_path_buf());
        if resolved.is_dir() {
            symlink_dir(target, link)
        } else {
            symlink_file(target, link)
        }
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn set_times(
        &self,
        path: &Path,
        accessed: Option<SystemTime>,
        modified: Option<SystemTime>,
        follow: bool,
    ) -> io::Result<()> {
        if !follow && fs::symlink_metadata(path)?.file_type().is_symlink() {
            return Err(io::Error::from(io::ErrorKind::Unsupported));
        }
        if accessed.is_none() && modified.is_none() {
            return Ok(());
        }
        let file = open_for_times(path)?;
        let mut times = fs::FileTimes::new();
        if let Some(accessed) = accessed {
            times = times.set_accessed(accessed);
        }
        if let Some(modified) = modified {
            times = times.set_modified(modified);
        }
        file.set_times(times)
    }

    fn name(&self) -> &str {
        "host"
    }
}

#[cfg(unix)]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;
    OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
}
