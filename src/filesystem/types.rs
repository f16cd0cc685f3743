/*!
 * Filesystem Types
 * Rights, flags, node kinds, and stat records exchanged with guests
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[inline]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Rights bitset carried by every descriptor
///
/// A child descriptor's rights are always a subset of its parent's.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rights(u32);

impl Rights {
    pub const NONE: Rights = Rights(0);
    /// Read file data or directory entries
    pub const READ: Rights = Rights(1 << 0);
    /// Write file data, truncate, set times
    pub const WRITE: Rights = Rights(1 << 1);
    /// Resolve paths relative to this directory
    pub const LOOKUP: Rights = Rights(1 << 2);
    /// Create files, directories, and links
    pub const CREATE: Rights = Rights(1 << 3);
    /// Remove and rename entries
    pub const MUTATE_DIRECTORY: Rights = Rights(1 << 4);

    pub const ALL: Rights = Rights(0b1_1111);
    pub const READ_ONLY: Rights = Rights(Self::READ.0 | Self::LOOKUP.0);

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Unknown bits are dropped
    #[inline]
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Rights(bits & Self::ALL.0)
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Rights) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn is_subset_of(self, other: Rights) -> bool {
        other.contains(self)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Rights {
    type Output = Rights;

    fn bitor(self, rhs: Rights) -> Rights {
        Rights(self.0 | rhs.0)
    }
}

impl BitAnd for Rights {
    type Output = Rights;

    fn bitand(self, rhs: Rights) -> Rights {
        Rights(self.0 & rhs.0)
    }
}

impl fmt::Debug for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rights({self})")
    }
}

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Rights, &str); 5] = [
            (Rights::READ, "read"),
            (Rights::WRITE, "write"),
            (Rights::LOOKUP, "lookup"),
            (Rights::CREATE, "create"),
            (Rights::MUTATE_DIRECTORY, "mutate-directory"),
        ];
        let mut first = true;
        for (right, name) in NAMES {
            if self.contains(right) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Flags controlling `open_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct OpenFlags {
    #[serde(skip_serializing_if = "is_false")]
    pub create: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub directory: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub exclusive: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub truncate: bool,
}

impl OpenFlags {
    #[inline]
    #[must_use]
    pub fn create() -> Self {
        Self {
            create: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn directory() -> Self {
        Self {
            directory: true,
            ..Default::default()
        }
    }
}

/// How the final path component is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PathFlags {
    pub symlink_follow: bool,
}

impl Default for PathFlags {
    fn default() -> Self {
        Self {
            symlink_follow: true,
        }
    }
}

impl PathFlags {
    pub const FOLLOW: PathFlags = PathFlags {
        symlink_follow: true,
    };
    pub const NO_FOLLOW: PathFlags = PathFlags {
        symlink_follow: false,
    };
}

/// Node kind of a filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorType {
    #[default]
    Unknown,
    BlockDevice,
    CharacterDevice,
    Directory,
    Fifo,
    SymbolicLink,
    RegularFile,
    Socket,
}

impl DescriptorType {
    pub fn from_std(file_type: std::fs::FileType) -> Self {
        if file_type.is_symlink() {
            return DescriptorType::SymbolicLink;
        }
        if file_type.is_dir() {
            return DescriptorType::Directory;
        }
        if file_type.is_file() {
            return DescriptorType::RegularFile;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_block_device() {
                return DescriptorType::BlockDevice;
            }
            if file_type.is_char_device() {
                return DescriptorType::CharacterDevice;
            }
            if file_type.is_fifo() {
                return DescriptorType::Fifo;
            }
            if file_type.is_socket() {
                return DescriptorType::Socket;
            }
        }
        DescriptorType::Unknown
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorType::Unknown => "unknown",
            DescriptorType::BlockDevice => "block-device",
            DescriptorType::CharacterDevice => "character-device",
            DescriptorType::Directory => "directory",
            DescriptorType::Fifo => "fifo",
            DescriptorType::SymbolicLink => "symbolic-link",
            DescriptorType::RegularFile => "regular-file",
            DescriptorType::Socket => "socket",
        };
        f.write_str(name)
    }
}

/// Seconds and nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Datetime {
    pub seconds: u64,
    pub nanoseconds: u32,
}

impl Datetime {
    /// Times before the epoch clamp to the epoch
    pub fn from_system_time(time: SystemTime) -> Self {
        let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: since.as_secs(),
            nanoseconds: since.subsec_nanos(),
        }
    }

    pub fn to_system_time(self) -> Option<SystemTime> {
        UNIX_EPOCH.checked_add(Duration::new(self.seconds, self.nanoseconds))
    }
}

/// Metadata for one filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorStat {
    #[serde(rename = "type")]
    pub kind: DescriptorType,
    pub link_count: u64,
    pub size: u64,
    pub data_access_timestamp: Option<Datetime>,
    pub data_modification_timestamp: Option<Datetime>,
    pub status_change_timestamp: Option<Datetime>,
}

impl DescriptorStat {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let kind = DescriptorType::from_std(metadata.file_type());
        #[cfg(unix)]
        let (link_count, status_change) = {
            use std::os::unix::fs::MetadataExt;
            let ctime = u64::try_from(metadata.ctime()).ok().map(|seconds| Datetime {
                seconds,
                nanoseconds: metadata.ctime_nsec().clamp(0, 999_999_999) as u32,
            });
            (metadata.nlink(), ctime)
        };
        #[cfg(not(unix))]
        let (link_count, status_change) = (1, None);

        Self {
            kind,
            link_count,
            size: metadata.len(),
            data_access_timestamp: metadata.accessed().ok().map(Datetime::from_system_time),
            data_modification_timestamp: metadata
                .modified()
                .ok()
                .map(Datetime::from_system_time),
            status_change_timestamp: status_change,
        }
    }
}

/// Requested change to one timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "value")]
pub enum NewTimestamp {
    #[default]
    NoChange,
    Now,
    Timestamp(Datetime),
}

impl NewTimestamp {
    pub fn resolve(self) -> Option<SystemTime> {
        match self {
            NewTimestamp::NoChange => None,
            NewTimestamp::Now => Some(SystemTime::now()),
            NewTimestamp::Timestamp(datetime) => datetime.to_system_time(),
        }
    }
}

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DescriptorType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rights_subset() {
        let parent = Rights::READ | Rights::LOOKUP;
        assert!(Rights::READ.is_subset_of(parent));
        assert!(!Rights::WRITE.is_subset_of(parent));
        assert!(Rights::NONE.is_subset_of(parent));
        assert!(parent.is_subset_of(Rights::ALL));
    }

    #[test]
    fn test_rights_display() {
        assert_eq!(Rights::READ_ONLY.to_string(), "read|lookup");
        assert_eq!(Rights::NONE.to_string(), "none");
        assert_eq!(Rights::from_bits_truncate(u32::MAX), Rights::ALL);
    }

    #[test]
    fn test_open_flags_compact_json() {
        let json = serde_json::to_string(&OpenFlags::create()).unwrap();
        assert_eq!(json, r#"{"create":true}"#);
        let back: OpenFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OpenFlags::create());
    }

    #[test]
    fn test_datetime_clamps_before_epoch() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(Datetime::from_system_time(before), Datetime::default());
    }

    #[test]
    fn test_descriptor_type_serialization() {
        let json = serde_json::to_string(&DescriptorType::RegularFile).unwrap();
        assert_eq!(json, "\"regular-file\"");
    }
}
