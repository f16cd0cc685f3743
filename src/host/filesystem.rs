/*!
 * Filesystem Calls
 * Handle-based wrappers over `DescriptorManager`
 */

use super::context::HostContext;
use crate::core::{Handle, HostResult};
use crate::filesystem::{
    Descriptor, DescriptorStat, DescriptorType, DirectoryEntry, DirectoryEntryStream,
    NewTimestamp, OpenFlags, PathFlags, Rights,
};
use tracing::instrument;

impl HostContext {
    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn open_at(
        &self,
        dir: Handle,
        path_flags: PathFlags,
        path: &str,
        open_flags: OpenFlags,
        rights: Rights,
    ) -> HostResult<Handle> {
        let parent = self.get::<Descriptor>(dir)?;
        let child = self
            .filesystem
            .open_at(&parent, path_flags, path, open_flags, rights)?;
        self.push(child)
    }

    pub fn read_directory(&self, dir: Handle) -> HostResult<Handle> {
        let dir = self.get::<Descriptor>(dir)?;
        let entries = self.filesystem.read_directory(&dir)?;
        self.push(entries)
    }

    /// Next entry, or `None` once the listing is exhausted
    pub fn read_directory_entry(&self, stream: Handle) -> HostResult<Option<DirectoryEntry>> {
        let stream = self.get::<DirectoryEntryStream>(stream)?;
        Ok(stream.read_entry()?)
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn create_directory_at(&self, dir: Handle, path: &str) -> HostResult<()> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self.filesystem.create_directory_at(&dir, path)?)
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn remove_directory_at(&self, dir: Handle, path: &str) -> HostResult<()> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self.filesystem.remove_directory_at(&dir, path)?)
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn unlink_file_at(&self, dir: Handle, path: &str) -> HostResult<()> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self.filesystem.unlink_file_at(&dir, path)?)
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn rename_at(
        &self,
        old_dir: Handle,
        old_path: &str,
        new_dir: Handle,
        new_path: &str,
    ) -> HostResult<()> {
        let old_dir = self.get::<Descriptor>(old_dir)?;
        let new_dir = self.get::<Descriptor>(new_dir)?;
        Ok(self
            .filesystem
            .rename_at(&old_dir, old_path, &new_dir, new_path)?)
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn symlink_at(&self, dir: Handle, target: &str, link_path: &str) -> HostResult<()> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self.filesystem.symlink_at(&dir, target, link_path)?)
    }

    pub fn readlink_at(&self, dir: Handle, path: &str) -> HostResult<String> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self.filesystem.readlink_at(&dir, path)?)
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn link_at(
        &self,
        old_dir: Handle,
        old_flags: PathFlags,
        old_path: &str,
        new_dir: Handle,
        new_path: &str,
    ) -> HostResult<()> {
        let old_dir = self.get::<Descriptor>(old_dir)?;
        let new_dir = self.get::<Descriptor>(new_dir)?;
        Ok(self
            .filesystem
            .link_at(&old_dir, old_flags, old_path, &new_dir, new_path)?)
    }

    pub fn stat(&self, desc: Handle) -> HostResult<DescriptorStat> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.stat(&desc)?)
    }

    pub fn stat_at(&self, dir: Handle, path_flags: PathFlags, path: &str) -> HostResult<DescriptorStat> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self.filesystem.stat_at(&dir, path_flags, path)?)
    }

    pub fn set_times(
        &self,
        desc: Handle,
        accessed: NewTimestamp,
        modified: NewTimestamp,
    ) -> HostResult<()> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.set_times(&desc, accessed, modified)?)
    }

    pub fn set_times_at(
        &self,
        dir: Handle,
        path_flags: PathFlags,
        path: &str,
        accessed: NewTimestamp,
        modified: NewTimestamp,
    ) -> HostResult<()> {
        let dir = self.get::<Descriptor>(dir)?;
        Ok(self
            .filesystem
            .set_times_at(&dir, path_flags, path, accessed, modified)?)
    }

    pub fn get_type(&self, desc: Handle) -> HostResult<DescriptorType> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.get_type(&desc))
    }

    pub fn get_flags(&self, desc: Handle) -> HostResult<Rights> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.get_flags(&desc))
    }

    /// Positional read; `true` once the end of the file is reached
    pub fn read(&self, desc: Handle, len: u64, offset: u64) -> HostResult<(Vec<u8>, bool)> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.read(&desc, len, offset)?)
    }

    pub fn write(&self, desc: Handle, bytes: &[u8], offset: u64) -> HostResult<u64> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.write(&desc, bytes, offset)?)
    }

    pub fn set_size(&self, desc: Handle, size: u64) -> HostResult<()> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.set_size(&desc, size)?)
    }

    pub fn sync(&self, desc: Handle) -> HostResult<()> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.sync(&desc)?)
    }

    pub fn sync_data(&self, desc: Handle) -> HostResult<()> {
        let desc = self.get::<Descriptor>(desc)?;
        Ok(self.filesystem.sync_data(&desc)?)
    }

    pub fn read_via_stream(&self, desc: Handle, offset: u64) -> HostResult<Handle> {
        let desc = self.get::<Descriptor>(desc)?;
        let stream = self.filesystem.read_via_stream(&desc, offset)?;
        self.push(stream)
    }

    pub fn write_via_stream(&self, desc: Handle, offset: u64) -> HostResult<Handle> {
        let desc = self.get::<Descriptor>(desc)?;
        let stream = self.filesystem.write_via_stream(&desc, offset)?;
        self.push(stream)
    }

    pub fn append_via_stream(&self, desc: Handle) -> HostResult<Handle> {
        let desc = self.get::<Descriptor>(desc)?;
        let stream = self.filesystem.append_via_stream(&desc)?;
        self.push(stream)
    }
}
