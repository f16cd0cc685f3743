/*!
 * Filesystem
 * Preopened directory sandboxes and the descriptors opened inside them
 */

mod descriptor;
mod directory;
mod manager;
mod native;
mod preopen;
mod resolve;
mod types;

pub use descriptor::Descriptor;
pub use directory::DirectoryEntryStream;
pub use manager::DescriptorManager;
pub use native::{HostFs, NativeDirIter, NativeFs, NativeOpenOptions};
pub use preopen::Preopen;
pub use resolve::ResolvedPath;
pub use types::{
    Datetime, DescriptorStat, DescriptorType, DirectoryEntry, NewTimestamp, OpenFlags, PathFlags,
    Rights,
};
