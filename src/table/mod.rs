/*!
 * Resource Table
 * Per-instantiation owner of every guest-visible resource
 */

mod resource;
mod table;

pub use resource::{HostResource, Resource, ResourceKind, TableEntry};
pub use table::{Reservation, ResourceTable, TableError};
