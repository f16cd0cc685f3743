/*!
 * Handle Table
 *
 * # Performance
 * - Sharded `DashMap` with ahash, so lookups on distinct handles do not contend
 * - Handles come from a lock-free monotonic counter and are never reissued
 * - Capacity is reserved atomically before insertion, so concurrent pushes
 *   never exceed it
 */

use super::resource::{Resource, ResourceKind, TableEntry};
use crate::core::id::{Handle, HandleGenerator};
use crate::core::limits::DEFAULT_MAX_RESOURCES;
use ahash::RandomState;
use dashmap::DashMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Table lookup failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum TableError {
    #[error("Handle {0} not found")]
    #[diagnostic(code(table::not_found))]
    NotFound(Handle),

    #[error("Handle {handle} holds a {actual}, not a {expected}")]
    #[diagnostic(code(table::wrong_type))]
    WrongType {
        handle: Handle,
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("Resource table full ({capacity} live handles)")]
    #[diagnostic(
        code(table::full),
        help("Drop unused resources or raise max_resources.")
    )]
    Full { capacity: usize },
}

/// Owner of all resources for one instantiation
pub struct ResourceTable {
    entries: DashMap<Handle, Resource, RandomState>,
    handles: HandleGenerator,
    live: AtomicUsize,
    capacity: usize,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RESOURCES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            handles: HandleGenerator::new(),
            live: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Claim room for one resource; the claim lapses if never filled
    pub fn reserve(&self) -> Result<Reservation<'_>, TableError> {
        let full = TableError::Full {
            capacity: self.capacity,
        };
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.capacity).then_some(live + 1)
            })
            .map_err(|_| full)?;
        match self.handles.next() {
            Some(handle) => Ok(Reservation {
                table: self,
                handle,
                filled: false,
            }),
            None => {
                self.live.fetch_sub(1, Ordering::AcqRel);
                Err(full)
            }
        }
    }

    /// Insert a resource under a fresh handle
    ///
    /// A resource that does not fit is released before the error returns.
    pub fn allocate(&self, resource: Resource) -> Result<Handle, TableError> {
        match self.reserve() {
            Ok(reservation) => Ok(reservation.fill_resource(resource)),
            Err(err) => {
                debug!(kind = %resource.kind(), "table full, releasing resource");
                resource.release();
                Err(err)
            }
        }
    }

    #[inline]
    pub fn push<T: TableEntry>(&self, value: T) -> Result<Handle, TableError> {
        self.allocate(T::wrap(Arc::new(value)))
    }

    #[inline]
    pub fn push_arc<T: TableEntry>(&self, value: Arc<T>) -> Result<Handle, TableError> {
        self.allocate(T::wrap(value))
    }

    pub fn get(&self, handle: Handle) -> Result<Resource, TableError> {
        self.entries
            .get(&handle)
            .map(|entry| entry.value().clone())
            .ok_or(TableError::NotFound(handle))
    }

    /// Typed lookup
    pub fn get_as<T: TableEntry>(&self, handle: Handle) -> Result<Arc<T>, TableError> {
        let resource = self.get(handle)?;
        T::project(&resource)
            .cloned()
            .ok_or(TableError::WrongType {
                handle,
                expected: T::KIND,
                actual: resource.kind(),
            })
    }

    /// Remove a resource without releasing it, transferring ownership to
    /// the caller (e.g. a request consumed by sending it)
    pub fn take_as<T: TableEntry>(&self, handle: Handle) -> Result<Arc<T>, TableError> {
        match self
            .entries
            .remove_if(&handle, |_, resource| T::project(resource).is_some())
        {
            Some((_, resource)) => {
                self.live.fetch_sub(1, Ordering::AcqRel);
                T::project(&resource).cloned().ok_or(TableError::WrongType {
                handle,
                expected: T::KIND,
                    actual: resource.kind(),
                })
            }
            None => {
                let actual = self.kind_of(handle)?;
                Err(TableError::WrongType {
                    handle,
                    expected: T::KIND,
                    actual,
                })
            }
        }
    }

    /// Remove a handle and release its native counterpart before returning
    pub fn drop_handle(&self, handle: Handle) -> Result<ResourceKind, TableError> {
        let (_, resource) = self
            .entries
            .remove(&handle)
            .ok_or(TableError::NotFound(handle))?;
        self.live.fetch_sub(1, Ordering::AcqRel);
        let kind = resource.kind();
        resource.release();
        debug!(%handle, %kind, "dropped handle");
        Ok(kind)
    }

    pub fn kind_of(&self, handle: Handle) -> Result<ResourceKind, TableError> {
        self.entries
            .get(&handle)
            .map(|entry| entry.value().kind())
            .ok_or(TableError::NotFound(handle))
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Room for one resource, claimed ahead of producing it
pub struct Reservation<'a> {
    table: &'a ResourceTable,
    handle: Handle,
    filled: bool,
}

impl Reservation<'_> {
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn fill<T: TableEntry>(self, value: T) -> Handle {
        self.fill_resource(T::wrap(Arc::new(value)))
    }

    pub fn fill_resource(mut self, resource: Resource) -> Handle {
        trace!(handle = %self.handle, kind = %resource.kind(), "allocated handle");
        self.table.entries.insert(self.handle, resource);
        self.filled = true;
        self.handle
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.table.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResourceTable {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.value().release();
        }
    }
}
