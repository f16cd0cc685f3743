/*!
 * Resource Variants
 *
 * One exhaustive tagged union over every resource kind the table can hold.
 * Each variant wraps the concrete resource in an `Arc` so call-surface
 * operations can work on a resource without holding the table lock.
 */

use crate::filesystem::{Descriptor, DirectoryEntryStream};
use crate::http::{
    FutureIncomingResponse, IncomingBody, IncomingRequest, IncomingResponse, OutgoingBody,
    OutgoingRequest, OutgoingResponse, ResponseOutparam,
};
use crate::poll::Pollable;
use crate::sockets::{Network, ResolveAddressStream, TcpSocket};
use crate::streams::{InputStream, OutputStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Behavior every table resident provides on drop
pub trait HostResource: Send + Sync + 'static {
    /// Release the native counterpart: close handles, cancel pending work.
    /// Called exactly once, synchronously, when the handle is dropped.
    fn release(&self) {}
}

/// Typed projection between a concrete resource and `Resource`
pub trait TableEntry: HostResource + Sized {
    const KIND: ResourceKind;

    fn wrap(this: Arc<Self>) -> Resource;

    fn project(resource: &Resource) -> Option<&Arc<Self>>;
}

macro_rules! resources {
    ($($variant:ident($ty:ty) => $name:literal),* $(,)?) => {
        /// A live table resident
        #[derive(Clone)]
        pub enum Resource {
            $($variant(Arc<$ty>),)*
        }

        /// Discriminant of `Resource`
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum ResourceKind {
            $($variant,)*
        }

        impl ResourceKind {
            #[inline]
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $name,)*
                }
            }
        }

        impl Resource {
            #[inline]
            #[must_use]
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(Resource::$variant(_) => ResourceKind::$variant,)*
                }
            }

            pub(crate) fn release(&self) {
                match self {
                    $(Resource::$variant(inner) => HostResource::release(inner.as_ref()),)*
                }
            }
        }

        $(
            impl TableEntry for $ty {
                const KIND: ResourceKind = ResourceKind::$variant;

                #[inline]
                fn wrap(this: Arc<Self>) -> Resource {
                    Resource::$variant(this)
                }

                #[inline]
                fn project(resource: &Resource) -> Option<&Arc<Self>> {
                    match resource {
                        Resource::$variant(inner) => Some(inner),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

resources! {
    Descriptor(Descriptor) => "descriptor",
    DirectoryEntryStream(DirectoryEntryStream) => "directory-entry-stream",
    InputStream(InputStream) => "input-stream",
    OutputStream(OutputStream) => "output-stream",
    Pollable(Pollable) => "pollable",
    Network(Network) => "network",
    TcpSocket(TcpSocket) => "tcp-socket",
    ResolveAddressStream(ResolveAddressStream) => "resolve-address-stream",
    OutgoingRequest(OutgoingRequest) => "outgoing-request",
    OutgoingResponse(OutgoingResponse) => "outgoing-response",
    OutgoingBody(OutgoingBody) => "outgoing-body",
    FutureIncomingResponse(FutureIncomingResponse) => "future-incoming-response",
    IncomingRequest(IncomingRequest) => "incoming-request",
    IncomingResponse(IncomingResponse) => "incoming-response",
    IncomingBody(IncomingBody) => "incoming-body",
    ResponseOutparam(ResponseOutparam) => "response-outparam",
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resource").field(&self.kind()).finish()
    }
}
