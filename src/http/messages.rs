/*!
 * HTTP Messages
 * Request and response resources on both sides of the bridge
 */

use super::body::{BodySlot, IncomingBody, OutgoingBody, PendingBody, TrailerReceiver};
use super::fields::Fields;
use super::outparam::ServedResponse;
use super::types::{Method, Scheme};
use crate::core::ProtocolViolation;
use crate::streams::BodyStream;
use crate::table::{HostResource, ResourceKind};
use crate::translate::ErrorCode;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

/// Method, target and headers of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub scheme: Option<Scheme>,
    pub authority: Option<String>,
    pub path_with_query: Option<String>,
    pub headers: Fields,
}

fn valid_authority(authority: &str) -> bool {
    !authority.is_empty()
        && !authority
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
}

fn valid_path(path: &str) -> bool {
    (path.starts_with('/') || path == "*")
        && !path.chars().any(|c| c.is_whitespace() || c == '#')
}

fn valid_scheme(scheme: &Scheme) -> bool {
    match scheme {
        Scheme::Other(name) => {
            name.starts_with(|c: char| c.is_ascii_alphabetic())
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => true,
    }
}

/// Take the native body exactly once
fn take_pending(slot: &Mutex<Option<PendingBody>>, kind: ResourceKind) -> Result<IncomingBody, ProtocolViolation> {
    slot.lock()
        .take()
        .map(PendingBody::into_incoming)
        .ok_or(ProtocolViolation::AlreadyConsumed(kind))
}

// =============================================================================
// Client side
// =============================================================================

/// Request the guest is building
pub struct OutgoingRequest {
    head: Mutex<RequestHead>,
    body: BodySlot,
}

impl OutgoingRequest {
    pub(crate) fn new(headers: Fields, capacity: usize) -> Self {
        Self {
            head: Mutex::new(RequestHead {
                headers,
                ..Default::default()
            }),
            body: BodySlot::new(capacity),
        }
    }

    pub fn head(&self) -> RequestHead {
        self.head.lock().clone()
    }

    pub fn set_method(&self, method: Method) -> Result<(), ErrorCode> {
        method.to_native()?;
        self.head.lock().method = method;
        Ok(())
    }

    pub fn set_scheme(&self, scheme: Option<Scheme>) -> Result<(), ErrorCode> {
        if scheme.as_ref().map_or(false, |s| !valid_scheme(s)) {
            return Err(ErrorCode::InvalidArgument);
        }
        self.head.lock().scheme = scheme;
        Ok(())
    }

    pub fn set_authority(&self, authority: Option<String>) -> Result<(), ErrorCode> {
        if authority.as_deref().map_or(false, |a| !valid_authority(a)) {
            return Err(ErrorCode::InvalidArgument);
        }
        self.head.lock().authority = authority;
        Ok(())
    }

    pub fn set_path_with_query(&self, path: Option<String>) -> Result<(), ErrorCode> {
        if path.as_deref().map_or(false, |p| !valid_path(p)) {
            return Err(ErrorCode::InvalidArgument);
        }
        self.head.lock().path_with_query = path;
        Ok(())
    }

    /// Copy of the request headers
    pub fn headers(&self) -> Fields {
        self.head.lock().headers.clone()
    }

    /// The request body; available once
    pub fn body(&self) -> Result<OutgoingBody, ProtocolViolation> {
        self.body.create(ResourceKind::OutgoingBody)
    }

    pub(crate) fn take_body(&self) -> (Option<BodyStream>, TrailerReceiver) {
        self.body.take_native()
    }
}

impl HostResource for OutgoingRequest {}

impl fmt::Debug for OutgoingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingRequest")
            .field("head", &*self.head.lock())
            .finish()
    }
}

/// Response received from a native client call
pub struct IncomingResponse {
    status: u16,
    headers: Fields,
    body: Mutex<Option<PendingBody>>,
}

impl IncomingResponse {
    pub(crate) fn new(status: u16, headers: HeaderMap, body: PendingBody) -> Self {
        Self {
            status,
            headers: Fields::received(headers),
            body: Mutex::new(Some(body)),
        }
    }

    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> Fields {
        self.headers.clone()
    }

    pub fn consume(&self) -> Result<IncomingBody, ProtocolViolation> {
        take_pending(&self.body, ResourceKind::IncomingBody)
    }
}

impl HostResource for IncomingResponse {}

impl fmt::Debug for IncomingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers.len())
            .finish()
    }
}

// =============================================================================
// Server side
// =============================================================================

/// Request handed to the bridge by the embedder's listener
pub struct NativeIncomingRequest {
    pub method: Method,
    pub scheme: Option<Scheme>,
    pub authority: Option<String>,
    pub path_with_query: Option<String>,
    pub headers: HeaderMap,
    pub body: BodyStream,
    pub trailers: Option<HeaderMap>,
}

/// Request the guest is handling
pub struct IncomingRequest {
    head: RequestHead,
    body: Mutex<Option<PendingBody>>,
}

impl IncomingRequest {
    pub(crate) fn new(head: RequestHead, body: PendingBody) -> Self {
        Self {
            head,
            body: Mutex::new(Some(body)),
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    #[inline]
    pub fn scheme(&self) -> Option<&Scheme> {
        self.head.scheme.as_ref()
    }

    #[inline]
    pub fn authority(&self) -> Option<&str> {
        self.head.authority.as_deref()
    }

    #[inline]
    pub fn path_with_query(&self) -> Option<&str> {
        self.head.path_with_query.as_deref()
    }

    pub fn headers(&self) -> Fields {
        self.head.headers.clone()
    }

    pub fn consume(&self) -> Result<IncomingBody, ProtocolViolation> {
        take_pending(&self.body, ResourceKind::IncomingBody)
    }
}

impl HostResource for IncomingRequest {}

impl fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("method", &self.head.method)
            .field("path", &self.head.path_with_query)
            .finish()
    }
}

/// Response the guest is building
pub struct OutgoingResponse {
    status: AtomicU16,
    headers: Fields,
    body: BodySlot,
}

impl OutgoingResponse {
    pub(crate) fn new(headers: Fields, capacity: usize) -> Self {
        Self {
            status: AtomicU16::new(200),
            headers,
            body: BodySlot::new(capacity),
        }
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.status.load(Ordering::Acquire)
    }

    pub fn set_status_code(&self, status: u16) -> Result<(), ErrorCode> {
        reqwest::StatusCode::from_u16(status).map_err(|_| ErrorCode::InvalidArgument)?;
        self.status.store(status, Ordering::Release);
        Ok(())
    }

    pub fn headers(&self) -> Fields {
        self.headers.clone()
    }

    /// The response body; available once
    pub fn body(&self) -> Result<OutgoingBody, ProtocolViolation> {
        self.body.create(ResourceKind::OutgoingBody)
    }

    pub(crate) fn serve(&self) -> ServedResponse {
        let (body, trailers) = self.body.take_native();
        ServedResponse {
            status: self.status_code(),
            headers: self.headers.as_map().clone(),
            body: body.unwrap_or_else(|| stream::empty().boxed()),
            trailers,
        }
    }
}

impl HostResource for OutgoingResponse {}

impl fmt::Debug for OutgoingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingResponse")
            .field("status", &self.status_code())
            .field("headers", &self.headers.len())
            .finish()
    }
}
