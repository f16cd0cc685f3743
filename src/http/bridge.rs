/*!
 * HTTP Bridge
 * Outgoing requests to native client calls, incoming requests to guest handlers
 *
 * Authority and header policy are enforced before the client is touched;
 * a refused request never reaches `HttpClient::send`.
 */

use super::body::PendingBody;
use super::client::{HttpClient, NativeRequest};
use super::fields::{Fields, ForbiddenHeaders, HeaderError};
use super::future::FutureIncomingResponse;
use super::messages::{IncomingRequest, NativeIncomingRequest, OutgoingRequest, OutgoingResponse, RequestHead};
use super::outparam::{ResponseOutparam, ResponseReceiver};
use super::types::{split_authority, RequestOptions, Scheme};
use crate::core::limits::DEFAULT_STREAM_CAPACITY;
use crate::sockets::AuthorityAllowList;
use crate::translate::ErrorCode;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::{info, warn};

pub struct HttpBridge {
    client: Arc<dyn HttpClient>,
    allow: Arc<AuthorityAllowList>,
    forbidden: Arc<ForbiddenHeaders>,
    runtime: RuntimeHandle,
    stream_capacity: usize,
}

impl HttpBridge {
    pub fn new(
        client: Arc<dyn HttpClient>,
        allow: Arc<AuthorityAllowList>,
        forbidden: Arc<ForbiddenHeaders>,
        runtime: RuntimeHandle,
    ) -> Self {
        Self {
            client,
            allow,
            forbidden,
            runtime,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }

    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }

    #[inline]
    pub fn forbidden_headers(&self) -> &ForbiddenHeaders {
        &self.forbidden
    }

    // =========================================================================
    // Header fields
    // =========================================================================

    /// Guest-built fields, subject to the forbidden-header policy
    pub fn fields_from_list(&self, entries: &[(String, Vec<u8>)]) -> Result<Fields, HeaderError> {
        for (name, _) in entries {
            self.forbidden.check(name)?;
        }
        Fields::from_list(entries.iter().map(|(n, v)| (n.as_str(), v.as_slice())))
    }

    pub fn fields_set(&self, fields: &mut Fields, name: &str, values: &[Vec<u8>]) -> Result<(), HeaderError> {
        self.forbidden.check(name)?;
        fields.set(name, values)
    }

    pub fn fields_append(&self, fields: &mut Fields, name: &str, value: &[u8]) -> Result<(), HeaderError> {
        self.forbidden.check(name)?;
        fields.append(name, value)
    }

    // =========================================================================
    // Client side
    // =========================================================================

    pub fn new_outgoing_request(&self, headers: Fields) -> OutgoingRequest {
        OutgoingRequest::new(headers, self.stream_capacity)
    }

    /// Dispatch exactly one native call for `request`
    pub fn handle(
        &self,
        request: &OutgoingRequest,
        options: Option<RequestOptions>,
    ) -> Result<FutureIncomingResponse, ErrorCode> {
        let head = request.head();
        let scheme = head.scheme.clone().unwrap_or(Scheme::Https);
        if matches!(scheme, Scheme::Other(_)) {
            return Err(ErrorCode::Unsupported);
        }
        let authority = head.authority.as_deref().ok_or(ErrorCode::InvalidArgument)?;
        let (host, port) =
            split_authority(authority, scheme.default_port()).ok_or(ErrorCode::InvalidArgument)?;
        let path = head.path_with_query.as_deref().unwrap_or("/");
        if !path.is_empty() && !path.starts_with('/') {
            return Err(ErrorCode::InvalidArgument);
        }

        // Gate on the destination the client will actually contact
        let url = reqwest::Url::parse(&format!("{scheme}://{authority}{path}"))
            .map_err(|_| ErrorCode::InvalidArgument)?;
        let target = url.host_str().ok_or(ErrorCode::InvalidArgument)?;
        let target_port = url.port_or_known_default().ok_or(ErrorCode::InvalidArgument)?;
        if !self.allow.permits(target, target_port) {
            warn!(%host, %target, port = target_port, "outgoing request to authority not on allow-list");
            return Err(ErrorCode::AccessDenied);
        }
        if !same_host(&host, target) || port != target_port {
            warn!(%host, %target, "authority does not match the parsed destination");
            return Err(ErrorCode::InvalidArgument);
        }

        let headers = self
            .forbidden
            .apply(&head.headers)
            .map_err(|_| ErrorCode::AccessDenied)?;
        let method = head.method.to_native()?;

        // Trailers on outgoing requests are not transmitted by the native client
        let (body, _trailers) = request.take_body();
        info!(%method, %host, port, "outgoing request dispatched");
        let call = self.client.send(NativeRequest {
            method,
            url,
            headers,
            body,
            options: options.unwrap_or_default(),
        });
        Ok(FutureIncomingResponse::spawn(&self.runtime, call, self.stream_capacity))
    }

    // =========================================================================
    // Server side
    // =========================================================================

    /// Wrap a request received by the embedder
    pub fn new_incoming_request(&self, native: NativeIncomingRequest) -> IncomingRequest {
        let head = RequestHead {
            method: native.method,
            scheme: native.scheme,
            authority: native.authority,
            path_with_query: native.path_with_query,
            headers: Fields::received(native.headers),
        };
        let body = PendingBody {
            stream: native.body,
            trailers: native.trailers,
            runtime: self.runtime.clone(),
            capacity: self.stream_capacity,
        };
        IncomingRequest::new(head, body)
    }

    pub fn new_response_outparam(&self) -> (ResponseOutparam, ResponseReceiver) {
        ResponseOutparam::new()
    }

    pub fn new_outgoing_response(&self, headers: Fields) -> OutgoingResponse {
        OutgoingResponse::new(headers, self.stream_capacity)
    }
}

/// Guest-written host and URL host name the same destination, spelled the same way
fn same_host(raw: &str, parsed: &str) -> bool {
    let raw = raw.trim_start_matches('[').trim_end_matches(']');
    let parsed = parsed.trim_start_matches('[').trim_end_matches(']');
    match (raw.parse::<IpAddr>(), parsed.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        (Err(_), Err(_)) => raw.eq_ignore_ascii_case(parsed),
        _ => false,
    }
}
