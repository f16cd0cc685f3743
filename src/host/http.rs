/*!
 * HTTP Calls
 * Handle-based surface over `HttpBridge`
 *
 * Fields are plain values passed in and out by copy; every other HTTP
 * entity lives in the resource table.
 */

use super::context::HostContext;
use crate::core::{Handle, HostResult};
use crate::http::{
    Fields, FutureIncomingResponse, IncomingBody, IncomingRequest, IncomingResponse, Method,
    NativeIncomingRequest, OutgoingBody, OutgoingRequest, OutgoingResponse, RequestHead,
    RequestOptions, ResponseOutparam, ResponseReceiver, Scheme,
};
use crate::monitoring::call_span;
use crate::translate::ErrorCode;
use tracing::instrument;

impl HostContext {
    // =========================================================================
    // Fields
    // =========================================================================

    /// Build fields, applying the forbidden-header policy
    pub fn fields_from_list(&self, entries: &[(String, Vec<u8>)]) -> HostResult<Fields> {
        Ok(self.http.fields_from_list(entries)?)
    }

    pub fn fields_set(&self, fields: &mut Fields, name: &str, values: &[Vec<u8>]) -> HostResult<()> {
        Ok(self.http.fields_set(fields, name, values)?)
    }

    pub fn fields_append(&self, fields: &mut Fields, name: &str, value: &[u8]) -> HostResult<()> {
        Ok(self.http.fields_append(fields, name, value)?)
    }

    // =========================================================================
    // Outgoing requests
    // =========================================================================

    pub fn new_outgoing_request(&self, headers: Fields) -> HostResult<Handle> {
        self.push(self.http.new_outgoing_request(headers))
    }

    pub fn outgoing_request_head(&self, request: Handle) -> HostResult<RequestHead> {
        Ok(self.get::<OutgoingRequest>(request)?.head())
    }

    pub fn outgoing_request_set_method(&self, request: Handle, method: Method) -> HostResult<()> {
        Ok(self.get::<OutgoingRequest>(request)?.set_method(method)?)
    }

    pub fn outgoing_request_set_scheme(&self, request: Handle, scheme: Option<Scheme>) -> HostResult<()> {
        Ok(self.get::<OutgoingRequest>(request)?.set_scheme(scheme)?)
    }

    pub fn outgoing_request_set_authority(
        &self,
        request: Handle,
        authority: Option<String>,
    ) -> HostResult<()> {
        Ok(self
            .get::<OutgoingRequest>(request)?
            .set_authority(authority)?)
    }

    pub fn outgoing_request_set_path_with_query(
        &self,
        request: Handle,
        path: Option<String>,
    ) -> HostResult<()> {
        Ok(self
            .get::<OutgoingRequest>(request)?
            .set_path_with_query(path)?)
    }

    pub fn outgoing_request_headers(&self, request: Handle) -> HostResult<Fields> {
        Ok(self.get::<OutgoingRequest>(request)?.headers())
    }

    pub fn outgoing_request_body(&self, request: Handle) -> HostResult<Handle> {
        let body = self.get::<OutgoingRequest>(request)?.body()?;
        self.push(body)
    }

    // =========================================================================
    // Outgoing bodies
    // =========================================================================

    pub fn outgoing_body_write(&self, body: Handle) -> HostResult<Handle> {
        let stream = self.get::<OutgoingBody>(body)?.write()?;
        self.push(stream)
    }

    /// Consume the body handle, completing it with optional trailers
    pub fn outgoing_body_finish(&self, body: Handle, trailers: Option<Fields>) -> HostResult<()> {
        let body = self.table.take_as::<OutgoingBody>(body)?;
        Ok(body.finish(trailers)?)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Consume `request` and start exactly one native call for it
    ///
    /// Refusals (authority, headers, scheme) consume the request too.
    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn handle(&self, request: Handle, options: Option<RequestOptions>) -> HostResult<Handle> {
        let request = self.table.take_as::<OutgoingRequest>(request)?;
        let future = self.http.handle(&request, options)?;
        self.push(future)
    }

    /// `None` while pending; the result can be taken once
    pub fn future_response_get(
        &self,
        future: Handle,
    ) -> HostResult<Option<Result<Handle, ErrorCode>>> {
        let future = self.get::<FutureIncomingResponse>(future)?;
        if !future.is_ready() {
            return Ok(None);
        }
        // Claim the table slot first so a full table leaves the result in place
        let slot = self.table.reserve()?;
        match future.get()? {
            None => Ok(None),
            Some(Err(code)) => Ok(Some(Err(code))),
            Some(Ok(response)) => Ok(Some(Ok(slot.fill(response)))),
        }
    }

    pub fn future_response_subscribe(&self, future: Handle) -> HostResult<Handle> {
        let future = self.get::<FutureIncomingResponse>(future)?;
        self.push(future.subscribe())
    }

    // =========================================================================
    // Incoming responses and bodies
    // =========================================================================

    pub fn incoming_response_status(&self, response: Handle) -> HostResult<u16> {
        Ok(self.get::<IncomingResponse>(response)?.status())
    }

    pub fn incoming_response_headers(&self, response: Handle) -> HostResult<Fields> {
        Ok(self.get::<IncomingResponse>(response)?.headers())
    }

    pub fn incoming_response_consume(&self, response: Handle) -> HostResult<Handle> {
        let body = self.get::<IncomingResponse>(response)?.consume()?;
        self.push(body)
    }

    pub fn incoming_body_stream(&self, body: Handle) -> HostResult<Handle> {
        let stream = self.get::<IncomingBody>(body)?.stream()?;
        self.push(stream)
    }

    /// Trailers once the body is fully read; `would-block` before that
    pub fn incoming_body_trailers(&self, body: Handle) -> HostResult<Option<Fields>> {
        Ok(self.get::<IncomingBody>(body)?.trailers()?)
    }

    pub fn incoming_body_subscribe_trailers(&self, body: Handle) -> HostResult<Handle> {
        let body = self.get::<IncomingBody>(body)?;
        self.push(body.subscribe_trailers())
    }

    // =========================================================================
    // Server side
    // =========================================================================

    /// Host side: register a request received by the embedder's listener
    pub fn new_incoming_request(&self, native: NativeIncomingRequest) -> HostResult<Handle> {
        self.push(self.http.new_incoming_request(native))
    }

    /// Host side: outparam handle plus the receiver the embedder awaits
    pub fn new_response_outparam(&self) -> HostResult<(Handle, ResponseReceiver)> {
        let (outparam, receiver) = self.http.new_response_outparam();
        Ok((self.push(outparam)?, receiver))
    }

    pub fn incoming_request_method(&self, request: Handle) -> HostResult<Method> {
        Ok(self.get::<IncomingRequest>(request)?.method().clone())
    }

    pub fn incoming_request_scheme(&self, request: Handle) -> HostResult<Option<Scheme>> {
        Ok(self.get::<IncomingRequest>(request)?.scheme().cloned())
    }

    pub fn incoming_request_authority(&self, request: Handle) -> HostResult<Option<String>> {
        Ok(self
            .get::<IncomingRequest>(request)?
            .authority()
            .map(str::to_string))
    }

    pub fn incoming_request_path_with_query(&self, request: Handle) -> HostResult<Option<String>> {
        Ok(self
            .get::<IncomingRequest>(request)?
            .path_with_query()
            .map(str::to_string))
    }

    pub fn incoming_request_headers(&self, request: Handle) -> HostResult<Fields> {
        Ok(self.get::<IncomingRequest>(request)?.headers())
    }

    pub fn incoming_request_consume(&self, request: Handle) -> HostResult<Handle> {
        let body = self.get::<IncomingRequest>(request)?.consume()?;
        self.push(body)
    }

    pub fn new_outgoing_response(&self, headers: Fields) -> HostResult<Handle> {
        self.push(self.http.new_outgoing_response(headers))
    }

    pub fn outgoing_response_set_status(&self, response: Handle, status: u16) -> HostResult<()> {
        Ok(self
            .get::<OutgoingResponse>(response)?
            .set_status_code(status)?)
    }

    pub fn outgoing_response_headers(&self, response: Handle) -> HostResult<Fields> {
        Ok(self.get::<OutgoingResponse>(response)?.headers())
    }

    pub fn outgoing_response_body(&self, response: Handle) -> HostResult<Handle> {
        let body = self.get::<OutgoingResponse>(response)?.body()?;
        self.push(body)
    }

    /// Deliver a response (or failure) through the outparam
    ///
    /// A response handle is consumed. A second delivery is a protocol
    /// violation.
    pub fn response_outparam_set(
        &self,
        outparam: Handle,
        response: Result<Handle, ErrorCode>,
    ) -> HostResult<()> {
        let span = call_span("http.response_outparam_set", Some(outparam));
        let param = self.get::<ResponseOutparam>(outparam)?;
        if param.is_set() {
            return Err(crate::core::ProtocolViolation::AlreadyResponded.into());
        }
        let result = match response {
            Ok(handle) => {
                let response = self.table.take_as::<OutgoingResponse>(handle)?;
                param.set(Ok(response.as_ref()))
            }
            Err(code) => param.set(Err(code)),
        };
        span.record_result(&result);
        Ok(result?)
    }
}
