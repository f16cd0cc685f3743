/*!
 * Outgoing HTTP Tests
 * Authority and header gating, streamed bodies, and trailers
 */

use crate::common::{read_to_end, Sandbox};
use ai_os_wasi::http::{HeaderError, HeaderPolicy, Method, Scheme};
use ai_os_wasi::{ErrorCode, Handle, HostContext, HostError, ProtocolViolation};
use pretty_assertions::assert_eq;

fn request(host: &HostContext, authority: &str, path: &str) -> Handle {
    let headers = host.fields_from_list(&[]).unwrap();
    let request = host.new_outgoing_request(headers).unwrap();
    host.outgoing_request_set_authority(request, Some(authority.to_string()))
        .unwrap();
    host.outgoing_request_set_path_with_query(request, Some(path.to_string()))
        .unwrap();
    request
}

/// Block on a pending response and unwrap the incoming response handle
fn await_response(host: &HostContext, future: Handle) -> Handle {
    let ready = host.future_response_subscribe(future).unwrap();
    host.pollable_block(ready).unwrap();
    host.future_response_get(future).unwrap().unwrap().unwrap()
}

#[test]
fn test_disallowed_authority_never_dispatched() {
    let sandbox = Sandbox::with_config(|b| b.allow_authority("api.example.com:443"));
    let host = &sandbox.host;

    let denied = request(host, "evil.example.org", "/");
    assert_eq!(
        host.handle(denied, None).unwrap_err(),
        HostError::Code(ErrorCode::AccessDenied)
    );
    let wrong_port = request(host, "api.example.com:8443", "/");
    assert_eq!(
        host.handle(wrong_port, None).unwrap_err(),
        HostError::Code(ErrorCode::AccessDenied)
    );
    assert_eq!(sandbox.http.calls(), 0);

    // A refused request is consumed all the same
    assert!(host.outgoing_request_head(denied).unwrap_err().is_fatal());

    let allowed = request(host, "api.example.com", "/v1/items?page=2");
    let future = host.handle(allowed, None).unwrap();
    assert_eq!(sandbox.http.calls(), 1);
    assert_eq!(
        sandbox.http.last_url().as_deref(),
        Some("https://api.example.com/v1/items?page=2")
    );
    let response = await_response(host, future);
    assert_eq!(host.incoming_response_status(response).unwrap(), 200);
}

#[test]
fn test_echo_round_trip_with_trailers() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;

    let req = request(host, "echo.local:8080", "/echo");
    host.outgoing_request_set_method(req, Method::Post).unwrap();
    host.outgoing_request_set_scheme(req, Some(Scheme::Http)).unwrap();
    assert_eq!(host.outgoing_request_head(req).unwrap().method, Method::Post);

    let body = host.outgoing_request_body(req).unwrap();
    let sink = host.outgoing_body_write(body).unwrap();
    host.stream_blocking_write_and_flush(sink, b"hello body").unwrap();
    host.drop_handle(sink).unwrap();
    host.outgoing_body_finish(body, None).unwrap();

    let future = host.handle(req, None).unwrap();
    assert_eq!(sandbox.http.last_url().as_deref(), Some("http://echo.local:8080/echo"));

    let response = await_response(host, future);
    let headers = host.incoming_response_headers(response).unwrap();
    assert_eq!(headers.get("x-echo-method"), vec![b"POST".to_vec()]);
    assert!(host.future_response_get(future).unwrap_err().is_fatal());

    let incoming = host.incoming_response_consume(response).unwrap();
    assert_eq!(
        host.incoming_body_trailers(incoming).unwrap_err(),
        HostError::Code(ErrorCode::WouldBlock)
    );

    let stream = host.incoming_body_stream(incoming).unwrap();
    assert_eq!(read_to_end(host, stream), b"hello body");

    let trailers_ready = host.incoming_body_subscribe_trailers(incoming).unwrap();
    host.pollable_block(trailers_ready).unwrap();
    let trailers = host.incoming_body_trailers(incoming).unwrap().unwrap();
    assert_eq!(trailers.get("x-trailer"), vec![b"done".to_vec()]);
}

#[test]
fn test_body_and_stream_taken_once() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;
    let req = request(host, "echo.local", "/");

    let body = host.outgoing_request_body(req).unwrap();
    assert_eq!(
        host.outgoing_request_body(req).unwrap_err(),
        HostError::Fatal(ProtocolViolation::AlreadyConsumed(
            ai_os_wasi::ResourceKind::OutgoingBody
        ))
    );
    host.outgoing_body_write(body).unwrap();
    assert!(host.outgoing_body_write(body).unwrap_err().is_fatal());
    host.outgoing_body_finish(body, None).unwrap();
    // Finishing consumed the body handle
    assert!(host.outgoing_body_finish(body, None).unwrap_err().is_fatal());
}

#[test]
fn test_forbidden_headers_rejected() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;

    let entries = vec![("Transfer-Encoding".to_string(), b"chunked".to_vec())];
    assert_eq!(
        host.fields_from_list(&entries).unwrap_err(),
        HostError::Header(HeaderError::Forbidden)
    );

    let mut fields = host.fields_from_list(&[]).unwrap();
    assert_eq!(
        host.fields_append(&mut fields, "host", b"elsewhere").unwrap_err(),
        HostError::Header(HeaderError::Forbidden)
    );
    host.fields_set(&mut fields, "accept", &[b"text/plain".to_vec()])
        .unwrap();
    assert!(fields.has("Accept"));
    assert_eq!(sandbox.http.calls(), 0);
}

#[test]
fn test_strip_policy_removes_headers() {
    let sandbox = Sandbox::with_config(|b| {
        b.allow_all_authorities()
            .forbidden_headers(["x-internal"])
            .forbidden_header_policy(HeaderPolicy::Strip)
    });
    let host = &sandbox.host;
    let entries = vec![("x-internal".to_string(), b"1".to_vec())];
    let headers = host.fields_from_list(&entries).unwrap();
    let req = host.new_outgoing_request(headers).unwrap();
    host.outgoing_request_set_authority(req, Some("echo.local".into()))
        .unwrap();
    let future = host.handle(req, None).unwrap();
    assert_eq!(sandbox.http.calls(), 1);
    await_response(host, future);
}

#[test]
fn test_missing_authority_and_unknown_scheme() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;

    let headers = host.fields_from_list(&[]).unwrap();
    let req = host.new_outgoing_request(headers).unwrap();
    assert_eq!(
        host.handle(req, None).unwrap_err(),
        HostError::Code(ErrorCode::InvalidArgument)
    );

    let req = request(host, "echo.local", "/");
    host.outgoing_request_set_scheme(req, Some(Scheme::Other("gopher".into())))
        .unwrap();
    assert_eq!(
        host.handle(req, None).unwrap_err(),
        HostError::Code(ErrorCode::Unsupported)
    );
    assert_eq!(sandbox.http.calls(), 0);
}

#[test]
fn test_dropping_pending_future_wakes_pollable() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;
    sandbox.http.stall();
    let req = request(host, "echo.local", "/");
    let future = host.handle(req, None).unwrap();
    let ready = host.future_response_subscribe(future).unwrap();
    assert!(!host.pollable_ready(ready).unwrap());
    assert_eq!(host.future_response_get(future).unwrap(), None);

    host.drop_handle(future).unwrap();
    // The pollable outlives the future it watched and reports it settled
    host.pollable_block(ready).unwrap();
    assert!(host.pollable_ready(ready).unwrap());
    assert!(host.future_response_get(future).unwrap_err().is_fatal());
}

#[test]
fn test_full_table_keeps_response() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities().max_resources(3));
    let host = &sandbox.host;
    let req = request(host, "echo.local", "/");
    let future = host.handle(req, None).unwrap();
    let ready = host.future_response_subscribe(future).unwrap();
    host.pollable_block(ready).unwrap();

    assert_eq!(
        host.future_response_get(future).unwrap_err(),
        HostError::Code(ErrorCode::NoSpace)
    );
    host.drop_handle(ready).unwrap();
    let response = host.future_response_get(future).unwrap().unwrap().unwrap();
    assert_eq!(host.incoming_response_status(response).unwrap(), 200);
}

#[test]
fn test_alternate_ip_spellings_refused() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities().allow_authority("!127.0.0.1:*"));
    let host = &sandbox.host;
    for authority in ["127.0.0.1", "0177.0.0.1", "2130706433", "0x7f.1", "[::ffff:7f00:1]"] {
        let req = request(host, authority, "/");
        assert!(host.handle(req, None).is_err(), "{authority} was dispatched");
    }
    assert_eq!(sandbox.http.calls(), 0);
}
