/*!
 * Incoming HTTP Tests
 * Guest handlers answering through a response outparam
 */

use crate::common::{read_to_end, Sandbox};
use ai_os_wasi::http::{Method, NativeIncomingRequest, Scheme};
use ai_os_wasi::{ErrorCode, HostError, ProtocolViolation};
use bytes::Bytes;
use futures::{stream, StreamExt};
use pretty_assertions::assert_eq;
use reqwest::header::{HeaderMap, HeaderValue};

fn native_request(body: &'static [u8]) -> NativeIncomingRequest {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("text/plain"));
    let mut trailers = HeaderMap::new();
    trailers.insert("x-checksum", HeaderValue::from_static("abc"));
    NativeIncomingRequest {
        method: Method::Put,
        scheme: Some(Scheme::Http),
        authority: Some("guest.local".to_string()),
        path_with_query: Some("/upload?id=7".to_string()),
        headers,
        body: stream::iter(vec![Ok(Bytes::from_static(body))]).boxed(),
        trailers: Some(trailers),
    }
}

#[test]
fn test_handler_reads_request_and_responds() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;

    let request = host.new_incoming_request(native_request(b"payload")).unwrap();
    let (outparam, receiver) = host.new_response_outparam().unwrap();

    assert_eq!(host.incoming_request_method(request).unwrap(), Method::Put);
    assert_eq!(host.incoming_request_scheme(request).unwrap(), Some(Scheme::Http));
    assert_eq!(
        host.incoming_request_authority(request).unwrap().as_deref(),
        Some("guest.local")
    );
    assert_eq!(
        host.incoming_request_path_with_query(request).unwrap().as_deref(),
        Some("/upload?id=7")
    );

    // Received headers are immutable
    let mut headers = host.incoming_request_headers(request).unwrap();
    assert!(headers.is_immutable());
    assert!(host
        .fields_append(&mut headers, "x-added", b"1")
        .is_err());

    let body = host.incoming_request_consume(request).unwrap();
    let stream = host.incoming_body_stream(body).unwrap();
    assert_eq!(read_to_end(host, stream), b"payload");
    let trailers_ready = host.incoming_body_subscribe_trailers(body).unwrap();
    host.pollable_block(trailers_ready).unwrap();
    let trailers = host.incoming_body_trailers(body).unwrap().unwrap();
    assert_eq!(trailers.get("x-checksum"), vec![b"abc".to_vec()]);

    let entries = vec![("content-type".to_string(), b"text/plain".to_vec())];
    let response_headers = host.fields_from_list(&entries).unwrap();
    let response = host.new_outgoing_response(response_headers).unwrap();
    host.outgoing_response_set_status(response, 201).unwrap();
    let out_body = host.outgoing_response_body(response).unwrap();
    let sink = host.outgoing_body_write(out_body).unwrap();
    host.stream_blocking_write_and_flush(sink, b"stored").unwrap();
    host.outgoing_body_finish(out_body, None).unwrap();

    host.response_outparam_set(outparam, Ok(response)).unwrap();

    let served = host.runtime().block_on(receiver).unwrap().unwrap();
    assert_eq!(served.status, 201);
    assert_eq!(served.headers.get("content-type").unwrap(), "text/plain");
    let chunks: Vec<_> = host.runtime().block_on(served.body.collect());
    let bytes: Vec<u8> = chunks
        .into_iter()
        .flat_map(|chunk| chunk.unwrap().to_vec())
        .collect();
    assert_eq!(bytes, b"stored");
}

#[test]
fn test_second_response_is_fatal() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (outparam, receiver) = host.new_response_outparam().unwrap();

    let headers = host.fields_from_list(&[]).unwrap();
    let first = host.new_outgoing_response(headers.clone()).unwrap();
    let second = host.new_outgoing_response(headers).unwrap();
    host.response_outparam_set(outparam, Ok(first)).unwrap();

    assert_eq!(
        host.response_outparam_set(outparam, Ok(second)).unwrap_err(),
        HostError::Fatal(ProtocolViolation::AlreadyResponded)
    );
    assert_eq!(
        host.response_outparam_set(outparam, Err(ErrorCode::Io)).unwrap_err(),
        HostError::Fatal(ProtocolViolation::AlreadyResponded)
    );
    // The rejected response is still owned by the guest
    assert_eq!(host.outgoing_response_set_status(second, 204), Ok(()));
    // The delivered one was consumed
    assert!(host.outgoing_response_headers(first).unwrap_err().is_fatal());

    let served = host.runtime().block_on(receiver).unwrap().unwrap();
    assert_eq!(served.status, 200);
}

#[test]
fn test_handler_reports_error() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (outparam, receiver) = host.new_response_outparam().unwrap();
    host.response_outparam_set(outparam, Err(ErrorCode::Timeout))
        .unwrap();
    assert_eq!(
        host.runtime().block_on(receiver).unwrap().unwrap_err(),
        ErrorCode::Timeout
    );
}

#[test]
fn test_invalid_status_rejected() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let headers = host.fields_from_list(&[]).unwrap();
    let response = host.new_outgoing_response(headers).unwrap();
    assert_eq!(
        host.outgoing_response_set_status(response, 1000).unwrap_err(),
        HostError::Code(ErrorCode::InvalidArgument)
    );
}
