/*!
 * TCP Tests
 * Loopback lifecycle, shared connect pollables, and allow-list refusals
 */

use crate::common::{read_to_end, Sandbox};
use ai_os_wasi::sockets::{IpAddressFamily, ShutdownType, SocketState};
use ai_os_wasi::{ErrorCode, Handle, HostError};
use pretty_assertions::assert_eq;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

fn loopback() -> Sandbox {
    Sandbox::with_config(|b| b.allow_authority("127.0.0.1:*"))
}

fn listen(sandbox: &Sandbox, network: Handle) -> (Handle, SocketAddr) {
    let host = &sandbox.host;
    let listener = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    host.tcp_bind(listener, network, "127.0.0.1:0".parse().unwrap())
        .unwrap();
    host.tcp_listen(listener, None).unwrap();
    let addr = host.tcp_local_address(listener).unwrap();
    assert_eq!(host.tcp_state(listener).unwrap(), SocketState::Listening);
    (listener, addr)
}

#[test]
fn test_connect_pollables_both_ready() {
    let sandbox = loopback();
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let (listener, addr) = listen(&sandbox, network);

    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    host.tcp_start_connect(client, network, addr).unwrap();
    let first = host.tcp_subscribe(client).unwrap();
    let second = host.subscribe(client).unwrap();

    host.pollable_block(first).unwrap();
    host.pollable_block(second).unwrap();
    let (input, output) = host.tcp_finish_connect(client).unwrap();
    assert_eq!(host.tcp_state(client).unwrap(), SocketState::Connected);

    // Readiness persists after the transition and survives dropping a sibling
    assert_eq!(host.poll(&[first, second]).unwrap(), vec![0, 1]);
    host.drop_handle(first).unwrap();
    assert!(host.pollable_ready(second).unwrap());

    let acceptable = host.subscribe(listener).unwrap();
    host.pollable_block(acceptable).unwrap();
    let (server, server_in, server_out) = host.tcp_accept(listener).unwrap();
    assert_eq!(host.tcp_remote_address(server).unwrap(), host.tcp_local_address(client).unwrap());

    host.stream_blocking_write_and_flush(output, b"ping").unwrap();
    let mut got = Vec::new();
    while got.len() < 4 {
        got.extend(host.stream_blocking_read(server_in, 4).unwrap().bytes);
    }
    assert_eq!(got, b"ping");

    host.stream_blocking_write_and_flush(server_out, b"pong").unwrap();
    host.tcp_shutdown(server, ShutdownType::Both).unwrap();
    assert_eq!(read_to_end(host, input), b"pong");
    assert_eq!(host.tcp_state(server).unwrap(), SocketState::Closed);
}

#[test]
fn test_finish_connect_requires_start() {
    let sandbox = loopback();
    let host = &sandbox.host;
    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    assert_eq!(
        host.tcp_finish_connect(client).unwrap_err(),
        HostError::Code(ErrorCode::InvalidArgument)
    );
    assert_eq!(host.tcp_address_family(client).unwrap(), IpAddressFamily::Ipv4);
}

#[test]
fn test_connection_refused() {
    let sandbox = loopback();
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();

    // Reserve a port, then close it so nothing listens there
    let addr = {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        reserved.local_addr().unwrap()
    };
    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    host.tcp_start_connect(client, network, addr).unwrap();
    let done = host.tcp_subscribe(client).unwrap();
    host.pollable_block(done).unwrap();
    assert_eq!(
        host.tcp_finish_connect(client).unwrap_err(),
        HostError::Code(ErrorCode::ConnectionRefused)
    );
    assert_eq!(host.tcp_state(client).unwrap(), SocketState::Closed);
}

#[test]
fn test_disallowed_destinations_refused() {
    let sandbox = loopback();
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();

    let remote = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 80);
    assert_eq!(
        host.tcp_start_connect(client, network, remote).unwrap_err(),
        HostError::Code(ErrorCode::AccessDenied)
    );
    assert_eq!(
        host.tcp_bind(client, network, "0.0.0.0:0".parse().unwrap())
            .unwrap_err(),
        HostError::Code(ErrorCode::AccessDenied)
    );
    // Nothing was created natively
    assert_eq!(host.tcp_state(client).unwrap(), SocketState::Unbound);
}

#[test]
fn test_empty_allow_list_denies() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    assert_eq!(
        host.tcp_bind(client, network, "127.0.0.1:0".parse().unwrap())
            .unwrap_err(),
        HostError::Code(ErrorCode::AccessDenied)
    );
}

#[test]
fn test_family_mismatch() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let client = host.create_tcp_socket(IpAddressFamily::Ipv6).unwrap();
    assert_eq!(
        host.tcp_bind(client, network, "127.0.0.1:0".parse().unwrap())
            .unwrap_err(),
        HostError::Code(ErrorCode::InvalidArgument)
    );
}

#[test]
fn test_resolve_literal_address() {
    let sandbox = loopback();
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let lookup = host.resolve_addresses(network, "127.0.0.1").unwrap();
    let ready = host.resolve_subscribe(lookup).unwrap();
    host.pollable_block(ready).unwrap();

    assert_eq!(
        host.resolve_next_address(lookup).unwrap(),
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
    );
    assert_eq!(host.resolve_next_address(lookup).unwrap(), None);
}

#[test]
fn test_dropping_connecting_socket_cancels() {
    let sandbox = Sandbox::with_config(|b| b.allow_all_authorities());
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();

    // Unroutable, so the connect is normally still in flight when dropped
    let remote = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 255, 255, 1)), 9);
    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    host.tcp_start_connect(client, network, remote).unwrap();
    let pollable = host.tcp_subscribe(client).unwrap();
    host.drop_handle(client).unwrap();
    assert!(host.tcp_state(client).unwrap_err().is_fatal());

    // The pollable is still a live, independent handle and settles
    host.pollable_block(pollable).unwrap();
    assert!(host.pollable_ready(pollable).unwrap());
}

#[test]
fn test_dropping_listener_wakes_accept_pollable() {
    let sandbox = loopback();
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let (listener, _addr) = listen(&sandbox, network);

    let acceptable = host.tcp_subscribe(listener).unwrap();
    assert!(!host.pollable_ready(acceptable).unwrap());
    host.drop_handle(listener).unwrap();
    host.pollable_block(acceptable).unwrap();
    assert!(host.pollable_ready(acceptable).unwrap());
}

#[test]
fn test_full_table_leaves_connection_queued() {
    let sandbox = Sandbox::with_config(|b| b.allow_authority("127.0.0.1:*").max_resources(8));
    let host = &sandbox.host;
    let network = host.instance_network().unwrap();
    let (listener, addr) = listen(&sandbox, network);

    let client = host.create_tcp_socket(IpAddressFamily::Ipv4).unwrap();
    host.tcp_start_connect(client, network, addr).unwrap();
    let connected = host.tcp_subscribe(client).unwrap();
    host.pollable_block(connected).unwrap();
    let (input, output) = host.tcp_finish_connect(client).unwrap();
    let acceptable = host.tcp_subscribe(listener).unwrap();
    host.pollable_block(acceptable).unwrap();
    assert_eq!(host.table().len(), 8);

    // Accept needs three free slots
    host.drop_handle(connected).unwrap();
    assert_eq!(
        host.tcp_accept(listener).unwrap_err(),
        HostError::Code(ErrorCode::NoSpace)
    );
    assert_eq!(host.table().len(), 7);
    // The peer was not hung up on
    let pending = host.stream_read(input, 8).unwrap();
    assert!(pending.bytes.is_empty());
    assert!(!pending.ended);

    host.drop_handle(acceptable).unwrap();
    host.drop_handle(network).unwrap();
    let (_server, server_in, _server_out) = host.tcp_accept(listener).unwrap();
    host.stream_blocking_write_and_flush(output, b"late").unwrap();
    let mut got = Vec::new();
    while got.len() < 4 {
        got.extend(host.stream_blocking_read(server_in, 4).unwrap().bytes);
    }
    assert_eq!(got, b"late");
}
