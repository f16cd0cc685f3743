/*!
 * Poll Tests
 * Readiness idempotence, timers, and generic subscriptions
 */

use crate::common::Sandbox;
use ai_os_wasi::{ErrorCode, HostError};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

#[test]
fn test_poll_is_idempotent() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (input, output) = host.create_pipe().unwrap();
    let readable = host.subscribe(input).unwrap();

    assert_eq!(host.poll(&[readable]).unwrap(), Vec::<u32>::new());
    assert_eq!(host.poll(&[readable]).unwrap(), Vec::<u32>::new());

    host.stream_write(output, b"x").unwrap();
    assert_eq!(host.poll(&[readable]).unwrap(), vec![0]);
    assert_eq!(host.poll(&[readable]).unwrap(), vec![0]);
}

#[test]
fn test_pollables_on_one_stream_are_independent() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (input, output) = host.create_pipe().unwrap();
    let first = host.input_stream_subscribe(input).unwrap();
    let second = host.input_stream_subscribe(input).unwrap();

    host.stream_write(output, b"data").unwrap();
    host.pollable_block(first).unwrap();
    assert!(host.pollable_ready(second).unwrap());

    host.drop_handle(first).unwrap();
    assert!(host.pollable_ready(second).unwrap());
    // Dropping pollables leaves the stream alone
    assert_eq!(host.stream_read(input, 16).unwrap().bytes, b"data");
}

#[test]
fn test_pollable_outlives_stream_handle() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (input, output) = host.create_pipe().unwrap();
    let readable = host.subscribe(input).unwrap();
    host.drop_handle(input).unwrap();
    host.drop_handle(output).unwrap();
    assert!(host.pollable_ready(readable).unwrap());
}

#[test]
fn test_timer_blocks_until_deadline() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let start = Instant::now();
    let timer = host
        .subscribe_duration(Duration::from_millis(30).as_nanos() as u64)
        .unwrap();
    assert!(!host.pollable_ready(timer).unwrap());
    host.pollable_block(timer).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(host.pollable_ready(timer).unwrap());
}

#[test]
fn test_subscribe_instant_in_past_is_ready() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let timer = host.subscribe_instant(0).unwrap();
    assert!(host.pollable_ready(timer).unwrap());
}

#[test]
fn test_block_any_returns_ready_subset() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (input, _output) = host.create_pipe().unwrap();
    let never = host.subscribe(input).unwrap();
    let soon = host
        .subscribe_duration(Duration::from_millis(10).as_nanos() as u64)
        .unwrap();

    assert_eq!(host.poll_block_any(&[never, soon]).unwrap(), vec![1]);
    assert_eq!(host.poll_block_any(&[]).unwrap(), Vec::<u32>::new());
}

#[test]
fn test_block_woken_by_writer_thread() {
    let sandbox = std::sync::Arc::new(Sandbox::new());
    let (input, output) = sandbox.host.create_pipe().unwrap();
    let readable = sandbox.host.subscribe(input).unwrap();

    let writer = {
        let sandbox = std::sync::Arc::clone(&sandbox);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            sandbox.host.stream_write(output, b"wake").unwrap();
        })
    };
    sandbox.host.pollable_block(readable).unwrap();
    writer.join().unwrap();
    assert_eq!(sandbox.host.stream_read(input, 8).unwrap().bytes, b"wake");
}

#[test]
fn test_subscribe_non_pollable_unsupported() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    assert_eq!(
        host.subscribe(sandbox.root()).unwrap_err(),
        HostError::Code(ErrorCode::Unsupported)
    );
    let network = host.instance_network().unwrap();
    assert_eq!(
        host.subscribe(network).unwrap_err(),
        HostError::Code(ErrorCode::Unsupported)
    );
}

#[test]
fn test_poll_with_non_pollable_is_fatal() {
    let sandbox = Sandbox::new();
    assert!(sandbox.host.poll(&[sandbox.root()]).unwrap_err().is_fatal());
}
