/*!
 * Stream Tests
 * Round trips through in-memory pairs and file-backed streams
 */

use crate::common::{read_to_end, Sandbox};
use ai_os_wasi::filesystem::{OpenFlags, PathFlags, Rights};
use ai_os_wasi::{ErrorCode, HostError, StreamError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Write `bytes` on one thread, read them back on the caller
fn pipe_round_trip(bytes: &[u8]) -> Vec<u8> {
    let sandbox = Arc::new(Sandbox::new());
    let (input, output) = sandbox.host.create_pipe().unwrap();

    let writer = {
        let sandbox = Arc::clone(&sandbox);
        let bytes = bytes.to_vec();
        thread::spawn(move || {
            sandbox.host.stream_blocking_write(output, &bytes).unwrap();
            sandbox.host.drop_handle(output).unwrap();
        })
    };
    let received = read_to_end(&sandbox.host, input);
    writer.join().unwrap();
    received
}

#[test]
fn test_empty_round_trip() {
    assert_eq!(pipe_round_trip(&[]), Vec::<u8>::new());
}

#[test]
fn test_large_round_trip() {
    let bytes = payload(300 * 1024);
    assert_eq!(pipe_round_trip(&bytes), bytes);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_round_trip_preserves_bytes(bytes in prop::collection::vec(any::<u8>(), 0..100_000)) {
        prop_assert_eq!(pipe_round_trip(&bytes), bytes);
    }
}

#[test]
fn test_backpressure_reported() {
    let sandbox = Sandbox::with_config(|b| b.stream_capacity(8));
    let host = &sandbox.host;
    let (input, output) = host.create_pipe().unwrap();

    assert_eq!(host.stream_check_write(output).unwrap(), 8);
    assert_eq!(host.stream_write(output, b"0123456789").unwrap(), 8);
    assert_eq!(host.stream_write(output, b"89").unwrap(), 0);

    let writable = host.output_stream_subscribe(output).unwrap();
    assert!(!host.pollable_ready(writable).unwrap());
    assert_eq!(host.stream_read(input, 3).unwrap().bytes, b"012");
    assert!(host.pollable_ready(writable).unwrap());
    assert_eq!(host.stream_write(output, b"89").unwrap(), 2);
}

#[test]
fn test_read_would_block() {
    let sandbox = Sandbox::new();
    let (input, _output) = sandbox.host.create_pipe().unwrap();
    let outcome = sandbox.host.stream_read(input, 16).unwrap();
    assert!(outcome.bytes.is_empty());
    assert!(!outcome.ended);
}

#[test]
fn test_write_after_reader_dropped() {
    let sandbox = Sandbox::new();
    let (input, output) = sandbox.host.create_pipe().unwrap();
    sandbox.host.drop_handle(input).unwrap();
    assert_eq!(
        sandbox.host.stream_write(output, b"x").unwrap_err(),
        HostError::Stream(StreamError::Closed)
    );
}

#[test]
fn test_file_stream_round_trip() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    let bytes = payload(200 * 1024);

    let file = host
        .open_at(root, PathFlags::default(), "big.bin", OpenFlags::create(), Rights::ALL)
        .unwrap();
    let sink = host.write_via_stream(file, 0).unwrap();
    for chunk in bytes.chunks(50_000) {
        host.stream_blocking_write_and_flush(sink, chunk).unwrap();
    }
    host.drop_handle(sink).unwrap();
    assert_eq!(std::fs::read(sandbox.dir.path().join("big.bin")).unwrap(), bytes);

    let source = host.read_via_stream(file, 0).unwrap();
    assert_eq!(read_to_end(host, source), bytes);

    let tail = host.read_via_stream(file, 150 * 1024).unwrap();
    assert_eq!(read_to_end(host, tail), bytes[150 * 1024..].to_vec());
}

#[test]
fn test_append_stream() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let root = sandbox.root();
    std::fs::write(sandbox.dir.path().join("log.txt"), b"one\n").unwrap();

    let file = host
        .open_at(root, PathFlags::default(), "log.txt", OpenFlags::default(), Rights::ALL)
        .unwrap();
    let sink = host.append_via_stream(file).unwrap();
    host.stream_blocking_write_and_flush(sink, b"two\n").unwrap();
    host.drop_handle(sink).unwrap();
    assert_eq!(
        std::fs::read(sandbox.dir.path().join("log.txt")).unwrap(),
        b"one\ntwo\n"
    );
}

#[test]
fn test_splice_between_pipes() {
    let sandbox = Sandbox::new();
    let host = &sandbox.host;
    let (src_in, src_out) = host.create_pipe().unwrap();
    let (dst_in, dst_out) = host.create_pipe().unwrap();

    host.stream_blocking_write(src_out, b"forwarded").unwrap();
    host.drop_handle(src_out).unwrap();

    let mut moved = 0;
    loop {
        let transfer = host.stream_blocking_splice(dst_out, src_in, 4).unwrap();
        moved += transfer.moved;
        if transfer.ended {
            break;
        }
    }
    assert_eq!(moved, 9);
    host.drop_handle(dst_out).unwrap();
    assert_eq!(read_to_end(host, dst_in), b"forwarded");
}

#[test]
fn test_pipe_on_full_table_takes_nothing() {
    let sandbox = Sandbox::with_config(|b| b.max_resources(2));
    let host = &sandbox.host;
    // The root preopen holds one slot and a pipe needs two
    assert_eq!(
        host.create_pipe().unwrap_err(),
        HostError::Code(ErrorCode::NoSpace)
    );
    assert_eq!(host.table().len(), 1);

    host.drop_handle(sandbox.root()).unwrap();
    let (input, output) = host.create_pipe().unwrap();
    host.stream_blocking_write_and_flush(output, b"fits").unwrap();
    host.drop_handle(output).unwrap();
    assert_eq!(read_to_end(host, input), b"fits");
}
