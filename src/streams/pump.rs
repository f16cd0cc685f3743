/*!
 * Native Pumps
 *
 * Background tasks that move bytes between a `StreamBuffer` and a native
 * async handle (file, socket half, HTTP body). Each pump is the only async
 * party of its buffer and waits on the buffer signal when it cannot make
 * progress.
 */

use super::buffer::{Drain, Space, StreamBuffer};
use crate::core::limits::PUMP_CHUNK_SIZE;
use crate::translate::{ErrorCode, ErrorCodeTranslator, Operation};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Byte stream exchanged with the HTTP client
pub type BodyStream = BoxStream<'static, Result<Bytes, ErrorCode>>;

/// Native reader into buffer
pub(crate) async fn pump_in<R>(
    mut source: R,
    buffer: Arc<StreamBuffer>,
    translator: ErrorCodeTranslator,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut chunk = vec![0u8; PUMP_CHUNK_SIZE];
    loop {
        let room = match buffer.space() {
            Space::Closed => break,
            Space::Full => {
                buffer.signal().changed().await;
                continue;
            }
            Space::Available(n) => n.min(chunk.len()),
        };
        match source.read(&mut chunk[..room]).await {
            Ok(0) => {
                buffer.close_producer();
                break;
            }
            Ok(n) => {
                trace!(bytes = n, "pumped from native reader");
                if buffer.push(&chunk[..n]).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let code = translator.translate(&e, Operation::Read);
                debug!(error = %e, code = %code, "native reader failed");
                buffer.fail(code);
                break;
            }
        }
    }
}

/// Buffer into native writer. Shuts the writer down once the producer
/// closes and every byte has been written.
pub(crate) async fn pump_out<W>(
    mut sink: W,
    buffer: Arc<StreamBuffer>,
    translator: ErrorCodeTranslator,
) where
    W: AsyncWrite + Unpin + Send,
{
    let mut chunk = vec![0u8; PUMP_CHUNK_SIZE];
    loop {
        match buffer.take_chunk(&mut chunk) {
            Drain::Data(n) => {
                let mut result = sink.write_all(&chunk[..n]).await;
                if result.is_ok() {
                    result = sink.flush().await;
                }
                let failure = result
                    .as_ref()
                    .err()
                    .map(|e| translator.translate(e, Operation::Write));
                buffer.complete_flight(n, failure);
                if let Some(code) = failure {
                    debug!(code = %code, "native writer failed");
                    break;
                }
            }
            Drain::Empty => buffer.signal().changed().await,
            Drain::Finished => {
                let _ = sink.shutdown().await;
                break;
            }
            Drain::Failed(_) => break,
        }
    }
}

/// Async byte stream into buffer. Returns `true` when the stream ended
/// cleanly; the caller closes the producer.
pub(crate) async fn pump_body_in(mut body: BodyStream, buffer: &StreamBuffer) -> bool {
    while let Some(item) = body.next().await {
        let mut bytes = match item {
            Ok(bytes) => bytes,
            Err(code) => {
                buffer.fail(code);
                return false;
            }
        };
        while !bytes.is_empty() {
            match buffer.space() {
                Space::Closed => return false,
                Space::Full => buffer.signal().changed().await,
                Space::Available(n) => {
                    let n = n.min(bytes.len());
                    if buffer.push(&bytes[..n]).is_err() {
                        return false;
                    }
                    bytes = bytes.slice(n..);
                }
            }
        }
    }
    true
}

/// Buffer as an async byte stream, ending when the producer closes
pub(crate) fn body_out(buffer: Arc<StreamBuffer>) -> BodyStream {
    let stream = async_stream::stream! {
        let mut chunk = vec![0u8; PUMP_CHUNK_SIZE];
        loop {
            match buffer.take_chunk(&mut chunk) {
                Drain::Data(n) => {
                    buffer.complete_flight(n, None);
                    yield Ok(Bytes::copy_from_slice(&chunk[..n]));
                }
                Drain::Empty => buffer.signal().changed().await,
                Drain::Finished => break,
                Drain::Failed(code) => {
                    yield Err(code);
                    break;
                }
            }
        }
    };
    stream.boxed()
}
