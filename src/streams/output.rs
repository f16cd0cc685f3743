/*!
 * Output Streams
 */

use super::buffer::{Flushed, Readable, StreamBuffer, Writable};
use super::input::InputStream;
use super::pump;
use super::types::{StreamError, Transfer};
use crate::poll::{self, Condition, Pollable};
use crate::table::HostResource;
use crate::translate::ErrorCodeTranslator;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::runtime::Handle as RuntimeHandle;

/// Where accepted bytes go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    /// Read directly by a guest-facing input stream or an HTTP client.
    /// Accepted bytes count as flushed.
    Memory,
    /// Written to a native handle by a pump; flush waits for the pump
    Native,
    /// Owned by an HTTP body; dropping the stream does not end the body
    Body,
}

/// Guest-facing writable end of a stream
pub struct OutputStream {
    buffer: Arc<StreamBuffer>,
    sink: Sink,
}

impl OutputStream {
    pub(crate) fn from_buffer(buffer: Arc<StreamBuffer>) -> Self {
        Self {
            buffer,
            sink: Sink::Memory,
        }
    }

    pub(crate) fn for_body(buffer: Arc<StreamBuffer>) -> Self {
        Self {
            buffer,
            sink: Sink::Body,
        }
    }

    /// Wrap a native writer; a pump task on `runtime` drains the buffer.
    /// The pump finishes writing buffered bytes after the stream is dropped.
    pub fn from_async_write<W>(
        runtime: &RuntimeHandle,
        writer: W,
        capacity: usize,
        translator: ErrorCodeTranslator,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let buffer = StreamBuffer::new(capacity);
        // Detached; it exits once the producer closes and the ring drains
        drop(runtime.spawn(pump::pump_out(writer, Arc::clone(&buffer), translator)));
        Self {
            buffer,
            sink: Sink::Native,
        }
    }

    /// Bytes `write` would accept right now
    pub fn check_write(&self) -> Result<usize, StreamError> {
        self.buffer.vacant()
    }

    /// Accept as many bytes as fit; fewer than offered signals backpressure
    pub fn write(&self, bytes: &[u8]) -> Result<usize, StreamError> {
        self.buffer.push(bytes)
    }

    /// Write every byte, suspending while the buffer is full
    pub fn blocking_write(&self, bytes: &[u8]) -> Result<(), StreamError> {
        let mut remaining = bytes;
        loop {
            let accepted = self.buffer.push(remaining)?;
            remaining = &remaining[accepted..];
            if remaining.is_empty() {
                return Ok(());
            }
            poll::block_on(&Writable(Arc::clone(&self.buffer)));
        }
    }

    /// Request a flush. Reports a pending failure, never blocks.
    pub fn flush(&self) -> Result<(), StreamError> {
        self.buffer.vacant().map(|_| ())
    }

    /// Suspend until every accepted byte reached the native sink
    pub fn blocking_flush(&self) -> Result<(), StreamError> {
        if self.sink == Sink::Native {
            poll::block_on(&Flushed(Arc::clone(&self.buffer)));
        }
        self.flush()
    }

    pub fn blocking_write_and_flush(&self, bytes: &[u8]) -> Result<(), StreamError> {
        self.blocking_write(bytes)?;
        self.blocking_flush()
    }

    /// Move up to `max` bytes from `src` without blocking. Never moves more
    /// than the current free space, so memory stays bounded by capacity.
    pub fn splice(&self, src: &InputStream, max: u64) -> Result<Transfer, StreamError> {
        let room = self.check_write()?;
        let len = room.min(usize::try_from(max).unwrap_or(usize::MAX));
        if len == 0 {
            return Ok(Transfer::default());
        }
        let outcome = src.read(len)?;
        if !outcome.bytes.is_empty() {
            self.blocking_write(&outcome.bytes)?;
        }
        Ok(Transfer {
            moved: outcome.bytes.len() as u64,
            ended: outcome.ended,
        })
    }

    /// Splice, suspending until `src` has data and `self` has room
    pub fn blocking_splice(&self, src: &InputStream, max: u64) -> Result<Transfer, StreamError> {
        loop {
            poll::block_on(&Writable(Arc::clone(&self.buffer)));
            poll::block_on(&Readable(Arc::clone(src.buffer())));
            let transfer = self.splice(src, max)?;
            if transfer.moved > 0 || transfer.ended || max == 0 {
                return Ok(transfer);
            }
        }
    }

    /// Writable when space is free or the stream can no longer accept bytes
    pub fn subscribe(&self) -> Pollable {
        Pollable::new(
            Arc::new(Writable(Arc::clone(&self.buffer))),
            Condition::OutputWritable,
        )
    }

    pub(crate) fn buffer(&self) -> &Arc<StreamBuffer> {
        &self.buffer
    }

    /// End the stream; readers observe `ended` after the buffered bytes
    pub fn close(&self) {
        self.buffer.close_producer();
    }
}

impl HostResource for OutputStream {
    fn release(&self) {
        if self.sink != Sink::Body {
            self.close();
        }
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("sink", &self.sink)
            .field("buffer", &self.buffer)
            .finish()
    }
}
