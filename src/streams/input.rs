/*!
 * Input Streams
 */

use super::buffer::{Readable, StreamBuffer};
use super::pump;
use super::types::{ReadOutcome, StreamError, Transfer};
use crate::poll::{self, Condition, Pollable};
use crate::table::HostResource;
use crate::translate::ErrorCodeTranslator;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::task::JoinHandle;

/// Guest-facing readable end of a stream
pub struct InputStream {
    buffer: Arc<StreamBuffer>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl InputStream {
    pub(crate) fn from_buffer(buffer: Arc<StreamBuffer>) -> Self {
        Self {
            buffer,
            pump: Mutex::new(None),
        }
    }

    pub(crate) fn with_pump(buffer: Arc<StreamBuffer>, pump: JoinHandle<()>) -> Self {
        Self {
            buffer,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Wrap a native reader; a pump task on `runtime` fills the buffer
    pub fn from_async_read<R>(
        runtime: &RuntimeHandle,
        reader: R,
        capacity: usize,
        translator: ErrorCodeTranslator,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = StreamBuffer::new(capacity);
        let task = runtime.spawn(pump::pump_in(reader, Arc::clone(&buffer), translator));
        Self::with_pump(buffer, task)
    }

    /// Stream that has already ended
    pub fn empty() -> Self {
        let buffer = StreamBuffer::new(1);
        buffer.close_producer();
        Self::from_buffer(buffer)
    }

    /// Non-blocking read of up to `max` bytes
    pub fn read(&self, max: usize) -> Result<ReadOutcome, StreamError> {
        self.buffer.pop(max)
    }

    /// Read at least one byte, suspending until data, end, or failure
    pub fn blocking_read(&self, max: usize) -> Result<ReadOutcome, StreamError> {
        loop {
            let outcome = self.buffer.pop(max)?;
            if !outcome.would_block() || max == 0 {
                return Ok(outcome);
            }
            poll::block_on(&Readable(Arc::clone(&self.buffer)));
        }
    }

    pub fn skip(&self, max: u64) -> Result<Transfer, StreamError> {
        let max = usize::try_from(max).unwrap_or(usize::MAX);
        let (skipped, ended) = self.buffer.skip(max)?;
        Ok(Transfer {
            moved: skipped as u64,
            ended,
        })
    }

    pub fn blocking_skip(&self, max: u64) -> Result<Transfer, StreamError> {
        loop {
            let transfer = self.skip(max)?;
            if transfer.moved > 0 || transfer.ended || max == 0 {
                return Ok(transfer);
            }
            poll::block_on(&Readable(Arc::clone(&self.buffer)));
        }
    }

    /// Readable when data is buffered, the stream ended, or it errored
    pub fn subscribe(&self) -> Pollable {
        Pollable::new(
            Arc::new(Readable(Arc::clone(&self.buffer))),
            Condition::InputReadable,
        )
    }

    pub(crate) fn buffer(&self) -> &Arc<StreamBuffer> {
        &self.buffer
    }

    /// Stop reading from the native source
    pub fn close(&self) {
        self.buffer.close_consumer();
        if let Some(task) = self.pump.lock().take() {
            task.abort();
        }
    }
}

impl HostResource for InputStream {
    fn release(&self) {
        self.close();
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream")
            .field("buffer", &self.buffer)
            .finish()
    }
}
