/*!
 * Stream Calls
 */

use super::context::HostContext;
use crate::core::{Handle, HostResult};
use crate::monitoring::call_span;
use crate::streams::{self, InputStream, OutputStream, ReadOutcome, Transfer};

impl HostContext {
    /// In-memory stream pair sized by the configured stream capacity
    pub fn create_pipe(&self) -> HostResult<(Handle, Handle)> {
        let slots = (self.reserve()?, self.reserve()?);
        let (input, output) = streams::pipe(self.config.limits().stream_capacity);
        Ok((slots.0.fill(input), slots.1.fill(output)))
    }

    // =========================================================================
    // Input
    // =========================================================================

    pub fn stream_read(&self, stream: Handle, max: u64) -> HostResult<ReadOutcome> {
        let stream = self.get::<InputStream>(stream)?;
        Ok(stream.read(clamp(max))?)
    }

    pub fn stream_blocking_read(&self, handle: Handle, max: u64) -> HostResult<ReadOutcome> {
        let span = call_span("streams.blocking_read", Some(handle)).blocking();
        let stream = self.get::<InputStream>(handle)?;
        let result = stream.blocking_read(clamp(max));
        span.record_result(&result);
        Ok(result?)
    }

    pub fn stream_skip(&self, stream: Handle, max: u64) -> HostResult<Transfer> {
        let stream = self.get::<InputStream>(stream)?;
        Ok(stream.skip(max)?)
    }

    pub fn stream_blocking_skip(&self, stream: Handle, max: u64) -> HostResult<Transfer> {
        let _span = call_span("streams.blocking_skip", Some(stream)).blocking();
        let stream = self.get::<InputStream>(stream)?;
        Ok(stream.blocking_skip(max)?)
    }

    pub fn input_stream_subscribe(&self, stream: Handle) -> HostResult<Handle> {
        let stream = self.get::<InputStream>(stream)?;
        self.push(stream.subscribe())
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Bytes the next `stream_write` will accept
    pub fn stream_check_write(&self, stream: Handle) -> HostResult<u64> {
        let stream = self.get::<OutputStream>(stream)?;
        Ok(stream.check_write()? as u64)
    }

    /// Accepted count; fewer than `bytes.len()` means backpressure
    pub fn stream_write(&self, stream: Handle, bytes: &[u8]) -> HostResult<u64> {
        let stream = self.get::<OutputStream>(stream)?;
        Ok(stream.write(bytes)? as u64)
    }

    /// Write every byte, suspending while the stream is full
    pub fn stream_blocking_write(&self, stream: Handle, bytes: &[u8]) -> HostResult<()> {
        let _span = call_span("streams.blocking_write", Some(stream)).blocking();
        let stream = self.get::<OutputStream>(stream)?;
        Ok(stream.blocking_write(bytes)?)
    }

    pub fn stream_blocking_write_and_flush(&self, handle: Handle, bytes: &[u8]) -> HostResult<()> {
        let span = call_span("streams.blocking_write_and_flush", Some(handle)).blocking();
        let stream = self.get::<OutputStream>(handle)?;
        let result = stream.blocking_write_and_flush(bytes);
        span.record_result(&result);
        Ok(result?)
    }

    pub fn stream_flush(&self, stream: Handle) -> HostResult<()> {
        let stream = self.get::<OutputStream>(stream)?;
        Ok(stream.flush()?)
    }

    pub fn stream_blocking_flush(&self, stream: Handle) -> HostResult<()> {
        let _span = call_span("streams.blocking_flush", Some(stream)).blocking();
        let stream = self.get::<OutputStream>(stream)?;
        Ok(stream.blocking_flush()?)
    }

    pub fn stream_splice(&self, dst: Handle, src: Handle, max: u64) -> HostResult<Transfer> {
        let dst = self.get::<OutputStream>(dst)?;
        let src = self.get::<InputStream>(src)?;
        Ok(dst.splice(&src, max)?)
    }

    pub fn stream_blocking_splice(&self, dst: Handle, src: Handle, max: u64) -> HostResult<Transfer> {
        let _span = call_span("streams.blocking_splice", Some(dst)).blocking();
        let dst = self.get::<OutputStream>(dst)?;
        let src = self.get::<InputStream>(src)?;
        Ok(dst.blocking_splice(&src, max)?)
    }

    pub fn output_stream_subscribe(&self, stream: Handle) -> HostResult<Handle> {
        let stream = self.get::<OutputStream>(stream)?;
        self.push(stream.subscribe())
    }
}

#[inline]
fn clamp(max: u64) -> usize {
    usize::try_from(max).unwrap_or(usize::MAX)
}
