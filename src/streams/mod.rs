/*!
 * Stream Engine
 * Uniform non-blocking byte streams over memory, files, sockets, and HTTP bodies
 *
 * Every stream is a bounded `StreamBuffer` with a guest-facing end
 * (`InputStream` or `OutputStream`). Native handles are attached through
 * background pumps on the host runtime.
 */

mod buffer;
mod input;
mod output;
pub(crate) mod pump;
mod types;

pub(crate) use buffer::StreamBuffer;
pub use input::InputStream;
pub use output::OutputStream;
pub use pump::BodyStream;
pub use types::{ReadOutcome, StreamError, Transfer};

/// In-memory stream pair: bytes written to the output are read from the input
pub fn pipe(capacity: usize) -> (InputStream, OutputStream) {
    let buffer = StreamBuffer::new(capacity);
    (
        InputStream::from_buffer(buffer.clone()),
        OutputStream::from_buffer(buffer),
    )
}
