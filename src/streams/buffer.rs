/*!
 * Stream Buffer
 *
 * Bounded byte ring shared by the two ends of a stream. One end may be a
 * background pump talking to a native handle; the other end is always the
 * guest-facing stream object. There is exactly one producer and one
 * consumer per buffer.
 *
 * Buffered bytes are always delivered before a recorded failure or end.
 */

use super::types::{ReadOutcome, StreamError};
use crate::poll::{Readiness, Signal};
use crate::translate::ErrorCode;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::fmt;
use std::sync::Arc;

struct BufferState {
    ring: HeapRb<u8>,
    /// Producer will push no more bytes
    producer_closed: bool,
    /// Consumer is gone; pushes fail with `Closed`
    consumer_closed: bool,
    error: Option<ErrorCode>,
    /// Bytes popped by an async consumer that are not yet confirmed written
    in_flight: usize,
}

pub(crate) struct StreamBuffer {
    state: Mutex<BufferState>,
    signal: Signal,
    capacity: usize,
}

/// Outcome of an async consumer draining the ring
pub(crate) enum Drain {
    Data(usize),
    Empty,
    Finished,
    Failed(ErrorCode),
}

/// Room available to an async producer
pub(crate) enum Space {
    Available(usize),
    Full,
    Closed,
}

impl StreamBuffer {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            state: Mutex::new(BufferState {
                ring: HeapRb::<u8>::new(capacity),
                producer_closed: false,
                consumer_closed: false,
                error: None,
                in_flight: 0,
            }),
            signal: Signal::new(),
            capacity,
        })
    }

    #[inline]
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ---------------------------------------------------------------------
    // Producer side
    // ---------------------------------------------------------------------

    /// Free space, or the terminal condition that forbids writing
    pub fn vacant(&self) -> Result<usize, StreamError> {
        let state = self.state.lock();
        Self::writable_state(&state)?;
        Ok(state.ring.vacant_len())
    }

    /// Accept as many bytes as fit
    pub fn push(&self, data: &[u8]) -> Result<usize, StreamError> {
        let accepted = {
            let mut state = self.state.lock();
            Self::writable_state(&state)?;
            state.ring.push_slice(data)
        };
        if accepted > 0 {
            self.signal.raise();
        }
        Ok(accepted)
    }

    pub fn space(&self) -> Space {
        let state = self.state.lock();
        if state.consumer_closed || state.producer_closed || state.error.is_some() {
            return Space::Closed;
        }
        match state.ring.vacant_len() {
            0 => Space::Full,
            n => Space::Available(n),
        }
    }

    pub fn close_producer(&self) {
        self.state.lock().producer_closed = true;
        self.signal.raise();
    }

    /// Record a native fault. The first fault wins.
    pub fn fail(&self, code: ErrorCode) {
        {
            let mut state = self.state.lock();
            if state.error.is_none() {
                state.error = Some(code);
            }
        }
        self.signal.raise();
    }

    fn writable_state(state: &BufferState) -> Result<(), StreamError> {
        if let Some(code) = state.error {
            return Err(StreamError::LastOperationFailed(code));
        }
        if state.consumer_closed || state.producer_closed {
            return Err(StreamError::Closed);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Consumer side
    // ---------------------------------------------------------------------

    pub fn pop(&self, max: usize) -> Result<ReadOutcome, StreamError> {
        let outcome = {
            let mut state = self.state.lock();
            let len = max.min(state.ring.occupied_len());
            if len == 0 {
                return Self::empty_outcome(&state).map(|ended| ReadOutcome {
                    bytes: Vec::new(),
                    ended,
                });
            }
            let mut bytes = vec![0u8; len];
            let read = state.ring.pop_slice(&mut bytes);
            bytes.truncate(read);
            let ended =
                state.producer_closed && state.error.is_none() && state.ring.is_empty();
            ReadOutcome { bytes, ended }
        };
        self.signal.raise();
        Ok(outcome)
    }

    /// Discard up to `max` bytes
    pub fn skip(&self, max: usize) -> Result<(usize, bool), StreamError> {
        let skipped = {
            let mut state = self.state.lock();
            let len = max.min(state.ring.occupied_len());
            if len == 0 {
                return Self::empty_outcome(&state).map(|ended| (0, ended));
            }
            let skipped = state.ring.skip(len);
            let ended =
                state.producer_closed && state.error.is_none() && state.ring.is_empty();
            (skipped, ended)
        };
        self.signal.raise();
        Ok(skipped)
    }

    fn empty_outcome(state: &BufferState) -> Result<bool, StreamError> {
        if let Some(code) = state.error {
            return Err(StreamError::LastOperationFailed(code));
        }
        if state.producer_closed {
            return Ok(true);
        }
        if state.consumer_closed {
            return Err(StreamError::Closed);
        }
        Ok(false)
    }

    /// Pop into `chunk` on behalf of an async consumer. Popped bytes count
    /// as in flight until `complete_flight`.
    pub fn take_chunk(&self, chunk: &mut [u8]) -> Drain {
        let drained = {
            let mut state = self.state.lock();
            let n = state.ring.pop_slice(chunk);
            if n > 0 {
                state.in_flight += n;
                Drain::Data(n)
            } else if let Some(code) = state.error {
                Drain::Failed(code)
            } else if state.producer_closed || state.consumer_closed {
                Drain::Finished
            } else {
                Drain::Empty
            }
        };
        if matches!(drained, Drain::Data(_)) {
            self.signal.raise();
        }
        drained
    }

    pub fn complete_flight(&self, len: usize, failure: Option<ErrorCode>) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(len);
            if let Some(code) = failure {
                if state.error.is_none() {
                    state.error = Some(code);
                }
                state.ring.clear();
            }
        }
        self.signal.raise();
    }

    pub fn close_consumer(&self) {
        {
            let mut state = self.state.lock();
            state.consumer_closed = true;
            state.ring.clear();
        }
        self.signal.raise();
    }

    // ---------------------------------------------------------------------
    // Readiness predicates
    // ---------------------------------------------------------------------

    pub fn is_readable(&self) -> bool {
        let state = self.state.lock();
        !state.ring.is_empty()
            || state.producer_closed
            || state.consumer_closed
            || state.error.is_some()
    }

    pub fn is_writable(&self) -> bool {
        let state = self.state.lock();
        state.ring.vacant_len() > 0
            || state.producer_closed
            || state.consumer_closed
            || state.error.is_some()
    }

    /// Everything pushed so far has reached the sink (or never will)
    pub fn is_flushed(&self) -> bool {
        let state = self.state.lock();
        (state.ring.is_empty() && state.in_flight == 0)
            || state.consumer_closed
            || state.error.is_some()
    }

    /// Producer closed and every byte consumed
    pub fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.producer_closed && state.ring.is_empty()
    }

    pub fn error(&self) -> Option<ErrorCode> {
        self.state.lock().error
    }

    pub fn buffered(&self) -> usize {
        self.state.lock().ring.occupied_len()
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StreamBuffer")
            .field("buffered_bytes", &state.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("producer_closed", &state.producer_closed)
            .field("consumer_closed", &state.consumer_closed)
            .field("error", &state.error)
            .finish()
    }
}

/// Data available, end reached, or stream errored
pub(crate) struct Readable(pub Arc<StreamBuffer>);

impl Readiness for Readable {
    fn is_ready(&self) -> bool {
        self.0.is_readable()
    }

    fn signal(&self) -> Option<&Signal> {
        Some(self.0.signal())
    }
}

/// Space available or stream no longer writable
pub(crate) struct Writable(pub Arc<StreamBuffer>);

impl Readiness for Writable {
    fn is_ready(&self) -> bool {
        self.0.is_writable()
    }

    fn signal(&self) -> Option<&Signal> {
        Some(self.0.signal())
    }
}

pub(crate) struct Flushed(pub Arc<StreamBuffer>);

impl Readiness for Flushed {
    fn is_ready(&self) -> bool {
        self.0.is_flushed()
    }

    fn signal(&self) -> Option<&Signal> {
        Some(self.0.signal())
    }
}
