/*!
 * Message Bodies
 * Streaming bodies bridged between guest streams and native byte streams
 */

use super::fields::Fields;
use crate::core::ProtocolViolation;
use crate::poll::{Condition, Pollable, Readiness, Signal};
use crate::streams::{pump, BodyStream, InputStream, OutputStream, StreamBuffer};
use crate::table::{HostResource, ResourceKind};
use crate::translate::ErrorCode;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Trailers delivered to the native side once a body is finished
pub type TrailerReceiver = oneshot::Receiver<Option<HeaderMap>>;

// =============================================================================
// Outgoing
// =============================================================================

/// Body of a message the guest is sending
pub struct OutgoingBody {
    buffer: Arc<StreamBuffer>,
    stream_taken: AtomicBool,
    finished: AtomicBool,
    trailers: Mutex<Option<oneshot::Sender<Option<HeaderMap>>>>,
}

impl OutgoingBody {
    pub(crate) fn new(capacity: usize) -> (Self, OutgoingBodyTail) {
        let buffer = StreamBuffer::new(capacity);
        let (tx, rx) = oneshot::channel();
        let body = Self {
            buffer: Arc::clone(&buffer),
            stream_taken: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            trailers: Mutex::new(Some(tx)),
        };
        (body, OutgoingBodyTail { buffer, trailers: rx })
    }

    /// The body's output stream; available once
    pub fn write(&self) -> Result<OutputStream, ProtocolViolation> {
        if self.stream_taken.swap(true, Ordering::AcqRel) {
            return Err(ProtocolViolation::AlreadyConsumed(ResourceKind::OutputStream));
        }
        Ok(OutputStream::for_body(Arc::clone(&self.buffer)))
    }

    /// Mark the body complete and hand over the trailers
    pub fn finish(&self, trailers: Option<Fields>) -> Result<(), ErrorCode> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(ErrorCode::InvalidArgument);
        }
        if let Some(code) = self.buffer.error() {
            return Err(code);
        }
        self.buffer.close_producer();
        if let Some(tx) = self.trailers.lock().take() {
            // The native side may have stopped listening
            let _ = tx.send(trailers.map(|t| t.as_map().clone()));
        }
        debug!("outgoing body finished");
        Ok(())
    }
}

impl HostResource for OutgoingBody {
    /// Dropping an unfinished body aborts the message
    fn release(&self) {
        if !self.finished.load(Ordering::Acquire) {
            debug!("outgoing body dropped before finish");
            self.buffer.fail(ErrorCode::Io);
        }
    }
}

impl fmt::Debug for OutgoingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingBody")
            .field("buffer", &self.buffer)
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish()
    }
}

/// Native-facing half of an outgoing body
pub(crate) struct OutgoingBodyTail {
    buffer: Arc<StreamBuffer>,
    trailers: TrailerReceiver,
}

impl OutgoingBodyTail {
    pub fn into_parts(self) -> (BodyStream, TrailerReceiver) {
        (pump::body_out(self.buffer), self.trailers)
    }

    /// Tail of a body the guest never created: empty, no trailers
    pub fn empty() -> (BodyStream, TrailerReceiver) {
        let buffer = StreamBuffer::new(1);
        buffer.close_producer();
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(None);
        (pump::body_out(buffer), rx)
    }
}

/// Slot for the body of a message under construction; creatable once
pub(crate) struct BodySlot {
    capacity: usize,
    tail: Mutex<Option<OutgoingBodyTail>>,
    taken: AtomicBool,
}

impl BodySlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tail: Mutex::new(None),
            taken: AtomicBool::new(false),
        }
    }

    pub fn create(&self, kind: ResourceKind) -> Result<OutgoingBody, ProtocolViolation> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return Err(ProtocolViolation::AlreadyConsumed(kind));
        }
        let (body, tail) = OutgoingBody::new(self.capacity);
        *self.tail.lock() = Some(tail);
        Ok(body)
    }

    /// Native body stream: the guest's body if created, else empty
    pub fn take_native(&self) -> (Option<BodyStream>, TrailerReceiver) {
        match self.tail.lock().take() {
            Some(tail) => {
                let (stream, trailers) = tail.into_parts();
                (Some(stream), trailers)
            }
            None => {
                let (_, trailers) = OutgoingBodyTail::empty();
                (None, trailers)
            }
        }
    }
}

// =============================================================================
// Incoming
// =============================================================================

enum Trailers {
    Pending,
    Ready(Option<HeaderMap>),
    Failed(ErrorCode),
}

struct IncomingShared {
    buffer: Arc<StreamBuffer>,
    trailers: Mutex<Trailers>,
}

impl IncomingShared {
    /// Pump finished and the guest consumed (or discarded) every byte
    fn complete(&self) -> bool {
        !matches!(*self.trailers.lock(), Trailers::Pending) && self.buffer.buffered() == 0
    }
}

/// Trailers become observable after the body reports completion
struct TrailersReady(Arc<IncomingShared>);

impl Readiness for TrailersReady {
    fn is_ready(&self) -> bool {
        self.0.complete()
    }

    fn signal(&self) -> Option<&Signal> {
        Some(self.0.buffer.signal())
    }
}

/// Native body not yet attached to a buffer
pub(crate) struct PendingBody {
    pub stream: BodyStream,
    pub trailers: Option<HeaderMap>,
    pub runtime: RuntimeHandle,
    pub capacity: usize,
}

impl PendingBody {
    pub fn into_incoming(self) -> IncomingBody {
        IncomingBody::spawn(self)
    }
}

/// Body of a message the guest is receiving
pub struct IncomingBody {
    shared: Arc<IncomingShared>,
    stream_taken: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl IncomingBody {
    fn spawn(pending: PendingBody) -> Self {
        let shared = Arc::new(IncomingShared {
            buffer: StreamBuffer::new(pending.capacity),
            trailers: Mutex::new(Trailers::Pending),
        });
        let task = {
            let shared = Arc::clone(&shared);
            let PendingBody {
                stream, trailers, ..
            } = pending;
            pending.runtime.spawn(async move {
                let clean = pump::pump_body_in(stream, &shared.buffer).await;
                let outcome = if clean {
                    Trailers::Ready(trailers)
                } else {
                    match shared.buffer.error() {
                        Some(code) => Trailers::Failed(code),
                        None => Trailers::Ready(None),
                    }
                };
                *shared.trailers.lock() = outcome;
                shared.buffer.close_producer();
            })
        };
        Self {
            shared,
            stream_taken: AtomicBool::new(false),
            pump: Mutex::new(Some(task)),
        }
    }

    /// The body's input stream; available once
    pub fn stream(&self) -> Result<InputStream, ProtocolViolation> {
        if self.stream_taken.swap(true, Ordering::AcqRel) {
            return Err(ProtocolViolation::AlreadyConsumed(ResourceKind::InputStream));
        }
        Ok(InputStream::from_buffer(Arc::clone(&self.shared.buffer)))
    }

    /// Trailers, would-block until the body is fully consumed
    pub fn trailers(&self) -> Result<Option<Fields>, ErrorCode> {
        if !self.shared.complete() {
            return Err(ErrorCode::WouldBlock);
        }
        match &*self.shared.trailers.lock() {
            Trailers::Pending => Err(ErrorCode::WouldBlock),
            Trailers::Ready(map) => Ok(map.clone().map(Fields::received)),
            Trailers::Failed(code) => Err(*code),
        }
    }

    pub fn subscribe_trailers(&self) -> Pollable {
        Pollable::new(
            Arc::new(TrailersReady(Arc::clone(&self.shared))),
            Condition::TrailersReady,
        )
    }
}

impl HostResource for IncomingBody {
    fn release(&self) {
        if let Some(task) = self.pump.lock().take() {
            task.abort();
        }
        self.shared.buffer.close_consumer();
    }
}

impl fmt::Debug for IncomingBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingBody")
            .field("buffer", &self.shared.buffer)
            .finish()
    }
}
