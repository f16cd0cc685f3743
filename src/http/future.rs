/*!
 * Pending Responses
 * The in-flight native call behind an outgoing request
 */

use super::body::PendingBody;
use super::client::NativeResponse;
use super::messages::IncomingResponse;
use crate::core::ProtocolViolation;
use crate::poll::{Condition, Pollable, Readiness, Signal};
use crate::table::{HostResource, ResourceKind};
use crate::translate::ErrorCode;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::task::JoinHandle;

enum Outcome {
    Pending,
    Ready(Result<NativeResponse, ErrorCode>),
    Taken,
}

struct ResponseSlot {
    outcome: Mutex<Outcome>,
    done: AtomicBool,
    signal: Signal,
}

impl ResponseSlot {
    /// Settle a pending slot; later results are discarded
    fn complete(&self, result: Result<NativeResponse, ErrorCode>) {
        {
            let mut outcome = self.outcome.lock();
            if !matches!(*outcome, Outcome::Pending) {
                return;
            }
            *outcome = Outcome::Ready(result);
        }
        self.done.store(true, Ordering::Release);
        self.signal.raise();
    }
}

impl Readiness for ResponseSlot {
    fn is_ready(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn signal(&self) -> Option<&Signal> {
        Some(&self.signal)
    }
}

/// Resolves once response headers arrive, independent of the body
pub struct FutureIncomingResponse {
    slot: Arc<ResponseSlot>,
    task: Mutex<Option<JoinHandle<()>>>,
    runtime: RuntimeHandle,
    capacity: usize,
}

impl FutureIncomingResponse {
    pub(crate) fn spawn(
        runtime: &RuntimeHandle,
        call: BoxFuture<'static, Result<NativeResponse, ErrorCode>>,
        capacity: usize,
    ) -> Self {
        let slot = Arc::new(ResponseSlot {
            outcome: Mutex::new(Outcome::Pending),
            done: AtomicBool::new(false),
            signal: Signal::new(),
        });
        let task = {
            let slot = Arc::clone(&slot);
            runtime.spawn(async move {
                let result = call.await;
                slot.complete(result);
            })
        };
        Self {
            slot,
            task: Mutex::new(Some(task)),
            runtime: runtime.clone(),
            capacity,
        }
    }

    /// `Ok(None)` while pending; the result can be taken once
    pub fn get(&self) -> Result<Option<Result<IncomingResponse, ErrorCode>>, ProtocolViolation> {
        let mut outcome = self.slot.outcome.lock();
        match mem::replace(&mut *outcome, Outcome::Taken) {
            Outcome::Pending => {
                *outcome = Outcome::Pending;
                Ok(None)
            }
            Outcome::Taken => Err(ProtocolViolation::AlreadyConsumed(
                ResourceKind::IncomingResponse,
            )),
            Outcome::Ready(result) => Ok(Some(result.map(|native| {
                let body = PendingBody {
                    stream: native.body,
                    trailers: native.trailers,
                    runtime: self.runtime.clone(),
                    capacity: self.capacity,
                };
                IncomingResponse::new(native.status, native.headers, body)
            }))),
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.slot.is_ready()
    }

    pub fn subscribe(&self) -> Pollable {
        Pollable::new(
            Arc::clone(&self.slot) as Arc<dyn Readiness>,
            Condition::ResponseReady,
        )
    }
}

impl HostResource for FutureIncomingResponse {
    /// Cancels the native call; a late result is discarded
    fn release(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        // Wake pollables that outlive the future
        self.slot.complete(Err(ErrorCode::Interrupted));
    }
}

impl fmt::Debug for FutureIncomingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureIncomingResponse")
            .field("ready", &self.slot.is_ready())
            .finish()
    }
}
