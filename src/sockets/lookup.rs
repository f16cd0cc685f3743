/*!
 * Name Resolution
 * DNS lookups on the host runtime, drained one address at a time
 */

use super::context::SocketContext;
use crate::poll::{Condition, Pollable, Readiness, Signal};
use crate::table::HostResource;
use crate::translate::{ErrorCode, Operation};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

enum Lookup {
    Pending,
    Resolved(VecDeque<IpAddr>),
    Failed(ErrorCode),
}

struct LookupSlot {
    state: Mutex<Lookup>,
    done: AtomicBool,
    signal: Signal,
}

impl LookupSlot {
    fn new(state: Lookup) -> Arc<Self> {
        let done = !matches!(state, Lookup::Pending);
        Arc::new(Self {
            state: Mutex::new(state),
            done: AtomicBool::new(done),
            signal: Signal::new(),
        })
    }

    /// Settle a pending lookup; later outcomes are discarded
    fn finish(&self, state: Lookup) {
        {
            let mut current = self.state.lock();
            if !matches!(*current, Lookup::Pending) {
                return;
            }
            *current = state;
        }
        self.done.store(true, Ordering::Release);
        self.signal.raise();
    }
}

impl Readiness for LookupSlot {
    fn is_ready(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn signal(&self) -> Option<&Signal> {
        Some(&self.signal)
    }
}

/// Pending or completed lookup of one name
pub struct ResolveAddressStream {
    slot: Arc<LookupSlot>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResolveAddressStream {
    pub(crate) fn start(ctx: &SocketContext, name: &str) -> Result<Self, ErrorCode> {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ErrorCode::InvalidArgument);
        }

        // Literal addresses need no lookup
        let literal = name.trim_start_matches('[').trim_end_matches(']');
        if let Ok(addr) = literal.parse::<IpAddr>() {
            return Ok(Self {
                slot: LookupSlot::new(Lookup::Resolved(VecDeque::from([addr]))),
                task: Mutex::new(None),
            });
        }

        let slot = LookupSlot::new(Lookup::Pending);
        let task = {
            let slot = Arc::clone(&slot);
            let translator = ctx.translator;
            let name = name.to_string();
            ctx.runtime.spawn(async move {
                let outcome = match tokio::net::lookup_host((name.as_str(), 0)).await {
                    Ok(addrs) => {
                        let mut unique: VecDeque<IpAddr> = VecDeque::new();
                        for addr in addrs.map(|a| a.ip()) {
                            if !unique.contains(&addr) {
                                unique.push_back(addr);
                            }
                        }
                        debug!(%name, count = unique.len(), "name resolved");
                        Lookup::Resolved(unique)
                    }
                    // Resolver failures carry no OS error code
                    Err(e) if e.raw_os_error().is_none() => Lookup::Failed(ErrorCode::NotFound),
                    Err(e) => Lookup::Failed(translator.translate(&e, Operation::Lookup)),
                };
                slot.finish(outcome);
            })
        };
        Ok(Self {
            slot,
            task: Mutex::new(Some(task)),
        })
    }

    /// Next address; `None` once exhausted, would-block while pending
    pub fn resolve_next_address(&self) -> Result<Option<IpAddr>, ErrorCode> {
        match &mut *self.slot.state.lock() {
            Lookup::Pending => Err(ErrorCode::WouldBlock),
            Lookup::Resolved(addrs) => Ok(addrs.pop_front()),
            Lookup::Failed(code) => Err(*code),
        }
    }

    pub fn subscribe(&self) -> Pollable {
        Pollable::new(
            Arc::clone(&self.slot) as Arc<dyn Readiness>,
            Condition::LookupComplete,
        )
    }
}

impl HostResource for ResolveAddressStream {
    fn release(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.slot.finish(Lookup::Failed(ErrorCode::Interrupted));
    }
}

impl std::fmt::Debug for ResolveAddressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveAddressStream")
            .field("done", &self.slot.is_ready())
            .finish()
    }
}
