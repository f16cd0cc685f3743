/*!
 * Readiness Signals
 *
 * A `Signal` is raised by whatever changes a resource's state (a pump
 * moving bytes, a connect task finishing). Synchronous waiters register a
 * `Parker` and sleep on its condition variable; the single async consumer
 * of a resource (its background pump) waits on a `tokio::sync::Notify`.
 *
 * Callers must raise a signal only after releasing the lock guarding the
 * state it announces.
 */

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::Notify;

/// One blocked caller
#[derive(Debug, Default)]
pub struct Parker {
    woken: Mutex<bool>,
    condvar: Condvar,
}

impl Parker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unpark(&self) {
        let mut woken = self.woken.lock();
        *woken = true;
        self.condvar.notify_one();
    }

    /// Sleep until unparked or the deadline passes. Consumes the wakeup.
    pub fn park(&self, deadline: Option<Instant>) {
        let mut woken = self.woken.lock();
        while !*woken {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut woken, deadline).timed_out() {
                        break;
                    }
                }
                None => self.condvar.wait(&mut woken),
            }
        }
        *woken = false;
    }
}

/// Change notification for one resource
#[derive(Debug, Default)]
pub struct Signal {
    parkers: Mutex<Vec<Weak<Parker>>>,
    task: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parker; it stays registered until the parker is dropped
    pub fn register(&self, parker: &Arc<Parker>) {
        let mut parkers = self.parkers.lock();
        parkers.retain(|p| p.strong_count() > 0);
        parkers.push(Arc::downgrade(parker));
    }

    /// Wake every registered parker and the async consumer
    pub fn raise(&self) {
        {
            let mut parkers = self.parkers.lock();
            parkers.retain(|weak| match weak.upgrade() {
                Some(parker) => {
                    parker.unpark();
                    true
                }
                None => false,
            });
        }
        self.task.notify_one();
    }

    /// Async wait used by background pumps. A raise that happens before
    /// the await is not lost.
    pub async fn changed(&self) {
        self.task.notified().await
    }

    #[cfg(test)]
    pub(crate) fn registered(&self) -> usize {
        self.parkers
            .lock()
            .iter()
            .filter(|p| p.strong_count() > 0)
            .count()
    }
}
