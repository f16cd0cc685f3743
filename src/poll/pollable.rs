/*!
 * Pollables
 *
 * A pollable holds its own reference to the readiness source it watches,
 * so its lifetime is independent of the watched resource's handle.
 */

use super::signal::Signal;
use crate::table::HostResource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Non-blocking readiness predicate plus the signal that announces changes
pub trait Readiness: Send + Sync + 'static {
    /// Must not block and must not consume the condition
    fn is_ready(&self) -> bool;

    /// Raised whenever `is_ready` may have changed
    fn signal(&self) -> Option<&Signal>;

    /// Time at which the condition becomes true on its own
    fn deadline(&self) -> Option<Instant> {
        None
    }
}

/// Readiness condition a pollable is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    InputReadable,
    OutputWritable,
    ConnectionEstablished,
    AcceptReady,
    TimerElapsed,
    ResponseReady,
    LookupComplete,
    TrailersReady,
    Always,
}

/// Readiness subscription
pub struct Pollable {
    source: Arc<dyn Readiness>,
    condition: Condition,
}

impl Pollable {
    pub fn new(source: Arc<dyn Readiness>, condition: Condition) -> Self {
        Self { source, condition }
    }

    /// Pollable that is ready immediately
    pub fn ready() -> Self {
        Self::new(Arc::new(AlwaysReady), Condition::Always)
    }

    /// Pollable that becomes ready at `deadline`
    pub fn timer(deadline: Instant) -> Self {
        Self::new(Arc::new(Timer { deadline }), Condition::TimerElapsed)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.source.is_ready()
    }

    #[inline]
    pub fn condition(&self) -> Condition {
        self.condition
    }

    #[inline]
    pub(crate) fn source(&self) -> &dyn Readiness {
        self.source.as_ref()
    }
}

impl HostResource for Pollable {}

impl fmt::Debug for Pollable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pollable")
            .field("condition", &self.condition)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Deadline-driven readiness
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    deadline: Instant,
}

impl Timer {
    pub fn new(deadline: Instant) -> Self {
        Self { deadline }
    }
}

impl Readiness for Timer {
    fn is_ready(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn signal(&self) -> Option<&Signal> {
        None
    }

    fn deadline(&self) -> Option<Instant> {
        Some(self.deadline)
    }
}

struct AlwaysReady;

impl Readiness for AlwaysReady {
    fn is_ready(&self) -> bool {
        true
    }

    fn signal(&self) -> Option<&Signal> {
        None
    }
}
