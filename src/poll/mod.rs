/*!
 * Poll Multiplexer
 * Readiness subscriptions with non-blocking checks and blocking waits
 */

mod multiplexer;
mod pollable;
mod signal;

pub use multiplexer::{block, block_any, block_on, poll};
pub use pollable::{Condition, Pollable, Readiness, Timer};
pub use signal::{Parker, Signal};
