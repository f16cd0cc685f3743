/*!
 * Multiplexer
 *
 * `poll` only evaluates predicates. `block` and `block_any` park the caller
 * on a condition variable that every watched signal can wake; timers
 * contribute a park deadline instead of a signal.
 */

use super::pollable::{Pollable, Readiness};
use super::signal::Parker;
use std::sync::Arc;

/// Indices of the members of `set` that are ready now. Never blocks.
pub fn poll(set: &[Arc<Pollable>]) -> Vec<u32> {
    set.iter()
        .enumerate()
        .filter(|(_, pollable)| pollable.is_ready())
        .map(|(index, _)| index as u32)
        .collect()
}

/// Suspend until `pollable` is ready
pub fn block(pollable: &Pollable) {
    block_on(pollable.source());
}

/// Suspend until `readiness` holds
pub fn block_on(readiness: &dyn Readiness) {
    if readiness.is_ready() {
        return;
    }
    let parker = Parker::new();
    if let Some(signal) = readiness.signal() {
        signal.register(&parker);
    }
    while !readiness.is_ready() {
        parker.park(readiness.deadline());
    }
}

/// Suspend until at least one member of `set` is ready; returns the ready
/// indices. An empty set returns immediately with no indices.
pub fn block_any(set: &[Arc<Pollable>]) -> Vec<u32> {
    let ready = poll(set);
    if !ready.is_empty() || set.is_empty() {
        return ready;
    }

    let parker = Parker::new();
    for pollable in set {
        if let Some(signal) = pollable.source().signal() {
            signal.register(&parker);
        }
    }
    let deadline = set
        .iter()
        .filter_map(|pollable| pollable.source().deadline())
        .min();

    loop {
        let ready = poll(set);
        if !ready.is_empty() {
            return ready;
        }
        parker.park(deadline);
    }
}
