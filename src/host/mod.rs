/*!
 * Host Call Surface
 * Per-instantiation context and handle-based operations grouped by area
 *
 * Every operation takes and returns table handles and reports failures as
 * `HostError`. Only `stream_blocking_*`, `pollable_block`, and
 * `poll_block_any` may suspend the caller.
 */

mod clocks;
mod context;
mod filesystem;
mod http;
mod poll;
mod sockets;
mod streams;

pub use context::{HostContext, HostContextBuilder};
