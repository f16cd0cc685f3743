/*!
 * Poll Calls
 * Subscriptions by handle and waits over pollable handles
 */

use super::context::HostContext;
use crate::core::{Handle, HostResult};
use crate::monitoring::call_span;
use crate::poll::{self, Pollable};
use crate::table::Resource;
use crate::translate::ErrorCode;
use std::sync::Arc;
use tracing::debug;

impl HostContext {
    /// Subscribe to the readiness condition of any pollable resource kind
    ///
    /// Kinds without a readiness condition fail with `unsupported`.
    pub fn subscribe(&self, handle: Handle) -> HostResult<Handle> {
        let pollable = match self.table.get(handle)? {
            Resource::InputStream(stream) => stream.subscribe(),
            Resource::OutputStream(stream) => stream.subscribe(),
            Resource::TcpSocket(socket) => socket.subscribe(),
            Resource::ResolveAddressStream(lookup) => lookup.subscribe(),
            Resource::FutureIncomingResponse(future) => future.subscribe(),
            Resource::IncomingBody(body) => body.subscribe_trailers(),
            other => {
                debug!(%handle, kind = %other.kind(), "subscribe on non-pollable resource");
                return Err(ErrorCode::Unsupported.into());
            }
        };
        self.push(pollable)
    }

    /// Whether `pollable` is ready now. Never blocks.
    pub fn pollable_ready(&self, pollable: Handle) -> HostResult<bool> {
        Ok(self.get::<Pollable>(pollable)?.is_ready())
    }

    /// Suspend until `pollable` is ready
    pub fn pollable_block(&self, handle: Handle) -> HostResult<()> {
        let _span = call_span("poll.block", Some(handle)).blocking();
        let pollable = self.get::<Pollable>(handle)?;
        poll::block(&pollable);
        Ok(())
    }

    /// Indices into `set` of the members ready now. Never blocks.
    pub fn poll(&self, set: &[Handle]) -> HostResult<Vec<u32>> {
        let pollables = self.pollables(set)?;
        Ok(poll::poll(&pollables))
    }

    /// Suspend until at least one member of `set` is ready
    pub fn poll_block_any(&self, set: &[Handle]) -> HostResult<Vec<u32>> {
        let _span = call_span("poll.block_any", None).blocking();
        let pollables = self.pollables(set)?;
        Ok(poll::block_any(&pollables))
    }

    fn pollables(&self, set: &[Handle]) -> HostResult<Vec<Arc<Pollable>>> {
        set.iter().map(|handle| self.get::<Pollable>(*handle)).collect()
    }
}
