/*!
 * Socket Manager
 * Creates network capabilities, sockets and lookups for one instantiation
 */

use super::allowlist::AuthorityAllowList;
use super::context::SocketContext;
use super::lookup::ResolveAddressStream;
use super::network::Network;
use super::tcp::TcpSocket;
use super::types::IpAddressFamily;
use crate::translate::{ErrorCode, ErrorCodeTranslator};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::debug;

pub struct SocketManager {
    ctx: SocketContext,
    allow: Arc<AuthorityAllowList>,
}

impl SocketManager {
    pub fn new(
        allow: Arc<AuthorityAllowList>,
        runtime: RuntimeHandle,
        translator: ErrorCodeTranslator,
    ) -> Self {
        Self {
            ctx: SocketContext::new(runtime, translator),
            allow,
        }
    }

    pub fn with_limits(mut self, connect_timeout: Duration, listen_backlog: u32, stream_capacity: usize) -> Self {
        self.ctx.connect_timeout = connect_timeout;
        self.ctx.listen_backlog = listen_backlog;
        self.ctx.stream_capacity = stream_capacity;
        self
    }

    /// The network capability handed to the guest at instantiation
    pub fn instance_network(&self) -> Network {
        Network::new(Arc::clone(&self.allow))
    }

    #[inline]
    pub fn allow_list(&self) -> &Arc<AuthorityAllowList> {
        &self.allow
    }

    pub fn create_tcp_socket(&self, family: IpAddressFamily) -> TcpSocket {
        debug!(?family, "tcp socket created");
        TcpSocket::new(self.ctx.clone(), family)
    }

    pub fn resolve_addresses(&self, _network: &Network, name: &str) -> Result<ResolveAddressStream, ErrorCode> {
        ResolveAddressStream::start(&self.ctx, name)
    }
}
