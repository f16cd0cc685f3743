/*!
 * Socket Calls
 * TCP lifecycle and name lookup by handle
 */

use super::context::HostContext;
use crate::core::{Handle, HostResult};
use crate::sockets::{
    IpAddressFamily, Network, ResolveAddressStream, ShutdownType, SocketState, TcpSocket,
};
use std::net::{IpAddr, SocketAddr};
use tracing::instrument;

impl HostContext {
    /// Network capability bound to the configured allow-list
    pub fn instance_network(&self) -> HostResult<Handle> {
        self.push(self.sockets.instance_network())
    }

    pub fn create_tcp_socket(&self, family: IpAddressFamily) -> HostResult<Handle> {
        self.push(self.sockets.create_tcp_socket(family))
    }

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn tcp_bind(&self, socket: Handle, network: Handle, local: SocketAddr) -> HostResult<()> {
        let socket = self.get::<TcpSocket>(socket)?;
        let network = self.get::<Network>(network)?;
        Ok(socket.bind(&network, local)?)
    }

    /// `None` uses the configured default backlog
    pub fn tcp_listen(&self, socket: Handle, backlog: Option<u32>) -> HostResult<()> {
        let socket = self.get::<TcpSocket>(socket)?;
        Ok(socket.listen(backlog)?)
    }

    /// Returns `(socket, input, output)` for the accepted connection
    pub fn tcp_accept(&self, listener: Handle) -> HostResult<(Handle, Handle, Handle)> {
        let listener = self.get::<TcpSocket>(listener)?;
        // A full table leaves the connection queued
        let slots = (self.reserve()?, self.reserve()?, self.reserve()?);
        let (socket, input, output) = listener.accept()?;
        Ok((slots.0.fill(socket), slots.1.fill(input), slots.2.fill(output)))
    }

    /// Begin connecting; completion is observed through `subscribe`
    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn tcp_start_connect(
        &self,
        socket: Handle,
        network: Handle,
        remote: SocketAddr,
    ) -> HostResult<()> {
        let socket = self.get::<TcpSocket>(socket)?;
        let network = self.get::<Network>(network)?;
        Ok(socket.start_connect(&network, remote)?)
    }

    /// Returns `(input, output)` once connected; `would-block` while pending
    pub fn tcp_finish_connect(&self, socket: Handle) -> HostResult<(Handle, Handle)> {
        let socket = self.get::<TcpSocket>(socket)?;
        let slots = (self.reserve()?, self.reserve()?);
        let (input, output) = socket.finish_connect()?;
        Ok((slots.0.fill(input), slots.1.fill(output)))
    }

    pub fn tcp_shutdown(&self, socket: Handle, how: ShutdownType) -> HostResult<()> {
        let socket = self.get::<TcpSocket>(socket)?;
        Ok(socket.shutdown(how)?)
    }

    pub fn tcp_local_address(&self, socket: Handle) -> HostResult<SocketAddr> {
        Ok(self.get::<TcpSocket>(socket)?.local_address()?)
    }

    pub fn tcp_remote_address(&self, socket: Handle) -> HostResult<SocketAddr> {
        Ok(self.get::<TcpSocket>(socket)?.remote_address()?)
    }

    pub fn tcp_address_family(&self, socket: Handle) -> HostResult<IpAddressFamily> {
        Ok(self.get::<TcpSocket>(socket)?.address_family())
    }

    pub fn tcp_state(&self, socket: Handle) -> HostResult<SocketState> {
        Ok(self.get::<TcpSocket>(socket)?.state())
    }

    pub fn tcp_subscribe(&self, socket: Handle) -> HostResult<Handle> {
        let socket = self.get::<TcpSocket>(socket)?;
        self.push(socket.subscribe())
    }

    // =========================================================================
    // Name lookup
    // =========================================================================

    #[instrument(level = "debug", skip(self), err(Display))]
    pub fn resolve_addresses(&self, network: Handle, name: &str) -> HostResult<Handle> {
        let network = self.get::<Network>(network)?;
        let lookup = self.sockets.resolve_addresses(&network, name)?;
        self.push(lookup)
    }

    /// Next resolved address, `None` when exhausted, `would-block` while pending
    pub fn resolve_next_address(&self, lookup: Handle) -> HostResult<Option<IpAddr>> {
        let lookup = self.get::<ResolveAddressStream>(lookup)?;
        Ok(lookup.resolve_next_address()?)
    }

    pub fn resolve_subscribe(&self, lookup: Handle) -> HostResult<Handle> {
        let lookup = self.get::<ResolveAddressStream>(lookup)?;
        self.push(lookup.subscribe())
    }
}
