/*!
 * Network Socket Manager
 * TCP sockets, name resolution and the authority allow-list
 */

mod allowlist;
mod context;
mod lookup;
mod manager;
mod network;
mod tcp;
mod types;

pub use allowlist::{AuthorityAllowList, AuthorityParseError, AuthorityRule};
pub use lookup::ResolveAddressStream;
pub use manager::SocketManager;
pub use network::Network;
pub use tcp::TcpSocket;
pub use types::{IpAddressFamily, ShutdownType, SocketState};
