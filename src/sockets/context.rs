/*!
 * Socket Context
 * Runtime and tunables shared by every socket of an instantiation
 */

use crate::core::limits::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_LISTEN_BACKLOG, DEFAULT_STREAM_CAPACITY};
use crate::translate::ErrorCodeTranslator;
use std::time::Duration;
use tokio::runtime::Handle as RuntimeHandle;

#[derive(Debug, Clone)]
pub(crate) struct SocketContext {
    pub runtime: RuntimeHandle,
    pub translator: ErrorCodeTranslator,
    pub connect_timeout: Duration,
    pub listen_backlog: u32,
    pub stream_capacity: usize,
}

impl SocketContext {
    pub fn new(runtime: RuntimeHandle, translator: ErrorCodeTranslator) -> Self {
        Self {
            runtime,
            translator,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}
