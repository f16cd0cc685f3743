/*!
 * Network Capability
 */

use super::allowlist::AuthorityAllowList;
use crate::table::HostResource;
use crate::translate::ErrorCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// Capability granting access to the authorities on one allow-list
#[derive(Debug, Clone)]
pub struct Network {
    allow: Arc<AuthorityAllowList>,
}

impl Network {
    pub fn new(allow: Arc<AuthorityAllowList>) -> Self {
        Self { allow }
    }

    #[inline]
    pub fn allow_list(&self) -> &AuthorityAllowList {
        &self.allow
    }

    /// Refuse a destination before anything native happens
    pub(crate) fn check(&self, addr: &SocketAddr) -> Result<(), ErrorCode> {
        if self.allow.permits_addr(addr) {
            Ok(())
        } else {
            warn!(%addr, "socket address not on allow-list");
            Err(ErrorCode::AccessDenied)
        }
    }
}

impl HostResource for Network {}
