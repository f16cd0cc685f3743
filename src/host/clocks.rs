/*!
 * Clock and Random Calls
 */

use super::context::HostContext;
use crate::clocks::{self, MonotonicInstant};
use crate::core::{Handle, HostResult};
use crate::filesystem::Datetime;

impl HostContext {
    #[inline]
    pub fn monotonic_now(&self) -> MonotonicInstant {
        clocks::monotonic_now()
    }

    #[inline]
    pub fn monotonic_resolution(&self) -> u64 {
        clocks::monotonic_resolution()
    }

    /// Timer pollable ready `nanos` from now
    pub fn subscribe_duration(&self, nanos: u64) -> HostResult<Handle> {
        self.push(clocks::subscribe_duration(nanos))
    }

    /// Timer pollable ready at monotonic time `when`
    pub fn subscribe_instant(&self, when: MonotonicInstant) -> HostResult<Handle> {
        self.push(clocks::subscribe_instant(when))
    }

    #[inline]
    pub fn wall_now(&self) -> Datetime {
        clocks::wall_now()
    }

    #[inline]
    pub fn wall_resolution(&self) -> Datetime {
        clocks::wall_resolution()
    }

    // =========================================================================
    // Random
    // =========================================================================

    pub fn random_bytes(&self, len: u64) -> HostResult<Vec<u8>> {
        Ok(self.random.random_bytes(len)?)
    }

    pub fn random_u64(&self) -> HostResult<u64> {
        Ok(self.random.random_u64()?)
    }

    pub fn insecure_random_bytes(&self, len: u64) -> HostResult<Vec<u8>> {
        Ok(self.random.insecure_random_bytes(len)?)
    }

    #[inline]
    pub fn insecure_random_u64(&self) -> u64 {
        self.random.insecure_random_u64()
    }

    #[inline]
    pub fn insecure_seed(&self) -> (u64, u64) {
        self.random.insecure_seed()
    }
}
