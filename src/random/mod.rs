/*!
 * Random
 * Host CSPRNG bytes and a separate, explicitly insecure generator
 */

use crate::core::limits::MAX_RANDOM_BYTES;
use crate::translate::ErrorCode;
use parking_lot::Mutex;
use rand::rngs::{OsRng, SmallRng};
use rand::{RngCore, SeedableRng};
use std::fmt;
use tracing::warn;

/// Per-instantiation random sources
pub struct RandomService {
    insecure: Mutex<SmallRng>,
    seed: (u64, u64),
}

impl RandomService {
    pub fn new() -> Self {
        let seed = (os_u64_or_clock(), os_u64_or_clock());
        let insecure = SmallRng::from_rng(OsRng).unwrap_or_else(|_| {
            warn!("OS random source unavailable, seeding insecure generator from the clock");
            SmallRng::seed_from_u64(seed.0 ^ seed.1.rotate_left(32))
        });
        Self {
            insecure: Mutex::new(insecure),
            seed,
        }
    }

    fn check_len(len: u64) -> Result<usize, ErrorCode> {
        if len > MAX_RANDOM_BYTES {
            return Err(ErrorCode::InvalidArgument);
        }
        usize::try_from(len).map_err(|_| ErrorCode::InvalidArgument)
    }

    /// Cryptographically secure bytes from the host
    pub fn random_bytes(&self, len: u64) -> Result<Vec<u8>, ErrorCode> {
        let mut bytes = vec![0u8; Self::check_len(len)?];
        OsRng.try_fill_bytes(&mut bytes).map_err(|_| ErrorCode::Io)?;
        Ok(bytes)
    }

    pub fn random_u64(&self) -> Result<u64, ErrorCode> {
        let mut bytes = [0u8; 8];
        OsRng.try_fill_bytes(&mut bytes).map_err(|_| ErrorCode::Io)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Fast pseudo-random bytes.
    ///
    /// **Not suitable for keys, tokens, nonces or anything else where
    /// predictability matters.** Use `random_bytes` for those.
    pub fn insecure_random_bytes(&self, len: u64) -> Result<Vec<u8>, ErrorCode> {
        let mut bytes = vec![0u8; Self::check_len(len)?];
        self.insecure.lock().fill_bytes(&mut bytes);
        Ok(bytes)
    }

    /// Fast pseudo-random integer; not for security-relevant use
    pub fn insecure_random_u64(&self) -> u64 {
        self.insecure.lock().next_u64()
    }

    /// Fixed per instantiation, for hash-table seeding and the like
    #[inline]
    pub fn insecure_seed(&self) -> (u64, u64) {
        self.seed
    }
}

impl Default for RandomService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomService").finish_non_exhaustive()
    }
}

/// OS randomness, or clock noise when the OS source fails
fn os_u64_or_clock() -> u64 {
    let mut bytes = [0u8; 8];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(_) => u64::from(crate::clocks::wall_now().nanoseconds) ^ crate::clocks::monotonic_now(),
    }
}
