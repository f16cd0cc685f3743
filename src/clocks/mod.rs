/*!
 * Clocks
 * Monotonic and wall clocks plus timer subscriptions
 *
 * The monotonic clock counts nanoseconds from a fixed reference taken the
 * first time any clock is read, so it is unaffected by wall clock changes.
 */

use crate::core::limits::FALLBACK_CLOCK_RESOLUTION_NS;
use crate::filesystem::Datetime;
use crate::poll::Pollable;
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime};

/// Nanoseconds on the monotonic clock
pub type MonotonicInstant = u64;

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Timers further out than this are treated as never firing
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[inline]
fn origin() -> Instant {
    *ORIGIN.get_or_init(Instant::now)
}

fn deadline_after(base: Instant, offset: Duration) -> Instant {
    base.checked_add(offset)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Current monotonic time
pub fn monotonic_now() -> MonotonicInstant {
    let elapsed = Instant::now().saturating_duration_since(origin());
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

/// Granularity reported by the platform, in nanoseconds
pub fn monotonic_resolution() -> u64 {
    platform_resolution().unwrap_or(FALLBACK_CLOCK_RESOLUTION_NS)
}

#[cfg(unix)]
fn platform_resolution() -> Option<u64> {
    use nix::time::{clock_getres, ClockId};
    let res = clock_getres(ClockId::CLOCK_MONOTONIC).ok()?;
    let nanos = (res.tv_sec() as u64)
        .checked_mul(1_000_000_000)?
        .checked_add(res.tv_nsec() as u64)?;
    (nanos > 0).then_some(nanos)
}

#[cfg(not(unix))]
fn platform_resolution() -> Option<u64> {
    None
}

/// Pollable ready `nanos` from now
pub fn subscribe_duration(nanos: u64) -> Pollable {
    Pollable::timer(deadline_after(Instant::now(), Duration::from_nanos(nanos)))
}

/// Pollable ready once the monotonic clock reaches `when`
pub fn subscribe_instant(when: MonotonicInstant) -> Pollable {
    Pollable::timer(deadline_after(origin(), Duration::from_nanos(when)))
}

/// Seconds and nanoseconds since the Unix epoch
pub fn wall_now() -> Datetime {
    Datetime::from_system_time(SystemTime::now())
}

pub fn wall_resolution() -> Datetime {
    let nanos = monotonic_resolution();
    Datetime {
        seconds: nanos / 1_000_000_000,
        nanoseconds: (nanos % 1_000_000_000) as u32,
    }
}
