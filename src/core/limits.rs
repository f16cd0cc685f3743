/*!
 * Host Limits and Constants
 *
 * Default limits for one instantiation. Every value here can be overridden
 * through `HostLimits` in the instantiation config.
 */

use std::time::Duration;

// =============================================================================
// RESOURCE TABLE
// =============================================================================

/// Maximum live handles per instantiation
/// Exceeding it fails allocation with `no-space`
pub const DEFAULT_MAX_RESOURCES: usize = 65_536;

// =============================================================================
// STREAMS
// =============================================================================

/// Bounded buffer capacity per stream (64KB)
/// `write` accepts at most this many bytes before backpressure
pub const DEFAULT_STREAM_CAPACITY: usize = 64 * 1024;

/// Chunk size used by background pumps when moving bytes to or from
/// native handles
/// [PERF] Matches the default tokio read buffer
pub const PUMP_CHUNK_SIZE: usize = 8 * 1024;

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Symlink hops allowed while resolving one path
/// [LINUX-COMPAT] Same as Linux MAXSYMLINKS
pub const DEFAULT_MAX_SYMLINK_DEPTH: usize = 40;

// =============================================================================
// NETWORK
// =============================================================================

/// Connect attempts are abandoned with `timeout` after this long
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending connections queued by a listener before accept
/// [LINUX-COMPAT] Matches SOMAXCONN on older kernels
pub const DEFAULT_LISTEN_BACKLOG: u32 = 128;

// =============================================================================
// RUNTIME
// =============================================================================

/// Async worker threads for native I/O
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Upper bound on the blocking pool (file I/O, DNS)
pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 16;

// =============================================================================
// CLOCKS
// =============================================================================

/// Monotonic clock granularity reported when the platform does not expose one
pub const FALLBACK_CLOCK_RESOLUTION_NS: u64 = 100;

/// Largest single positional read served at once (1MB)
/// Longer requests return a short read
pub const MAX_POSITIONAL_READ: usize = 1024 * 1024;

/// Largest single random byte request (1MB)
pub const MAX_RANDOM_BYTES: u64 = 1024 * 1024;
