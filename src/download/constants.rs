//! Constants for the download module (timeouts, limits).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout. Each attempt is additionally bounded by the
/// scheduler's per-task timeout.
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Default number of downloads running at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Lower bound for the concurrency limit.
pub const MIN_CONCURRENCY: usize = 1;

/// Upper bound for the concurrency limit.
pub const MAX_CONCURRENCY: usize = 100;
