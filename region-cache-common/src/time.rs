//! # Time Helpers
//!
//! The engine stamps entries with nanosecond timestamps so expiry math
//! (`last_modified + duration`) can use plain integer arithmetic on atomics
//! instead of locking to read a `SystemTime`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch, saturating to zero if the clock is
/// somehow before it.
#[inline]
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
