//! Wall-clock deadline helpers.
//!
//! Expiration deadlines are absolute nanoseconds since the UNIX epoch.
//! Wall-clock time is required because the protocol exposes
//! absolute-timestamp options (EXAT/PXAT) that must survive restarts.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sentinel deadline meaning "no expiration".
pub const NO_EXPIRY: i64 = 0;

/// Current wall-clock time in nanoseconds since the UNIX epoch.
#[inline]
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}

/// Converts a TTL duration to an absolute deadline from now.
///
/// `Duration::as_nanos()` returns u128; TTLs beyond the i64 range clamp
/// to `i64::MAX` instead of wrapping into the past.
#[inline]
pub fn deadline_after(ttl: Duration) -> i64 {
    let nanos = ttl.as_nanos().min(i64::MAX as u128) as i64;
    now_nanos().saturating_add(nanos)
}
