use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time as milliseconds since Unix epoch.
/// A clock set before the epoch reads as 0 rather than failing.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
