//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Round a millisecond timestamp up to whole seconds.
pub fn millis_to_secs_ceil(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
