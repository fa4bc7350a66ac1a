//! Time utility functions

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds, stamped on every mirror trace.
///
/// A clock set before the epoch reads as zero.
pub fn now_ms() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as u64)
    .unwrap_or_default()
}
