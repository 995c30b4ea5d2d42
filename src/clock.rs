//! Wall-clock reads for packet timestamps

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;

/// Current wall-clock time in nanoseconds since the epoch.
///
/// Fails only if the system clock reads before the epoch; callers inside a
/// control loop log and skip the iteration rather than aborting.
pub fn wall_clock_ns() -> Result<u64, Error> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .map_err(|e| Error::Clock(e.to_string()))
}
