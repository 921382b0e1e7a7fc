//! Conversions between `SystemTime` and the on-disk tick representation.
//!
//! State files store instants as unsigned 100-nanosecond ticks since the Unix
//! epoch. Staleness checks compare at that resolution, so every time that is
//! compared against a stored value is truncated to whole ticks first.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const NANOS_PER_TICK: u64 = 100;
pub const TICKS_PER_SECOND: u64 = 1_000_000_000 / NANOS_PER_TICK;

/// Convert to ticks since the epoch. Instants before the epoch clamp to zero.
pub fn to_file_ticks(time: SystemTime) -> u64 {
  match time.duration_since(UNIX_EPOCH) {
    Ok(elapsed) => {
      elapsed.as_secs() * TICKS_PER_SECOND + u64::from(elapsed.subsec_nanos()) / NANOS_PER_TICK
    }
    Err(_) => 0,
  }
}

pub fn from_file_ticks(ticks: u64) -> SystemTime {
  let secs = ticks / TICKS_PER_SECOND;
  let nanos = (ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
  UNIX_EPOCH + Duration::new(secs, nanos as u32)
}

/// Round a time down to tick resolution.
pub fn truncate_to_ticks(time: SystemTime) -> SystemTime {
  from_file_ticks(to_file_ticks(time))
}

/// The current time at tick resolution.
pub fn now() -> SystemTime {
  truncate_to_ticks(SystemTime::now())
}
