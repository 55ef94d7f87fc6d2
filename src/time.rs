//! Monotonic-seconds / epoch-millisecond time base.
//!
//! The session engine times itself against `Instant` so reconnect pacing and
//! heartbeat timers are immune to wall-clock jumps, but the wire protocol and
//! UI both want epoch milliseconds. Every conversion between the two goes
//! through this module so there is exactly one place that can get it wrong.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Anchors a process's monotonic clock to wall-clock epoch time.
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    anchor_instant: Instant,
    anchor_epoch_ms: i64,
}

impl TimeBase {
    /// Captures `now` as the anchor point. Call once at process start.
    pub fn new() -> Self {
        Self {
            anchor_instant: Instant::now(),
            anchor_epoch_ms: epoch_ms_now(),
        }
    }

    /// Monotonic seconds elapsed since the anchor, as an `f64`.
    pub fn monotonic_secs(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.anchor_instant).as_secs_f64()
    }

    /// The current monotonic-seconds reading.
    pub fn now_secs(&self) -> f64 {
        self.monotonic_secs(Instant::now())
    }

    /// Converts a monotonic-seconds value (as used throughout the session
    /// runtime) into epoch milliseconds for the wire.
    pub fn monotonic_to_epoch_ms(&self, monotonic_secs: f64) -> i64 {
        self.anchor_epoch_ms + (monotonic_secs * 1000.0).round() as i64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch_ms_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
