//! Bounded sliding-window statistics used by the heartbeat/skew tracker.

mod averager;
mod median;

pub use averager::LatencyAverager;
pub use median::RunningMedian;

/// Window size shared by the latency averager and the skew running median.
pub const WINDOW_SIZE: usize = 30;
