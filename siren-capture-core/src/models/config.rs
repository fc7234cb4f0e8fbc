use std::time::Duration;

use super::device::DeviceSelector;

/// Configuration for a microphone monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Capture device to open.
    pub device: DeviceSelector,

    /// Length of the classification window in seconds (default: 3.0).
    pub window_secs: f64,

    /// Explicit capture sample rate in Hz, or None to follow the device
    /// default (re-queried on every stream open).
    pub sample_rate: Option<u32>,

    /// Confidence at or above which a classification counts as a hit
    /// (default: 0.85).
    pub threshold: f32,

    /// Consecutive hits required before the trigger latches (default: 2).
    pub consecutive_needed: u32,

    /// Requested block size in frames per callback (default: 1024).
    pub block_size: u32,

    /// Supervisor poll tick (default: 20 ms).
    pub poll_interval: Duration,

    /// Heartbeat age after which the stream counts as stalled (default: 1.5 s).
    pub stall_timeout: Duration,

    /// Delay before reopening after a stall (default: 250 ms).
    pub stall_backoff: Duration,

    /// Delay before reopening after an open or runtime failure (default: 500 ms).
    pub error_backoff: Duration,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.window_secs > 0.0) {
            return Err("window length must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold out of range: {}", self.threshold));
        }
        if self.consecutive_needed == 0 {
            return Err("consecutive_needed must be at least 1".into());
        }
        if self.block_size == 0 {
            return Err("block size must be positive".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.sample_rate == Some(0) {
            return Err("sample rate must be positive".into());
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::Default,
            window_secs: 3.0,
            sample_rate: None,
            threshold: 0.85,
            consecutive_needed: 2,
            block_size: 1024,
            poll_interval: Duration::from_millis(20),
            stall_timeout: Duration::from_millis(1500),
            stall_backoff: Duration::from_millis(250),
            error_backoff: Duration::from_millis(500),
        }
    }
}
