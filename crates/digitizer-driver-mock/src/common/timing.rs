//! Timing configuration for paced modes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hardware-like delays of a digitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Time `arm()` takes, in milliseconds
    pub arm_latency_ms: u64,
    /// Extra time after the last capture before the block is ready, in milliseconds
    pub capture_overhead_ms: u64,
}

impl TimingConfig {
    /// Timing of a USB oscilloscope
    #[must_use]
    pub fn usb_scope() -> Self {
        Self {
            arm_latency_ms: 5,
            capture_overhead_ms: 2,
        }
    }

    /// Arm latency as a `Duration`.
    #[must_use]
    pub fn arm_latency(&self) -> Duration {
        Duration::from_millis(self.arm_latency_ms)
    }

    /// Time from arm until `nr_samples` raw samples at `samp_rate` are captured.
    #[must_use]
    pub fn capture_time(&self, nr_samples: usize, samp_rate: f64) -> Duration {
        let acquisition = Duration::from_secs_f64((nr_samples as f64 / samp_rate).max(0.0));
        acquisition + Duration::from_millis(self.capture_overhead_ms)
    }
}
