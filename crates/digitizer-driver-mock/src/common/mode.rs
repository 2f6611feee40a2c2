//! Operational modes for the simulated digitizer.
//!
//! - **Instant**: one chunk per poll, captures ready as soon as armed
//! - **Realistic**: data paced by wall-clock time at the configured rate
//! - **Chaos**: realistic pacing plus random poll failures

use serde::{Deserialize, Serialize};

/// Operational mode of the mock digitizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Wall-clock paced delivery - for integration tests
    Realistic,
    /// Wall-clock pacing with injected failures - for resilience testing
    Chaos,
}

impl MockMode {
    /// True when delivery follows elapsed wall-clock time.
    #[must_use]
    pub fn is_paced(self) -> bool {
        !matches!(self, MockMode::Instant)
    }
}
