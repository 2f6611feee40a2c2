//! Simulated digitizer for the acquisition engine.
//!
//! [`MockDigitizer`] implements [`digitizer_core::DigitizerDriver`] without
//! hardware, so the engine can be exercised end to end in tests and demos.
//!
//! # Modes
//!
//! - [`MockMode::Instant`]: one chunk per poll, captures ready on arm
//! - [`MockMode::Realistic`]: wall-clock pacing at the configured sample rate
//!   (scaled by `throughput`), capture time honored in rapid-block mode
//! - [`MockMode::Chaos`]: realistic pacing plus random poll failures
//!
//! Scripted failures are attached with [`MockDigitizer::with_errors`]:
//!
//! ```rust,no_run
//! use digitizer_driver_mock::{ErrorConfig, ErrorScenario, MockDigitizer, MockDigitizerConfig};
//!
//! let driver = MockDigitizer::new(MockDigitizerConfig::default()).with_errors(
//!     ErrorConfig::scenario(ErrorScenario::FailAfterN {
//!         operation: "poll",
//!         count: 10,
//!     }),
//! );
//! ```

pub mod common;
mod digitizer;
pub mod waveform;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng, TimingConfig};
pub use digitizer::{MockDigitizer, MockDigitizerConfig, AI_RANGES, DRIVER_TYPE, HARDWARE_VERSION};
