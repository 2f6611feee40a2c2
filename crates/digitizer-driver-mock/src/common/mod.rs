//! Common infrastructure for the simulated digitizer.
//!
//! - **mode**: Operational modes (Instant, Realistic, Chaos)
//! - **timing**: Arm latency and capture overhead for realistic mode
//! - **errors**: Error injection framework
//! - **rng**: Seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use errors::{ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
