//! `digitizer-core`
//!
//! Acquisition engine for oscilloscope-class digitizers.
//!
//! Drives a pluggable [`DigitizerDriver`] in either continuous streaming or
//! rapid-block (triggered capture) mode and delivers samples through a
//! pull-driven [`DigitizerSource::produce`] call.
//!
//! ## Key Types
//!
//! - [`DigitizerSource`]: configuration, arm/disarm lifecycle, production paths
//! - [`DigitizerDriver`]: hardware backend trait
//! - [`AcquisitionSettings`]: validated configuration record (serde)
//! - [`TriggerDetector`]: software edge detection with hysteresis
//! - [`Poller`]: background poll thread with a pending-state lifecycle
//! - [`RateMonitor`]/[`Watchdog`]: delivered sample-rate supervision
//! - [`ErrorBuffer`]: consume-once error telemetry
//!
//! ## Example
//!
//! ```rust,no_run
//! use digitizer_core::{DigitizerDriver, DigitizerSource, OutputBuffers, Produced};
//! # fn example(driver: Box<dyn DigitizerDriver>) -> digitizer_core::Result<()> {
//! let mut source = DigitizerSource::new(driver);
//! source.set_aichan("A", true, 5.0, Default::default(), 0.0)?;
//! source.set_streaming(0.001)?;
//! source.start()?;
//!
//! let mut out = OutputBuffers::new(4, 2, 8192);
//! while let Produced::Items { count, .. } = source.produce(&mut out, 8192)? {
//!     println!("{count} samples, {} tags", out.tags.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod error_buffer;
pub mod filter;
pub mod output;
pub mod poller;
pub mod range;
pub mod rapid_block;
pub mod settings;
pub mod source;
pub mod tags;
pub mod time;
pub mod trigger;
pub mod watchdog;

pub use config::{DigitizerConfig, LogFormat, LoggingConfig};
pub use driver::{AcquisitionContext, BlockReadySignal, DigitizerDriver};
pub use error::{DigitizerError, DriverError, DriverErrorKind, DriverResult, ErrorKind, Result};
pub use error_buffer::{ErrorBuffer, ErrorRecord};
pub use filter::RunningAverageFilter;
pub use output::{OutputBuffers, Produced};
pub use poller::{PollControl, Poller, PollerState};
pub use range::{MetaRange, Range};
pub use rapid_block::{RapidBlockPhase, RapidBlockState};
pub use settings::{
    AcquisitionMode, AcquisitionSettings, AcquisitionSettingsBuilder, ChannelSetting, Coupling,
    DownsamplingMode, PortSetting, TriggerDirection, TriggerSetting,
};
pub use source::{DigitizerSource, StopHandle};
pub use tags::{ChannelStatus, Tag, TagPayload, TagTarget};
pub use trigger::TriggerDetector;
pub use watchdog::{RateMonitor, Watchdog};

pub use digitizer_pool;
