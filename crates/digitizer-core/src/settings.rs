//! Acquisition configuration records and their validation.
//!
//! [`AcquisitionSettings`] is the single source of truth for a digitizer
//! configuration: sample counts and rate, pool sizing, acquisition mode,
//! downsampling, and the per-channel, per-port and trigger records. Setters
//! validate at call time and return [`DigitizerError::InvalidParameter`]
//! instead of panicking; [`AcquisitionSettings::validate`] re-checks a whole
//! document, e.g. one deserialized from TOML.
//!
//! Analog channels are addressed by letter (`"A"`..`"P"`), digital ports by
//! `"port<d>"`. Records are indexed by physical slot.

use crate::error::{DigitizerError, Result};
use serde::{Deserialize, Serialize};

/// Most analog channels an instrument may expose.
pub const MAX_SUPPORTED_AI_CHANNELS: usize = 16;
/// Most digital ports an instrument may expose.
pub const MAX_SUPPORTED_PORTS: usize = 8;

/// Trigger source meaning "triggering disabled".
pub const TRIGGER_NONE_SOURCE: &str = "NONE";
/// Trigger source selecting the digital inputs.
pub const TRIGGER_DIGITAL_SOURCE: &str = "DI";
/// Dedicated external trigger input available on some instruments.
pub const TRIGGER_AUX_SOURCE: &str = "AUX";

/// Default sliding window of the watchdog rate estimate.
pub const DEFAULT_WATCHDOG_WINDOW: usize = 100_000;

// =============================================================================
// Enumerations
// =============================================================================

/// Analog input coupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Coupling {
    /// DC, 1 MOhm
    #[serde(rename = "DC_1M")]
    Dc1M,
    /// AC, 1 MOhm
    #[default]
    #[serde(rename = "AC_1M")]
    Ac1M,
    /// DC, 50 Ohm
    #[serde(rename = "DC_50R")]
    Dc50R,
}

/// Edge or level a trigger reacts to.
///
/// `High` behaves as `Rising` and `Low` as `Falling` for software detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDirection {
    /// Low-to-high transition
    #[default]
    Rising,
    /// High-to-low transition
    Falling,
    /// Signal low
    Low,
    /// Signal high
    High,
}

impl TriggerDirection {
    /// True for `Rising` and `High`.
    #[must_use]
    pub fn is_rising(self) -> bool {
        matches!(self, TriggerDirection::Rising | TriggerDirection::High)
    }
}

/// Hardware downsampling applied before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownsamplingMode {
    /// No downsampling
    #[default]
    None,
    /// Min/max aggregation; value is the midpoint, error a quarter of the span
    MinMaxAgg,
    /// Keep every n-th sample
    Decimate,
    /// Average n samples
    Average,
}

/// How samples are acquired and delivered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// Continuous acquisition, chunk-by-chunk delivery through the pool.
    Streaming {
        /// Poller period in seconds
        poll_rate: f64,
    },
    /// Discrete triggered captures read straight from the driver.
    RapidBlock {
        /// Waveforms per arm
        nr_captures: u32,
    },
}

impl Default for AcquisitionMode {
    fn default() -> Self {
        AcquisitionMode::Streaming { poll_rate: 0.001 }
    }
}

impl AcquisitionMode {
    /// True in streaming mode.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, AcquisitionMode::Streaming { .. })
    }
}

// =============================================================================
// Records
// =============================================================================

/// Settings of one analog channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSetting {
    /// Full-scale range in volts
    pub range: f64,
    /// Analog offset in volts
    pub offset: f64,
    /// Whether the channel is acquired
    pub enabled: bool,
    /// Input coupling
    pub coupling: Coupling,
}

impl Default for ChannelSetting {
    fn default() -> Self {
        Self {
            range: 2.0,
            offset: 0.0,
            enabled: false,
            coupling: Coupling::Ac1M,
        }
    }
}

/// Settings of one digital port slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSetting {
    /// Logic threshold in volts
    pub logic_level: f64,
    /// Whether the port is acquired
    pub enabled: bool,
}

impl Default for PortSetting {
    fn default() -> Self {
        Self {
            logic_level: 1.5,
            enabled: false,
        }
    }
}

/// Global trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSetting {
    /// `"NONE"`, `"DI"`, `"AUX"` or an analog channel id
    pub source: String,
    /// Analog threshold in volts
    pub threshold: f64,
    /// Edge direction
    pub direction: TriggerDirection,
    /// Digital pin (port = pin / 8, bit = pin % 8)
    pub pin_number: u32,
}

impl Default for TriggerSetting {
    fn default() -> Self {
        Self {
            source: TRIGGER_NONE_SOURCE.to_string(),
            threshold: 0.0,
            direction: TriggerDirection::Rising,
            pin_number: 0,
        }
    }
}

impl TriggerSetting {
    /// False when the source is `"NONE"`.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.source != TRIGGER_NONE_SOURCE
    }

    /// True for the digital source.
    #[must_use]
    pub fn is_digital(&self) -> bool {
        self.is_enabled() && self.source == TRIGGER_DIGITAL_SOURCE
    }

    /// True for any analog source, including `"AUX"`.
    #[must_use]
    pub fn is_analog(&self) -> bool {
        self.is_enabled() && self.source != TRIGGER_DIGITAL_SOURCE
    }

    /// True for the external trigger input.
    #[must_use]
    pub fn is_aux(&self) -> bool {
        self.source == TRIGGER_AUX_SOURCE
    }

    /// Physical port and bit mask of the digital trigger pin.
    #[must_use]
    pub fn digital_port_and_mask(&self) -> (usize, u8) {
        let port = (self.pin_number / 8) as usize;
        let mask = 1u8 << (self.pin_number % 8);
        (port, mask)
    }
}

// =============================================================================
// AcquisitionSettings
// =============================================================================

/// Complete digitizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Requested sample rate in Hz
    pub samp_rate: f64,
    /// Samples before the trigger point
    pub pre_samples: u32,
    /// Samples after the trigger point
    pub post_samples: u32,
    /// Samples per pool chunk (streaming) and per delivered block
    pub buffer_size: usize,
    /// Pool chunk count
    pub nr_buffers: usize,
    /// Driver-side buffer in samples
    pub driver_buffer_size: usize,
    /// Streaming or rapid block
    pub acquisition: AcquisitionMode,
    /// Downsampling mode
    pub downsampling_mode: DownsamplingMode,
    /// Downsampling factor, 1 when mode is `None`
    pub downsampling_factor: u32,
    /// Re-arm automatically (rapid block) and arm on start (streaming)
    pub auto_arm: bool,
    /// Stop after the first rapid-block capture
    pub trigger_once: bool,
    /// Window of the watchdog running average, in rate estimates
    pub watchdog_window: usize,
    /// One record per analog channel slot
    pub channels: Vec<ChannelSetting>,
    /// One record per digital port slot
    pub ports: Vec<PortSetting>,
    /// Trigger configuration
    pub trigger: TriggerSetting,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            samp_rate: 10_000.0,
            pre_samples: 1000,
            post_samples: 9000,
            buffer_size: 8192,
            nr_buffers: 100,
            driver_buffer_size: 100_000,
            acquisition: AcquisitionMode::default(),
            downsampling_mode: DownsamplingMode::None,
            downsampling_factor: 1,
            auto_arm: true,
            trigger_once: false,
            watchdog_window: DEFAULT_WATCHDOG_WINDOW,
            channels: Vec::new(),
            ports: Vec::new(),
            trigger: TriggerSetting::default(),
        }
    }
}

impl AcquisitionSettings {
    /// Defaults for an instrument with the given physical channel and port counts.
    #[must_use]
    pub fn new(ai_channels: usize, ports: usize) -> Self {
        Self::default().with_layout(ai_channels, ports)
    }

    /// Resize channel/port records to the physical layout, keeping existing entries.
    ///
    /// Counts beyond [`MAX_SUPPORTED_AI_CHANNELS`] / [`MAX_SUPPORTED_PORTS`]
    /// are clamped; those slots have no id to address them by.
    #[must_use]
    pub fn with_layout(mut self, ai_channels: usize, ports: usize) -> Self {
        self.channels.resize(
            ai_channels.min(MAX_SUPPORTED_AI_CHANNELS),
            ChannelSetting::default(),
        );
        self.ports
            .resize(ports.min(MAX_SUPPORTED_PORTS), PortSetting::default());
        self
    }

    /// Create a builder for an instrument with the given layout.
    #[must_use]
    pub fn builder(ai_channels: usize, ports: usize) -> AcquisitionSettingsBuilder {
        AcquisitionSettingsBuilder {
            settings: Self::new(ai_channels, ports),
            deferred: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Validated setters
    // -------------------------------------------------------------------------

    /// Set pre/post-trigger sample counts. Also sets `buffer_size` to their sum.
    pub fn set_samples(&mut self, pre_samples: u32, post_samples: u32) -> Result<()> {
        if post_samples < 1 {
            return Err(DigitizerError::invalid(
                "post-trigger samples can't be less than one",
            ));
        }
        self.pre_samples = pre_samples;
        self.post_samples = post_samples;
        self.buffer_size = pre_samples as usize + post_samples as usize;
        Ok(())
    }

    /// Set the sample rate in Hz.
    pub fn set_samp_rate(&mut self, rate: f64) -> Result<()> {
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(DigitizerError::invalid(format!(
                "sample rate has to be greater than zero: {rate}"
            )));
        }
        self.samp_rate = rate;
        Ok(())
    }

    /// Set samples per chunk.
    pub fn set_buffer_size(&mut self, buffer_size: usize) -> Result<()> {
        self.buffer_size = buffer_size;
        Ok(())
    }

    /// Set the pool chunk count.
    pub fn set_nr_buffers(&mut self, nr_buffers: usize) -> Result<()> {
        if nr_buffers < 1 {
            return Err(DigitizerError::invalid(format!(
                "number of buffers must be at least one: {nr_buffers}"
            )));
        }
        self.nr_buffers = nr_buffers;
        Ok(())
    }

    /// Set the driver-side buffer size.
    pub fn set_driver_buffer_size(&mut self, driver_buffer_size: usize) -> Result<()> {
        if driver_buffer_size < 1 {
            return Err(DigitizerError::invalid(format!(
                "driver buffer size must be at least one: {driver_buffer_size}"
            )));
        }
        self.driver_buffer_size = driver_buffer_size;
        Ok(())
    }

    /// Select streaming mode with a poll period in seconds.
    pub fn set_streaming(&mut self, poll_rate: f64) -> Result<()> {
        if !(poll_rate >= 0.0) || !poll_rate.is_finite() {
            return Err(DigitizerError::invalid(format!(
                "poll rate can't be negative: {poll_rate}"
            )));
        }
        self.acquisition = AcquisitionMode::Streaming { poll_rate };
        Ok(())
    }

    /// Select rapid-block mode with `nr_captures` waveforms per arm.
    pub fn set_rapid_block(&mut self, nr_captures: u32) -> Result<()> {
        if nr_captures < 1 {
            return Err(DigitizerError::invalid(format!(
                "nr waveforms should be at least one: {nr_captures}"
            )));
        }
        self.acquisition = AcquisitionMode::RapidBlock { nr_captures };
        Ok(())
    }

    /// Set downsampling. The factor is forced to 1 for [`DownsamplingMode::None`].
    pub fn set_downsampling(&mut self, mode: DownsamplingMode, factor: u32) -> Result<()> {
        let factor = if mode == DownsamplingMode::None {
            1
        } else if factor < 2 {
            return Err(DigitizerError::invalid(format!(
                "downsampling factor should be at least 2: {factor}"
            )));
        } else {
            factor
        };
        self.downsampling_mode = mode;
        self.downsampling_factor = factor;
        Ok(())
    }

    /// Re-arm automatically between rapid-block captures.
    pub fn set_auto_arm(&mut self, auto_arm: bool) {
        self.auto_arm = auto_arm;
    }

    /// End production after the first rapid-block capture.
    pub fn set_trigger_once(&mut self, once: bool) {
        self.trigger_once = once;
    }

    /// Configure one analog channel.
    pub fn set_aichan(
        &mut self,
        id: &str,
        enabled: bool,
        range: f64,
        coupling: Coupling,
        offset: f64,
    ) -> Result<()> {
        let idx = self.channel_index(id)?;
        check_range(range)?;
        self.channels[idx] = ChannelSetting {
            range,
            offset,
            enabled,
            coupling,
        };
        Ok(())
    }

    /// Change range and offset of one analog channel.
    pub fn set_aichan_range(&mut self, id: &str, range: f64, offset: f64) -> Result<()> {
        let idx = self.channel_index(id)?;
        check_range(range)?;
        self.channels[idx].range = range;
        self.channels[idx].offset = offset;
        Ok(())
    }

    /// Trigger on an analog channel (or `"AUX"`).
    pub fn set_aichan_trigger(
        &mut self,
        id: &str,
        direction: TriggerDirection,
        threshold: f64,
    ) -> Result<()> {
        let source = if id.eq_ignore_ascii_case(TRIGGER_AUX_SOURCE) {
            TRIGGER_AUX_SOURCE.to_string()
        } else {
            self.channel_index(id)?;
            id.to_ascii_uppercase()
        };
        self.trigger = TriggerSetting {
            source,
            threshold,
            direction,
            pin_number: 0,
        };
        Ok(())
    }

    /// Configure one digital port.
    pub fn set_diport(&mut self, id: &str, enabled: bool, logic_level: f64) -> Result<()> {
        let idx = self.port_index(id)?;
        self.ports[idx] = PortSetting {
            logic_level,
            enabled,
        };
        Ok(())
    }

    /// Trigger on a digital pin.
    pub fn set_di_trigger(&mut self, pin: u32, direction: TriggerDirection) -> Result<()> {
        if (pin / 8) as usize >= self.ports.len() {
            return Err(DigitizerError::invalid(format!(
                "digital trigger pin {pin} out of range for {} ports",
                self.ports.len()
            )));
        }
        self.trigger = TriggerSetting {
            source: TRIGGER_DIGITAL_SOURCE.to_string(),
            threshold: 0.0,
            direction,
            pin_number: pin,
        };
        Ok(())
    }

    /// Disable triggering.
    pub fn disable_triggers(&mut self) {
        self.trigger.source = TRIGGER_NONE_SOURCE.to_string();
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Physical index of an analog channel id (`"A"`..`"P"`, case-insensitive).
    pub fn channel_index(&self, id: &str) -> Result<usize> {
        let invalid = || DigitizerError::InvalidChannelId { id: id.to_string() };
        let mut chars = id.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(invalid());
        };
        if !c.is_ascii_alphabetic() {
            return Err(invalid());
        }
        let idx = (c.to_ascii_uppercase() as u8 - b'A') as usize;
        if idx >= MAX_SUPPORTED_AI_CHANNELS || idx >= self.channels.len() {
            return Err(invalid());
        }
        Ok(idx)
    }

    /// Physical index of a port id (`"port0"`..`"port7"`).
    pub fn port_index(&self, id: &str) -> Result<usize> {
        let invalid = || DigitizerError::InvalidPortId { id: id.to_string() };
        let digit = id
            .strip_prefix("port")
            .filter(|rest| rest.len() == 1)
            .and_then(|rest| rest.parse::<usize>().ok())
            .ok_or_else(invalid)?;
        if digit >= MAX_SUPPORTED_PORTS || digit >= self.ports.len() {
            return Err(invalid());
        }
        Ok(digit)
    }

    /// Ids of all analog channel slots.
    #[must_use]
    pub fn channel_ids(&self) -> Vec<String> {
        (b'A'..)
            .take(self.channels.len().min(MAX_SUPPORTED_AI_CHANNELS))
            .map(|c| char::from(c).to_string())
            .collect()
    }

    /// Number of enabled analog channels.
    #[must_use]
    pub fn enabled_channel_count(&self) -> usize {
        self.channels.iter().filter(|c| c.enabled).count()
    }

    /// Number of enabled digital ports.
    #[must_use]
    pub fn enabled_port_count(&self) -> usize {
        self.ports.iter().filter(|p| p.enabled).count()
    }

    // -------------------------------------------------------------------------
    // Derived quantities
    // -------------------------------------------------------------------------

    /// True when a downsampling mode is active.
    #[must_use]
    pub fn is_downsampling(&self) -> bool {
        self.downsampling_mode != DownsamplingMode::None
    }

    /// Downsampling factor in effect (1 when disabled).
    #[must_use]
    pub fn effective_downsampling_factor(&self) -> u32 {
        if self.is_downsampling() {
            self.downsampling_factor
        } else {
            1
        }
    }

    /// Pre-trigger samples as delivered.
    #[must_use]
    pub fn pre_samples_with_downsampling(&self) -> u32 {
        self.pre_samples / self.effective_downsampling_factor()
    }

    /// Post-trigger samples as delivered.
    #[must_use]
    pub fn post_samples_with_downsampling(&self) -> u32 {
        self.post_samples / self.effective_downsampling_factor()
    }

    /// Raw samples per rapid-block waveform.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.pre_samples as usize + self.post_samples as usize
    }

    /// Delivered samples per rapid-block waveform.
    #[must_use]
    pub fn block_size_with_downsampling(&self) -> usize {
        self.pre_samples_with_downsampling() as usize + self.post_samples_with_downsampling() as usize
    }

    /// Seconds between delivered samples.
    #[must_use]
    pub fn timebase(&self) -> f64 {
        f64::from(self.effective_downsampling_factor()) / self.samp_rate
    }

    /// Nanoseconds between raw device samples.
    #[must_use]
    pub fn time_per_sample_ns(&self) -> f64 {
        1e9 / self.samp_rate
    }

    /// Rapid-block waveforms per arm (1 in streaming mode).
    #[must_use]
    pub fn nr_captures(&self) -> u32 {
        match self.acquisition {
            AcquisitionMode::RapidBlock { nr_captures } => nr_captures,
            AcquisitionMode::Streaming { .. } => 1,
        }
    }

    // -------------------------------------------------------------------------
    // Whole-document validation
    // -------------------------------------------------------------------------

    /// Check every knob and cross-field constraint.
    pub fn validate(&self) -> Result<()> {
        if self.channels.len() > MAX_SUPPORTED_AI_CHANNELS {
            return Err(DigitizerError::invalid(format!(
                "at most {MAX_SUPPORTED_AI_CHANNELS} analog channels supported, got {}",
                self.channels.len()
            )));
        }
        if self.ports.len() > MAX_SUPPORTED_PORTS {
            return Err(DigitizerError::invalid(format!(
                "at most {MAX_SUPPORTED_PORTS} ports supported, got {}",
                self.ports.len()
            )));
        }

        // Re-run the scalar setters on a scratch copy.
        let mut scratch = self.clone();
        scratch.set_samp_rate(self.samp_rate)?;
        if self.post_samples < 1 {
            return Err(DigitizerError::invalid(
                "post-trigger samples can't be less than one",
            ));
        }
        scratch.set_nr_buffers(self.nr_buffers)?;
        scratch.set_driver_buffer_size(self.driver_buffer_size)?;
        match self.acquisition {
            AcquisitionMode::Streaming { poll_rate } => {
                scratch.set_streaming(poll_rate)?;
                if self.buffer_size == 0 {
                    return Err(DigitizerError::invalid(
                        "streaming requires a buffer size of at least one sample",
                    ));
                }
            }
            AcquisitionMode::RapidBlock { nr_captures } => scratch.set_rapid_block(nr_captures)?,
        }
        if self.is_downsampling() && self.downsampling_factor < 2 {
            return Err(DigitizerError::invalid(format!(
                "downsampling factor should be at least 2: {}",
                self.downsampling_factor
            )));
        }
        for channel in &self.channels {
            check_range(channel.range)?;
        }

        if self.trigger.is_digital() {
            let (port, _) = self.trigger.digital_port_and_mask();
            if !self.ports.get(port).is_some_and(|p| p.enabled) {
                return Err(DigitizerError::invalid(format!(
                    "digital trigger pin {} requires port{port} to be enabled",
                    self.trigger.pin_number
                )));
            }
        } else if self.trigger.is_analog() && !self.trigger.is_aux() {
            let idx = self.channel_index(&self.trigger.source)?;
            if !self.channels[idx].enabled {
                return Err(DigitizerError::invalid(format!(
                    "trigger channel {} is not enabled",
                    self.trigger.source
                )));
            }
        }

        Ok(())
    }
}

fn check_range(range: f64) -> Result<()> {
    if !(range > 0.0) || !range.is_finite() {
        return Err(DigitizerError::invalid(format!(
            "channel range must be positive: {range}"
        )));
    }
    Ok(())
}

// =============================================================================
// Builder
// =============================================================================

/// Chained construction of [`AcquisitionSettings`]; validated by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct AcquisitionSettingsBuilder {
    settings: AcquisitionSettings,
    deferred: Vec<Deferred>,
}

#[derive(Debug, Clone)]
enum Deferred {
    Channel(String, ChannelSetting),
    Port(String, PortSetting),
    AnalogTrigger(String, TriggerDirection, f64),
    DigitalTrigger(u32, TriggerDirection),
}

impl AcquisitionSettingsBuilder {
    /// Sample rate in Hz.
    #[must_use]
    pub fn samp_rate(mut self, rate: f64) -> Self {
        self.settings.samp_rate = rate;
        self
    }

    /// Pre/post-trigger samples; also sets the buffer size to their sum.
    #[must_use]
    pub fn samples(mut self, pre_samples: u32, post_samples: u32) -> Self {
        self.settings.pre_samples = pre_samples;
        self.settings.post_samples = post_samples;
        self.settings.buffer_size = pre_samples as usize + post_samples as usize;
        self
    }

    /// Samples per chunk.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.settings.buffer_size = buffer_size;
        self
    }

    /// Pool chunk count.
    #[must_use]
    pub fn nr_buffers(mut self, nr_buffers: usize) -> Self {
        self.settings.nr_buffers = nr_buffers;
        self
    }

    /// Driver-side buffer size.
    #[must_use]
    pub fn driver_buffer_size(mut self, size: usize) -> Self {
        self.settings.driver_buffer_size = size;
        self
    }

    /// Streaming with the given poll period in seconds.
    #[must_use]
    pub fn streaming(mut self, poll_rate: f64) -> Self {
        self.settings.acquisition = AcquisitionMode::Streaming { poll_rate };
        self
    }

    /// Rapid block with `nr_captures` waveforms.
    #[must_use]
    pub fn rapid_block(mut self, nr_captures: u32) -> Self {
        self.settings.acquisition = AcquisitionMode::RapidBlock { nr_captures };
        self
    }

    /// Downsampling mode and factor.
    #[must_use]
    pub fn downsampling(mut self, mode: DownsamplingMode, factor: u32) -> Self {
        self.settings.downsampling_mode = mode;
        self.settings.downsampling_factor = if mode == DownsamplingMode::None { 1 } else { factor };
        self
    }

    /// Auto-arm flag.
    #[must_use]
    pub fn auto_arm(mut self, auto_arm: bool) -> Self {
        self.settings.auto_arm = auto_arm;
        self
    }

    /// Trigger-once flag.
    #[must_use]
    pub fn trigger_once(mut self, once: bool) -> Self {
        self.settings.trigger_once = once;
        self
    }

    /// Watchdog averaging window.
    #[must_use]
    pub fn watchdog_window(mut self, window: usize) -> Self {
        self.settings.watchdog_window = window;
        self
    }

    /// Enable an analog channel with the given range.
    #[must_use]
    pub fn channel(mut self, id: &str, range: f64) -> Self {
        let setting = ChannelSetting {
            range,
            enabled: true,
            ..ChannelSetting::default()
        };
        self.deferred.push(Deferred::Channel(id.to_string(), setting));
        self
    }

    /// Enable a digital port.
    #[must_use]
    pub fn port(mut self, id: &str, logic_level: f64) -> Self {
        let setting = PortSetting {
            logic_level,
            enabled: true,
        };
        self.deferred.push(Deferred::Port(id.to_string(), setting));
        self
    }

    /// Analog trigger.
    #[must_use]
    pub fn analog_trigger(mut self, id: &str, direction: TriggerDirection, threshold: f64) -> Self {
        self.deferred
            .push(Deferred::AnalogTrigger(id.to_string(), direction, threshold));
        self
    }

    /// Digital trigger.
    #[must_use]
    pub fn digital_trigger(mut self, pin: u32, direction: TriggerDirection) -> Self {
        self.deferred.push(Deferred::DigitalTrigger(pin, direction));
        self
    }

    /// Resolve ids and validate.
    pub fn build(self) -> Result<AcquisitionSettings> {
        let mut settings = self.settings;
        for item in self.deferred {
            match item {
                Deferred::Channel(id, c) => {
                    settings.set_aichan(&id, c.enabled, c.range, c.coupling, c.offset)?;
                }
                Deferred::Port(id, p) => settings.set_diport(&id, p.enabled, p.logic_level)?,
                Deferred::AnalogTrigger(id, direction, threshold) => {
                    settings.set_aichan_trigger(&id, direction, threshold)?;
                }
                Deferred::DigitalTrigger(pin, direction) => {
                    settings.set_di_trigger(pin, direction)?;
                }
            }
        }
        settings.validate()?;
        Ok(settings)
    }
}
