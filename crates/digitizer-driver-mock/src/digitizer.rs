//! Simulated oscilloscope-class digitizer.
//!
//! Implements [`DigitizerDriver`] without hardware:
//!
//! - **Streaming**: every `poll()` publishes the chunks that became due into
//!   the chunk pool and reports the raw sample count to the rate monitor.
//!   Instant mode delivers one chunk per poll; paced modes deliver
//!   `elapsed * samp_rate * throughput` raw samples. Chunks that find no free
//!   slot are counted as lost on the next published chunk.
//! - **Rapid block**: `arm()` captures every waveform with a rising zero
//!   crossing at the pre-trigger sample and signals the block-ready condition,
//!   immediately in Instant mode or after the simulated capture time otherwise.
//!
//! # Example
//!
//! ```rust,no_run
//! use digitizer_core::DigitizerSource;
//! use digitizer_driver_mock::{MockDigitizer, MockDigitizerConfig, MockMode};
//!
//! let config = MockDigitizerConfig {
//!     mode: MockMode::Realistic,
//!     ..Default::default()
//! };
//! let source = DigitizerSource::new(Box::new(MockDigitizer::new(config)));
//! ```

use crate::common::{ErrorConfig, MockMode, MockRng, TimingConfig};
use crate::waveform::{self, SignalShape};
use digitizer_core::settings::{MAX_SUPPORTED_AI_CHANNELS, MAX_SUPPORTED_PORTS};
use digitizer_core::{
    time, AcquisitionContext, AcquisitionSettings, DigitizerDriver, DownsamplingMode, DriverError,
    DriverErrorKind, DriverResult, MetaRange, OutputBuffers,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Backend identifier.
pub const DRIVER_TYPE: &str = "mock";

/// Hardware revision reported by [`MockDigitizer`].
pub const HARDWARE_VERSION: &str = "MOCK-4000";

/// Discrete input ranges in volts.
pub const AI_RANGES: [f64; 11] = [0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration of the simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockDigitizerConfig {
    /// Pacing and failure behavior
    pub mode: MockMode,
    /// Physical analog channels (capped at 16)
    pub ai_channels: usize,
    /// Physical digital ports (capped at 8)
    pub ports: usize,
    /// Sine frequency of every channel
    pub signal_frequency_hz: f64,
    /// Sine amplitude as a fraction of the channel range; above 1.0 overflows
    pub amplitude: f64,
    /// Noise amplitude as a fraction of the channel range
    pub noise: f64,
    /// Fraction of the configured sample rate delivered in paced modes
    pub throughput: f64,
    /// Vertical precision as a fraction of the channel range
    pub vertical_precision: f64,
    /// RNG seed for reproducible noise and chaos failures
    pub seed: Option<u64>,
    /// Poll failure probability in chaos mode
    pub chaos_failure_rate: f64,
    /// Simulated device delays
    pub timing: TimingConfig,
}

impl Default for MockDigitizerConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::Instant,
            ai_channels: 4,
            ports: 2,
            signal_frequency_hz: 50.0,
            amplitude: 0.8,
            noise: 0.01,
            throughput: 1.0,
            vertical_precision: 0.001,
            seed: None,
            chaos_failure_rate: 0.01,
            timing: TimingConfig::default(),
        }
    }
}

// =============================================================================
// Captured rapid-block data
// =============================================================================

/// One rapid-block waveform, stored as delivered items.
#[derive(Debug, Clone, Default)]
struct Capture {
    /// Values per enabled channel
    values: Vec<Vec<f32>>,
    /// Error estimates per enabled channel
    errors: Vec<Vec<f32>>,
    /// Samples per enabled port
    ports: Vec<Vec<u8>>,
    /// Status word per enabled channel
    status: Vec<u32>,
}

/// Settings the driver needs at acquisition time, resolved at configure.
#[derive(Debug, Clone)]
struct ActiveConfig {
    samp_rate: f64,
    chunk_size: usize,
    factor: usize,
    downsampling: DownsamplingMode,
    streaming: bool,
    nr_captures: usize,
    pre_samples: usize,
    block_size: usize,
    /// Physical slot and range of each enabled channel
    channels: Vec<(usize, f64)>,
    /// Physical slot of each enabled port
    ports: Vec<usize>,
}

// =============================================================================
// MockDigitizer
// =============================================================================

/// Simulated digitizer driver.
pub struct MockDigitizer {
    config: MockDigitizerConfig,
    errors: ErrorConfig,
    rng: Arc<MockRng>,
    ranges: MetaRange,

    initialized: bool,
    armed: bool,
    context: Option<AcquisitionContext>,
    active: Option<ActiveConfig>,

    // Streaming
    sample_index: u64,
    item_index: u64,
    last_poll: Option<Instant>,
    carry: f64,
    lost: u32,
    raw: Vec<f64>,

    // Rapid block
    captures: Vec<Capture>,
    prefetched: Option<usize>,
    capture_timer: Option<JoinHandle<()>>,
    cancel_capture: Arc<AtomicBool>,
}

impl MockDigitizer {
    /// Create a simulated device.
    #[must_use]
    pub fn new(mut config: MockDigitizerConfig) -> Self {
        config.ai_channels = config.ai_channels.clamp(1, MAX_SUPPORTED_AI_CHANNELS);
        config.ports = config.ports.min(MAX_SUPPORTED_PORTS);
        let rng = Arc::new(MockRng::new(config.seed));
        Self {
            config,
            errors: ErrorConfig::none(),
            rng,
            ranges: MetaRange::from_points(&AI_RANGES),
            initialized: false,
            armed: false,
            context: None,
            active: None,
            sample_index: 0,
            item_index: 0,
            last_poll: None,
            carry: 0.0,
            lost: 0,
            raw: Vec::new(),
            captures: Vec::new(),
            prefetched: None,
            capture_timer: None,
            cancel_capture: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach an error injection configuration.
    #[must_use]
    pub fn with_errors(mut self, errors: ErrorConfig) -> Self {
        self.errors = errors;
        self
    }

    /// Device configuration.
    #[must_use]
    pub fn config(&self) -> &MockDigitizerConfig {
        &self.config
    }

    /// True while armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn fail(kind: DriverErrorKind, message: impl Into<String>) -> DriverError {
        DriverError::new(DRIVER_TYPE, kind, message)
    }

    fn active(&self) -> DriverResult<&ActiveConfig> {
        self.active
            .as_ref()
            .ok_or_else(|| Self::fail(DriverErrorKind::Configuration, "Device not configured"))
    }

    fn shape(&self, range: f64) -> SignalShape {
        SignalShape {
            frequency_hz: self.config.signal_frequency_hz,
            amplitude: range * self.config.amplitude,
            noise: range * self.config.noise,
            phase: 0.0,
        }
    }

    fn cancel_capture_timer(&mut self) {
        self.cancel_capture.store(true, Ordering::SeqCst);
        if let Some(handle) = self.capture_timer.take() {
            if handle.join().is_err() {
                warn!("Capture timer thread panicked");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Streaming
    // -------------------------------------------------------------------------

    /// Chunks that became due since the last poll.
    fn chunks_due(&mut self, active: &ActiveConfig) -> usize {
        if !self.config.mode.is_paced() {
            return 1;
        }
        let now = Instant::now();
        let Some(last) = self.last_poll.replace(now) else {
            return 0;
        };
        let elapsed = now.duration_since(last).as_secs_f64();
        let raw_per_chunk = (active.chunk_size * active.factor) as f64;
        let due = self.carry + elapsed * active.samp_rate * self.config.throughput;
        let chunks = (due / raw_per_chunk).floor();
        self.carry = due - chunks * raw_per_chunk;
        chunks as usize
    }

    /// Generate one chunk of data, publishing it if a free chunk is available.
    fn emit_chunk(&mut self, active: &ActiveConfig, context: &AcquisitionContext) {
        let raw_len = active.chunk_size * active.factor;
        let start = self.sample_index as i64;
        self.sample_index += raw_len as u64;
        let item_start = self.item_index;
        self.item_index += active.chunk_size as u64;

        let Some(mut chunk) = context.pool.get_free_chunk() else {
            self.lost = self.lost.saturating_add(1);
            trace!(lost = self.lost, "No free chunk, dropping data");
            return;
        };

        self.raw.resize(raw_len, 0.0);
        for (k, &(_, range)) in active.channels.iter().enumerate() {
            let shape = self.shape(range);
            shape.fill(active.samp_rate, start, 0, &self.rng, &mut self.raw);
            let base_error = (range * self.config.vertical_precision) as f32;
            let (values, errors) = chunk.channel_mut(k);
            waveform::reduce(active.downsampling, active.factor, &self.raw, base_error, values, errors);
            let status = waveform::channel_status(chunk.values(k), range);
            chunk.status_mut()[k] = status.bits();
        }
        for p in 0..active.ports.len() {
            waveform::port_pattern(item_start, chunk.port_mut(p));
        }

        chunk.local_timestamp_ns = time::now_ns();
        chunk.lost_count = std::mem::take(&mut self.lost);
        context.pool.publish_filled(chunk);
    }

    // -------------------------------------------------------------------------
    // Rapid block
    // -------------------------------------------------------------------------

    fn capture_waveforms(&mut self, active: &ActiveConfig) {
        let mut raw = vec![0.0; active.block_size];
        let items = active.block_size / active.factor;
        let pre = active.pre_samples as i64;

        self.captures = (0..active.nr_captures)
            .map(|w| {
                let mut capture = Capture::default();
                for &(_, range) in &active.channels {
                    self.shape(range)
                        .fill(active.samp_rate, 0, pre, &self.rng, &mut raw);
                    let mut values = vec![0.0; items];
                    let mut errors = vec![0.0; items];
                    let base_error = (range * self.config.vertical_precision) as f32;
                    let n = waveform::reduce(
                        active.downsampling,
                        active.factor,
                        &raw,
                        base_error,
                        &mut values,
                        &mut errors,
                    );
                    values.truncate(n);
                    errors.truncate(n);
                    capture
                        .status
                        .push(waveform::channel_status(&values, range).bits());
                    capture.values.push(values);
                    capture.errors.push(errors);
                }
                for _ in &active.ports {
                    let mut samples = vec![0u8; items];
                    waveform::port_pattern((w * items) as u64, &mut samples);
                    capture.ports.push(samples);
                }
                capture
            })
            .collect();
    }

    fn signal_block_ready(&mut self, active: &ActiveConfig, context: &AcquisitionContext) {
        if !self.config.mode.is_paced() {
            context.block_ready.notify(None);
            return;
        }

        let delay = self
            .config
            .timing
            .capture_time(active.block_size * active.nr_captures, active.samp_rate);
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_capture = Arc::clone(&cancel);
        let signal = Arc::clone(&context.block_ready);
        let spawned = thread::Builder::new()
            .name("mock-capture".into())
            .spawn(move || {
                let deadline = Instant::now() + delay;
                while Instant::now() < deadline {
                    if cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    thread::sleep(Duration::from_millis(1).min(delay));
                }
                if !cancel.load(Ordering::SeqCst) {
                    signal.notify(None);
                }
            });
        match spawned {
            Ok(handle) => self.capture_timer = Some(handle),
            Err(e) => {
                warn!(error = %e, "Capture timer spawn failed, signalling immediately");
                context.block_ready.notify(None);
            }
        }
    }
}

impl std::fmt::Debug for MockDigitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDigitizer")
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .field("armed", &self.armed)
            .field("captures", &self.captures.len())
            .finish()
    }
}

impl Drop for MockDigitizer {
    fn drop(&mut self) {
        self.cancel_capture_timer();
    }
}

impl DigitizerDriver for MockDigitizer {
    fn driver_type(&self) -> &str {
        DRIVER_TYPE
    }

    fn ai_channel_count(&self) -> usize {
        self.config.ai_channels
    }

    fn port_count(&self) -> usize {
        self.config.ports
    }

    fn initialize(&mut self) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, "initialize")?;
        self.initialized = true;
        info!(
            channels = self.config.ai_channels,
            ports = self.config.ports,
            mode = ?self.config.mode,
            "Mock digitizer opened"
        );
        Ok(())
    }

    fn configure(
        &mut self,
        settings: &AcquisitionSettings,
        context: &AcquisitionContext,
    ) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, "configure")?;
        if !self.initialized {
            return Err(Self::fail(DriverErrorKind::Configuration, "Device not open"));
        }
        if settings.channels.len() > self.config.ai_channels || settings.ports.len() > self.config.ports
        {
            return Err(Self::fail(
                DriverErrorKind::InvalidParameter,
                format!(
                    "Layout {}x{} exceeds device {}x{}",
                    settings.channels.len(),
                    settings.ports.len(),
                    self.config.ai_channels,
                    self.config.ports
                ),
            ));
        }

        let channels = settings
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled)
            .map(|(slot, c)| (slot, self.ranges.clip(c.range, true)))
            .collect();
        let ports = settings
            .ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.enabled)
            .map(|(slot, _)| slot)
            .collect();

        let active = ActiveConfig {
            samp_rate: settings.samp_rate,
            chunk_size: settings.buffer_size,
            factor: settings.effective_downsampling_factor() as usize,
            downsampling: settings.downsampling_mode,
            streaming: settings.acquisition.is_streaming(),
            nr_captures: settings.nr_captures() as usize,
            pre_samples: settings.pre_samples as usize,
            block_size: settings.block_size(),
            channels,
            ports,
        };
        debug!(
            samp_rate = active.samp_rate,
            chunk_size = active.chunk_size,
            factor = active.factor,
            streaming = active.streaming,
            "Mock digitizer configured"
        );
        self.active = Some(active);
        self.context = Some(context.clone());
        self.captures.clear();
        self.prefetched = None;
        Ok(())
    }

    fn arm(&mut self) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, "arm")?;
        let active = self.active()?.clone();
        let Some(context) = self.context.clone() else {
            return Err(Self::fail(DriverErrorKind::Configuration, "Device not configured"));
        };
        self.cancel_capture_timer();

        if self.config.mode.is_paced() {
            thread::sleep(self.config.timing.arm_latency());
        }

        if active.streaming {
            self.last_poll = None;
            self.carry = 0.0;
            self.lost = 0;
        } else {
            self.prefetched = None;
            self.capture_waveforms(&active);
            self.signal_block_ready(&active, &context);
        }
        self.armed = true;
        debug!("Mock digitizer armed");
        Ok(())
    }

    fn disarm(&mut self) -> DriverResult<()> {
        self.cancel_capture_timer();
        self.armed = false;
        debug!("Mock digitizer disarmed");
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.cancel_capture_timer();
        self.armed = false;
        self.initialized = false;
        self.context = None;
        self.active = None;
        self.captures.clear();
        info!("Mock digitizer closed");
        Ok(())
    }

    fn poll(&mut self) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, "poll")?;
        if self.config.mode == MockMode::Chaos && self.rng.should_fail(self.config.chaos_failure_rate)
        {
            return Err(Self::fail(DriverErrorKind::Communication, "Chaos: USB transfer failed"));
        }
        if !self.armed {
            return Ok(());
        }
        let Some(active) = self.active.clone().filter(|a| a.streaming) else {
            return Ok(());
        };
        let Some(context) = self.context.clone() else {
            return Ok(());
        };

        let chunks = self.chunks_due(&active);
        for _ in 0..chunks {
            self.emit_chunk(&active, &context);
        }
        if chunks > 0 {
            context
                .rate_monitor
                .record_batch(chunks * active.chunk_size * active.factor);
            trace!(chunks, "Mock poll delivered");
        }
        Ok(())
    }

    fn prefetch_block(&mut self, length: usize, block_number: usize) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, "prefetch")?;
        let active = self.active()?;
        if length != active.block_size {
            return Err(Self::fail(
                DriverErrorKind::InvalidParameter,
                format!("Prefetch length {length} != block size {}", active.block_size),
            ));
        }
        if block_number >= self.captures.len() {
            return Err(Self::fail(
                DriverErrorKind::InvalidParameter,
                format!(
                    "Waveform {block_number} not captured ({} available)",
                    self.captures.len()
                ),
            ));
        }
        self.prefetched = Some(block_number);
        Ok(())
    }

    fn get_rapid_block_data(
        &mut self,
        offset: usize,
        length: usize,
        waveform: usize,
        out: &mut OutputBuffers,
        status: &mut [u32],
    ) -> DriverResult<()> {
        self.errors.check_operation(DRIVER_TYPE, "read")?;
        if self.prefetched != Some(waveform) {
            return Err(Self::fail(
                DriverErrorKind::InvalidParameter,
                format!("Waveform {waveform} was not prefetched"),
            ));
        }
        let active = self.active()?;
        let capture = self.captures.get(waveform).ok_or_else(|| {
            Self::fail(DriverErrorKind::InvalidParameter, format!("No waveform {waveform}"))
        })?;
        let end = offset + length;
        let items = active.block_size / active.factor;
        if end > items {
            return Err(Self::fail(
                DriverErrorKind::InvalidParameter,
                format!("Read {offset}..{end} beyond waveform of {items}"),
            ));
        }
        let too_short = |what: &str| {
            Self::fail(
                DriverErrorKind::InvalidParameter,
                format!("{what} cannot hold {length} items"),
            )
        };

        for (k, &(slot, _)) in active.channels.iter().enumerate() {
            let (Some(values), Some(errors)) = (capture.values.get(k), capture.errors.get(k)) else {
                continue;
            };
            let dst = out
                .values
                .get_mut(slot)
                .filter(|v| v.len() >= length)
                .ok_or_else(|| too_short("value slot"))?;
            dst[..length].copy_from_slice(&values[offset..end]);
            let dst = out
                .errors
                .get_mut(slot)
                .filter(|v| v.len() >= length)
                .ok_or_else(|| too_short("error slot"))?;
            dst[..length].copy_from_slice(&errors[offset..end]);
        }
        for (k, &slot) in active.ports.iter().enumerate() {
            let Some(samples) = capture.ports.get(k) else {
                continue;
            };
            let dst = out
                .ports
                .get_mut(slot)
                .filter(|v| v.len() >= length)
                .ok_or_else(|| too_short("port slot"))?;
            dst[..length].copy_from_slice(&samples[offset..end]);
        }
        for (dst, src) in status.iter_mut().zip(&capture.status) {
            *dst = *src;
        }
        Ok(())
    }

    fn driver_version(&self) -> String {
        format!("mock-digitizer {}", env!("CARGO_PKG_VERSION"))
    }

    fn hardware_version(&self) -> String {
        HARDWARE_VERSION.to_string()
    }

    fn aichan_ranges(&self) -> MetaRange {
        self.ranges.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digitizer_core::{AcquisitionSettings, ErrorKind};

    fn streaming_settings() -> AcquisitionSettings {
        let mut settings = AcquisitionSettings::new(4, 2);
        settings.set_samp_rate(100_000.0).unwrap();
        settings.set_buffer_size(100).unwrap();
        settings.set_nr_buffers(4).unwrap();
        settings.set_aichan("A", true, 1.0, Default::default(), 0.0).unwrap();
        settings.set_diport("port0", true, 1.5).unwrap();
        settings
    }

    fn configured(settings: &AcquisitionSettings, config: MockDigitizerConfig) -> (MockDigitizer, AcquisitionContext) {
        let mut mock = MockDigitizer::new(config);
        let context = AcquisitionContext::new(settings.watchdog_window);
        context.pool.initialize(
            digitizer_core::digitizer_pool::ChunkGeometry::new(
                settings.enabled_channel_count(),
                settings.enabled_port_count(),
                settings.buffer_size,
            ),
            settings.nr_buffers,
        );
        mock.initialize().unwrap();
        mock.configure(settings, &context).unwrap();
        (mock, context)
    }

    #[test]
    fn test_layout_clamped() {
        let mock = MockDigitizer::new(MockDigitizerConfig {
            ai_channels: 40,
            ports: 0,
            ..Default::default()
        });
        assert_eq!(mock.ai_channel_count(), MAX_SUPPORTED_AI_CHANNELS);
        assert_eq!(mock.port_count(), 0);
    }

    #[test]
    fn test_configure_requires_open() {
        let mut mock = MockDigitizer::new(MockDigitizerConfig::default());
        let settings = streaming_settings();
        let context = AcquisitionContext::new(10);
        let err = mock.configure(&settings, &context).unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Configuration);
    }

    #[test]
    fn test_instant_poll_publishes_one_chunk() {
        let settings = streaming_settings();
        let (mut mock, context) = configured(&settings, MockDigitizerConfig::default());

        mock.poll().unwrap();
        assert_eq!(context.pool.filled_len(), 0, "disarmed poll delivers nothing");

        mock.arm().unwrap();
        mock.poll().unwrap();
        mock.poll().unwrap();
        assert_eq!(context.pool.filled_len(), 2);
    }

    #[test]
    fn test_exhausted_pool_counts_lost_chunks() {
        let settings = streaming_settings();
        let (mut mock, context) = configured(&settings, MockDigitizerConfig::default());
        mock.arm().unwrap();
        for _ in 0..6 {
            mock.poll().unwrap();
        }
        assert_eq!(context.pool.filled_len(), 4);
        assert_eq!(mock.lost, 2);
    }

    #[test]
    fn test_rapid_block_capture_signals_ready() {
        let mut settings = streaming_settings();
        settings.set_samples(100, 300).unwrap();
        settings.set_rapid_block(2).unwrap();
        let quiet = MockDigitizerConfig {
            noise: 0.0,
            ..Default::default()
        };
        let (mut mock, context) = configured(&settings, quiet);

        mock.arm().unwrap();
        assert!(context.block_ready.is_ready());
        assert_eq!(mock.captures.len(), 2);

        assert!(mock.prefetch_block(400, 2).is_err());
        mock.prefetch_block(400, 1).unwrap();

        let mut out = OutputBuffers::new(4, 2, 400);
        let mut status = vec![0u32; 1];
        mock.get_rapid_block_data(0, 400, 1, &mut out, &mut status)
            .unwrap();
        assert!(out.values[0][99] < 0.0);
        assert!(out.values[0][101] > 0.0);
        assert_eq!(status[0], 0);
        assert_eq!(out.ports[0][1], out.ports[0][0].wrapping_add(1));
    }

    #[test]
    fn test_read_requires_prefetch() {
        let mut settings = streaming_settings();
        settings.set_samples(10, 10).unwrap();
        settings.set_rapid_block(1).unwrap();
        let (mut mock, _context) = configured(&settings, MockDigitizerConfig::default());
        mock.arm().unwrap();

        let mut out = OutputBuffers::new(4, 2, 20);
        let mut status = vec![0u32; 1];
        let err = mock
            .get_rapid_block_data(0, 20, 0, &mut out, &mut status)
            .unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::InvalidParameter);
    }

    #[test]
    fn test_overflow_when_amplitude_exceeds_range() {
        let settings = streaming_settings();
        let (mut mock, context) = configured(
            &settings,
            MockDigitizerConfig {
                amplitude: 1.5,
                signal_frequency_hz: 5_000.0,
                ..Default::default()
            },
        );
        mock.arm().unwrap();
        mock.poll().unwrap();

        let mut values = vec![0.0f32; 100];
        let mut errors = vec![0.0f32; 100];
        let mut ports = vec![0u8; 100];
        let mut status = Vec::new();
        context
            .pool
            .take_filled(
                &mut [values.as_mut_slice()],
                &mut [errors.as_mut_slice()],
                &mut [ports.as_mut_slice()],
                &mut status,
            )
            .unwrap();
        assert_eq!(status, vec![digitizer_core::ChannelStatus::OVERFLOW.bits()]);
        assert!((errors[0] - 0.001).abs() < 1e-6);
    }

    #[test]
    fn test_chaos_poll_failure() {
        let settings = streaming_settings();
        let (mut mock, _context) = configured(
            &settings,
            MockDigitizerConfig {
                mode: MockMode::Chaos,
                chaos_failure_rate: 1.0,
                ..Default::default()
            },
        );
        let err = mock.poll().unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Communication);
        assert_eq!(ErrorKind::from(err).category(), DRIVER_TYPE);
    }

    #[test]
    fn test_ranges_and_versions() {
        let mock = MockDigitizer::new(MockDigitizerConfig::default());
        assert_eq!(mock.aichan_ranges().clip(3.0, true), 2.0);
        assert_eq!(mock.hardware_version(), HARDWARE_VERSION);
        assert!(mock.driver_version().starts_with("mock-digitizer"));
    }
}
