//! Acquisition orchestrator.
//!
//! [`DigitizerSource`] owns the configuration, drives the driver lifecycle and
//! turns acquired data into output blocks through two pull-driven paths:
//!
//! - **Streaming**: the poller thread calls `driver.poll()`, the driver fills
//!   pool chunks, and each `produce()` call copies exactly one chunk out,
//!   runs software trigger detection and attaches acquisition tags.
//! - **Rapid block**: each `produce()` call advances a [`RapidBlockState`],
//!   reading captures straight from the driver across as many calls as the
//!   caller's output capacity requires.
//!
//! Lifecycle: `initialize` → `configure` → `arm` ⇄ `disarm` → `close`.
//! Configuration setters are rejected while armed. Changes take effect at the
//! next `configure`; acquisition always runs on the configured snapshot.

use crate::driver::{AcquisitionContext, DigitizerDriver};
use crate::error::{DigitizerError, ErrorKind, Result};
use crate::error_buffer::{ErrorBuffer, ErrorRecord};
use crate::output::{OutputBuffers, Produced};
use crate::poller::{PollControl, Poller};
use crate::range::MetaRange;
use crate::rapid_block::{RapidBlockPhase, RapidBlockState};
use crate::settings::{
    AcquisitionMode, AcquisitionSettings, Coupling, DownsamplingMode, TriggerDirection,
};
use crate::tags::{Tag, TagPayload, TagTarget};
use crate::time;
use crate::trigger::TriggerDetector;
use crate::watchdog::Watchdog;
use digitizer_pool::{ChunkGeometry, PoolError, PoolMetrics};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

type SharedDriver = Arc<Mutex<Box<dyn DigitizerDriver>>>;

/// Where software trigger detection looks, resolved at configure time.
#[derive(Debug, Clone, Copy)]
enum TriggerProbe {
    Analog {
        slot: usize,
        threshold: f64,
        band: f64,
        direction: TriggerDirection,
    },
    Digital {
        port: usize,
        mask: u8,
        direction: TriggerDirection,
    },
}

/// Releases a consumer blocked in [`DigitizerSource::produce`] from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    context: AcquisitionContext,
    stop_requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Post `Stopped` to the chunk pool and the rapid-block signal.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.context.pool.notify_error(ErrorKind::Stopped);
        self.context.block_ready.notify(Some(ErrorKind::Stopped));
        debug!("Stop requested");
    }
}

/// Digitizer acquisition orchestrator.
pub struct DigitizerSource {
    driver: SharedDriver,
    driver_type: String,
    settings: AcquisitionSettings,
    /// Snapshot taken by the last successful `configure`; acquisition runs on this.
    active: AcquisitionSettings,
    context: AcquisitionContext,
    errors: Arc<ErrorBuffer>,
    trigger: TriggerDetector,
    trigger_probe: Option<TriggerProbe>,
    rapid_block: RapidBlockState,
    poller: Poller,
    stop_requested: Arc<AtomicBool>,

    enabled_channels: Vec<bool>,
    enabled_ports: Vec<bool>,
    status: Vec<u32>,

    initialized: bool,
    configured: bool,
    armed: bool,
    timebase_published: bool,
    was_triggered_once: bool,
    items_written: u64,
    configure_exception: Option<String>,
}

impl std::fmt::Debug for DigitizerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitizerSource")
            .field("driver_type", &self.driver_type)
            .field("initialized", &self.initialized)
            .field("configured", &self.configured)
            .field("armed", &self.armed)
            .field("items_written", &self.items_written)
            .finish_non_exhaustive()
    }
}

impl DigitizerSource {
    /// Create an orchestrator over `driver` with default settings sized to its layout.
    pub fn new(driver: Box<dyn DigitizerDriver>) -> Self {
        let settings =
            AcquisitionSettings::new(driver.ai_channel_count(), driver.port_count());
        Self::with_settings(driver, settings)
    }

    /// Create an orchestrator with preset settings, resized to the driver layout.
    pub fn with_settings(driver: Box<dyn DigitizerDriver>, settings: AcquisitionSettings) -> Self {
        let driver_type = driver.driver_type().to_string();
        let settings = settings.with_layout(driver.ai_channel_count(), driver.port_count());
        let context = AcquisitionContext::new(settings.watchdog_window);
        Self {
            driver: Arc::new(Mutex::new(driver)),
            driver_type,
            active: settings.clone(),
            settings,
            context,
            errors: Arc::new(ErrorBuffer::default()),
            trigger: TriggerDetector::new(),
            trigger_probe: None,
            rapid_block: RapidBlockState::default(),
            poller: Poller::new(),
            stop_requested: Arc::new(AtomicBool::new(false)),
            enabled_channels: Vec::new(),
            enabled_ports: Vec::new(),
            status: Vec::new(),
            initialized: false,
            configured: false,
            armed: false,
            timebase_published: false,
            was_triggered_once: false,
            items_written: 0,
            configure_exception: None,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    fn settings_mut(&mut self) -> Result<&mut AcquisitionSettings> {
        if self.armed {
            return Err(DigitizerError::Armed);
        }
        Ok(&mut self.settings)
    }

    /// Current settings, including changes not yet applied by `configure`.
    #[must_use]
    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Settings applied by the last successful `configure`.
    #[must_use]
    pub fn active_settings(&self) -> &AcquisitionSettings {
        &self.active
    }

    /// Replace all settings. The document is validated and resized to the driver layout.
    pub fn set_settings(&mut self, settings: AcquisitionSettings) -> Result<()> {
        let layout = (self.settings.channels.len(), self.settings.ports.len());
        let settings = settings.with_layout(layout.0, layout.1);
        settings.validate()?;
        *self.settings_mut()? = settings;
        Ok(())
    }

    /// Pre/post-trigger sample counts.
    pub fn set_samples(&mut self, pre_samples: u32, post_samples: u32) -> Result<()> {
        self.settings_mut()?.set_samples(pre_samples, post_samples)
    }

    /// Sample rate in Hz.
    pub fn set_samp_rate(&mut self, rate: f64) -> Result<()> {
        self.settings_mut()?.set_samp_rate(rate)
    }

    /// Samples per chunk.
    pub fn set_buffer_size(&mut self, buffer_size: usize) -> Result<()> {
        self.settings_mut()?.set_buffer_size(buffer_size)
    }

    /// Pool chunk count.
    pub fn set_nr_buffers(&mut self, nr_buffers: usize) -> Result<()> {
        self.settings_mut()?.set_nr_buffers(nr_buffers)
    }

    /// Driver-side buffer size.
    pub fn set_driver_buffer_size(&mut self, size: usize) -> Result<()> {
        self.settings_mut()?.set_driver_buffer_size(size)
    }

    /// Streaming mode with a poll period in seconds.
    pub fn set_streaming(&mut self, poll_rate: f64) -> Result<()> {
        self.settings_mut()?.set_streaming(poll_rate)
    }

    /// Rapid-block mode with `nr_captures` waveforms per arm.
    pub fn set_rapid_block(&mut self, nr_captures: u32) -> Result<()> {
        self.settings_mut()?.set_rapid_block(nr_captures)
    }

    /// Downsampling mode and factor.
    pub fn set_downsampling(&mut self, mode: DownsamplingMode, factor: u32) -> Result<()> {
        self.settings_mut()?.set_downsampling(mode, factor)
    }

    /// Configure an analog channel.
    pub fn set_aichan(
        &mut self,
        id: &str,
        enabled: bool,
        range: f64,
        coupling: Coupling,
        offset: f64,
    ) -> Result<()> {
        self.settings_mut()?
            .set_aichan(id, enabled, range, coupling, offset)
    }

    /// Change range and offset of an analog channel.
    pub fn set_aichan_range(&mut self, id: &str, range: f64, offset: f64) -> Result<()> {
        self.settings_mut()?.set_aichan_range(id, range, offset)
    }

    /// Analog trigger on a channel or `"AUX"`.
    pub fn set_aichan_trigger(
        &mut self,
        id: &str,
        direction: TriggerDirection,
        threshold: f64,
    ) -> Result<()> {
        self.settings_mut()?
            .set_aichan_trigger(id, direction, threshold)
    }

    /// Configure a digital port.
    pub fn set_diport(&mut self, id: &str, enabled: bool, logic_level: f64) -> Result<()> {
        self.settings_mut()?.set_diport(id, enabled, logic_level)
    }

    /// Digital trigger on a pin.
    pub fn set_di_trigger(&mut self, pin: u32, direction: TriggerDirection) -> Result<()> {
        self.settings_mut()?.set_di_trigger(pin, direction)
    }

    /// Disable triggering.
    pub fn disable_triggers(&mut self) -> Result<()> {
        self.settings_mut()?.disable_triggers();
        Ok(())
    }

    /// Re-arm automatically between rapid-block captures.
    pub fn set_auto_arm(&mut self, auto_arm: bool) -> Result<()> {
        self.settings_mut()?.set_auto_arm(auto_arm);
        Ok(())
    }

    /// End production after the first rapid-block capture.
    pub fn set_trigger_once(&mut self, once: bool) -> Result<()> {
        self.settings_mut()?.set_trigger_once(once);
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the device. Idempotent.
    #[instrument(skip(self), fields(driver = %self.driver_type))]
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let result = self.driver.lock().initialize();
        self.check_driver("initialize", result)?;
        self.initialized = true;
        info!("Digitizer initialized");
        Ok(())
    }

    /// Apply the settings to the driver and size the chunk pool.
    #[instrument(skip(self), fields(driver = %self.driver_type))]
    pub fn configure(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(DigitizerError::NotInitialized);
        }
        if self.armed {
            return Err(DigitizerError::Armed);
        }
        self.settings.validate()?;
        self.configured = false;

        // Poll interval and watchdog rate are captured when the poller spawns.
        self.poller.stop();

        let settings = &self.settings;
        self.context
            .rate_monitor
            .reset(settings.watchdog_window, settings.samp_rate);

        let result = self.driver.lock().configure(settings, &self.context);
        self.check_driver("configure", result)?;

        self.enabled_channels = settings.channels.iter().map(|c| c.enabled).collect();
        self.enabled_ports = settings.ports.iter().map(|p| p.enabled).collect();
        self.status = vec![0; settings.enabled_channel_count()];

        let geometry = ChunkGeometry::new(
            settings.enabled_channel_count(),
            settings.enabled_port_count(),
            settings.buffer_size,
        );
        let nr_chunks = self.context.pool.initialize(geometry, settings.nr_buffers);

        self.trigger_probe = resolve_trigger(settings)?;
        self.trigger.reset();
        self.rapid_block.reset();
        self.active = settings.clone();
        self.configured = true;

        info!(
            channels = geometry.channels,
            ports = geometry.ports,
            chunk_size = geometry.chunk_size,
            nr_chunks,
            streaming = settings.acquisition.is_streaming(),
            "Digitizer configured"
        );
        Ok(())
    }

    /// Start acquisition. Idempotent.
    ///
    /// Seeds the watchdog with the configured rate, clears posted errors and,
    /// in streaming mode, puts the poller into `Running`.
    #[instrument(skip(self), fields(driver = %self.driver_type))]
    pub fn arm(&mut self) -> Result<()> {
        if self.armed {
            return Ok(());
        }
        if !self.configured {
            return Err(DigitizerError::NotConfigured);
        }

        self.context.rate_monitor.seed(self.active.samp_rate);
        self.context.pool.clear_error();
        self.context.block_ready.clear();

        let result = self.driver.lock().arm();
        self.check_driver("arm", result)?;

        self.armed = true;
        self.timebase_published = false;
        self.rapid_block.reset();

        // A stop that raced with the clear above must not be lost.
        if self.stop_requested.load(Ordering::SeqCst) {
            self.stop_handle().stop();
        }

        if self.active.acquisition.is_streaming() {
            self.ensure_poller()?;
            self.poller.transit_to_running();
        }

        info!("Digitizer armed");
        Ok(())
    }

    /// Stop acquisition. Idempotent.
    ///
    /// The source is disarmed even if the driver reports an error; the error
    /// is recorded and returned.
    #[instrument(skip(self), fields(driver = %self.driver_type))]
    pub fn disarm(&mut self) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        if self.active.acquisition.is_streaming() {
            self.poller.transit_to_idle();
        }
        self.armed = false;

        let result = self.driver.lock().disarm();
        self.check_driver("disarm", result)?;
        info!("Digitizer disarmed");
        Ok(())
    }

    /// Disarm, stop the poller and release the device.
    #[instrument(skip(self), fields(driver = %self.driver_type))]
    pub fn close(&mut self) -> Result<()> {
        if let Err(e) = self.disarm() {
            warn!(error = %e, "Disarm failed during close");
        }
        self.poller.stop();
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        self.configured = false;

        let result = self.driver.lock().close();
        self.check_driver("close", result)?;
        info!("Digitizer closed");
        Ok(())
    }

    /// Initialize, configure and, in streaming mode, spawn the poller and arm
    /// when auto-arm is set.
    ///
    /// A failure is also retained for [`configure_exception_message`](Self::configure_exception_message).
    pub fn start(&mut self) -> Result<()> {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.was_triggered_once = false;
        self.context.block_ready.clear();

        let result = self.start_inner();
        match &result {
            Ok(()) => self.configure_exception = None,
            Err(e) => {
                error!(error = %e, "Digitizer start failed");
                self.configure_exception = Some(e.to_string());
            }
        }
        result
    }

    fn start_inner(&mut self) -> Result<()> {
        self.initialize()?;
        self.configure()?;
        if self.active.acquisition.is_streaming() {
            self.ensure_poller()?;
            if self.active.auto_arm {
                self.arm()?;
            }
        }
        Ok(())
    }

    /// Post `Stopped`, disarm and stop the poller.
    pub fn stop(&mut self) -> Result<()> {
        self.stop_handle().stop();
        let result = self.disarm();
        self.poller.stop();
        result
    }

    /// Message of the last failed [`start`](Self::start), if any.
    #[must_use]
    pub fn configure_exception_message(&self) -> Option<&str> {
        self.configure_exception.as_deref()
    }

    /// Cloneable handle posting `Stopped` from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            context: self.context.clone(),
            stop_requested: Arc::clone(&self.stop_requested),
        }
    }

    fn ensure_poller(&mut self) -> Result<()> {
        if self.poller.is_started() {
            return Ok(());
        }
        let AcquisitionMode::Streaming { poll_rate } = self.active.acquisition else {
            return Ok(());
        };

        let driver = Arc::clone(&self.driver);
        let pool = self.context.pool.clone();
        let monitor = Arc::clone(&self.context.rate_monitor);
        let watchdog = Watchdog::new(self.active.samp_rate);

        self.poller
            .start(Duration::from_secs_f64(poll_rate), move || {
                let result = driver.lock().poll();
                if let Err(e) = result {
                    warn!(error = %e, "Driver poll failed");
                    pool.notify_error(ErrorKind::from(e));
                }
                if let Err(kind) = watchdog.check(&monitor) {
                    error!(
                        average = monitor.average(),
                        limit = watchdog.limit(),
                        "Watchdog: estimated sample rate below threshold"
                    );
                    pool.notify_error(kind);
                }
                PollControl::Continue
            })
    }

    /// Record a failed driver call and convert it into an operation error.
    fn check_driver(
        &self,
        operation: &'static str,
        result: crate::error::DriverResult<()>,
    ) -> Result<()> {
        result.map_err(|e| {
            let kind = ErrorKind::from(e);
            error!(operation, error = %kind, "Driver call failed");
            self.errors.push(kind.clone());
            DigitizerError::Operation {
                operation,
                source: kind,
            }
        })
    }

    // =========================================================================
    // Production
    // =========================================================================

    /// Produce up to `max_items` items into `out`.
    ///
    /// Streaming requires room for one full chunk. Blocks until data, an
    /// error or a stop arrives. `out.tags` is replaced with the tags of this call.
    pub fn produce(&mut self, out: &mut OutputBuffers, max_items: usize) -> Result<Produced> {
        out.tags.clear();
        if !self.configured {
            return Err(DigitizerError::NotConfigured);
        }
        let max_items = max_items.min(out.capacity());

        let produced = match self.active.acquisition {
            AcquisitionMode::Streaming { .. } => self.produce_streaming(out, max_items)?,
            AcquisitionMode::RapidBlock { .. } => self.produce_rapid_block(out, max_items)?,
        };

        if let Produced::Items { count, .. } = produced {
            if count > 0 && !self.timebase_published {
                let time_base = self.active.timebase();
                self.tag_enabled_outputs(out, self.items_written, |_| TagPayload::TimebaseInfo {
                    time_base,
                });
                self.timebase_published = true;
            }
            self.items_written += count as u64;
        }
        Ok(produced)
    }

    fn produce_streaming(&mut self, out: &mut OutputBuffers, max_items: usize) -> Result<Produced> {
        let chunk_size = self.active.buffer_size;
        if max_items < chunk_size {
            return Err(DigitizerError::OutputTooSmall {
                required: chunk_size,
                available: max_items,
            });
        }
        if self.stop_requested.load(Ordering::SeqCst) {
            return Ok(Produced::EndOfStream);
        }

        if let Err(kind) = self.context.pool.wait_ready() {
            return self.handle_streaming_error(kind);
        }

        let taken = {
            let (mut values, mut errors) = OutputBuffers::channel_slices(
                &mut out.values,
                &mut out.errors,
                &self.enabled_channels,
                chunk_size,
            );
            let mut ports =
                OutputBuffers::port_slices(&mut out.ports, &self.enabled_ports, chunk_size);
            self.context
                .pool
                .take_filled(&mut values, &mut errors, &mut ports, &mut self.status)
        };
        let taken = match taken {
            Ok(taken) => taken,
            // An error was posted between wait_ready and take_filled.
            Err(PoolError::SignalPending) => {
                return match self.context.pool.wait_ready() {
                    Err(kind) => self.handle_streaming_error(kind),
                    Ok(()) => Ok(Produced::Items { count: 0, lost: 0 }),
                };
            }
            Err(e) => return Err(e.into()),
        };

        if taken.lost_count > 0 {
            error!(lost = taken.lost_count, "Chunks lost: consumer too slow");
        }
        trace!(
            items = chunk_size,
            timestamp_ns = taken.local_timestamp_ns,
            "Chunk delivered"
        );

        let time_base = self.active.timebase();
        let offset = self.items_written;
        let timestamp_ns = taken.local_timestamp_ns;
        let status = self.status.clone();
        self.tag_enabled_outputs(out, offset, |k| TagPayload::AcqInfo {
            timestamp_ns,
            time_base,
            user_delay: 0.0,
            actual_delay: 0.0,
            status: k.and_then(|k| status.get(k).copied()).unwrap_or(0),
        });

        let edges = self.detect_edges(out, chunk_size);
        let factor = self.active.effective_downsampling_factor();
        let item_ns = time_base * 1e9;
        for edge in edges {
            let age_ns = ((chunk_size - edge) as f64 * item_ns) as u64;
            let edge_ts = timestamp_ns.saturating_sub(age_ns);
            self.tag_enabled_outputs(out, offset + edge as u64, |k| TagPayload::Trigger {
                downsampling_factor: factor,
                timestamp_ns: edge_ts,
                status: k.and_then(|k| status.get(k).copied()).unwrap_or(0),
            });
        }

        Ok(Produced::Items {
            count: chunk_size,
            lost: taken.lost_count,
        })
    }

    fn handle_streaming_error(&mut self, kind: ErrorKind) -> Result<Produced> {
        self.errors.push(kind.clone());
        if kind == ErrorKind::Stopped || self.stop_requested.load(Ordering::SeqCst) {
            info!("Stop requested, ending stream");
            return Ok(Produced::EndOfStream);
        }
        match kind {
            ErrorKind::Watchdog => {
                warn!("Watchdog triggered, re-arming");
                if let Err(e) = self.disarm() {
                    warn!(error = %e, "Disarm failed before re-arm");
                }
                self.arm()?;
                Ok(Produced::Items { count: 0, lost: 0 })
            }
            other => {
                error!(error = %other, "Acquisition failed");
                Err(DigitizerError::Acquisition(other))
            }
        }
    }

    fn detect_edges(&mut self, out: &OutputBuffers, n: usize) -> Vec<usize> {
        match self.trigger_probe {
            Some(TriggerProbe::Analog {
                slot,
                threshold,
                band,
                direction,
            }) => self
                .trigger
                .find_analog_edges(&out.values[slot][..n], threshold, band, direction),
            Some(TriggerProbe::Digital {
                port,
                mask,
                direction,
            }) => self
                .trigger
                .find_digital_edges(&out.ports[port][..n], mask, direction),
            None => Vec::new(),
        }
    }

    fn produce_rapid_block(&mut self, out: &mut OutputBuffers, max_items: usize) -> Result<Produced> {
        if self.rapid_block.phase == RapidBlockPhase::Waiting {
            if self.active.trigger_once && self.was_triggered_once {
                return Ok(Produced::EndOfStream);
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                return Ok(Produced::EndOfStream);
            }

            if self.active.auto_arm {
                if let Err(e) = self.disarm() {
                    warn!(error = %e, "Disarm failed before re-arm");
                }
                if let Err(e) = self.arm() {
                    error!(error = %e, "Re-arm failed, ending stream");
                    return Ok(Produced::EndOfStream);
                }
            }

            let waited = self.context.block_ready.wait();
            self.context.block_ready.clear();
            match waited {
                Err(ErrorKind::Stopped) => {
                    self.errors.push(ErrorKind::Stopped);
                    info!("Stop requested, ending stream");
                    return Ok(Produced::EndOfStream);
                }
                Err(kind) => {
                    error!(error = %kind, "Error while waiting for rapid block data");
                    self.errors.push(kind);
                    return Ok(Produced::Items { count: 0, lost: 0 });
                }
                Ok(()) => {}
            }

            self.rapid_block
                .initialize(self.active.nr_captures() as usize);
            debug!(waveforms = self.rapid_block.waveform_count, "Capture ready");
        }

        match self.rapid_block.phase {
            RapidBlockPhase::ReadingPart1 => self.read_first_part(out, max_items),
            RapidBlockPhase::ReadingTheRest => self.read_rest(out, max_items),
            RapidBlockPhase::Waiting => Ok(Produced::Items { count: 0, lost: 0 }),
        }
    }

    fn read_first_part(&mut self, out: &mut OutputBuffers, max_items: usize) -> Result<Produced> {
        self.was_triggered_once = true;

        let waveform = self.rapid_block.waveform_idx;
        let result = self
            .driver
            .lock()
            .prefetch_block(self.active.block_size(), waveform);
        self.check_runtime(result)?;

        self.rapid_block
            .set_waveform_params(0, self.active.block_size_with_downsampling());

        let now_ns = time::now_ns();
        let n = max_items.min(self.rapid_block.samples_left);
        self.read_block_data(out, n)?;

        let pre = self.active.pre_samples_with_downsampling();
        let factor = self.active.effective_downsampling_factor();
        let trigger_ts = now_ns + (f64::from(pre) * self.active.timebase() * 1e9) as u64;
        let status = self.status.clone();
        self.tag_enabled_outputs(out, self.items_written + u64::from(pre), |k| {
            TagPayload::Trigger {
                downsampling_factor: factor,
                timestamp_ns: trigger_ts,
                status: k.and_then(|k| status.get(k).copied()).unwrap_or(0),
            }
        });

        self.rapid_block.update_state(n);
        Ok(Produced::Items { count: n, lost: 0 })
    }

    fn read_rest(&mut self, out: &mut OutputBuffers, max_items: usize) -> Result<Produced> {
        let n = max_items.min(self.rapid_block.samples_left);
        self.read_block_data(out, n)?;
        self.rapid_block.update_state(n);
        Ok(Produced::Items { count: n, lost: 0 })
    }

    fn read_block_data(&mut self, out: &mut OutputBuffers, n: usize) -> Result<()> {
        let result = self.driver.lock().get_rapid_block_data(
            self.rapid_block.offset,
            n,
            self.rapid_block.waveform_idx,
            out,
            &mut self.status,
        );
        self.check_runtime(result)?;
        trace!(
            waveform = self.rapid_block.waveform_idx,
            offset = self.rapid_block.offset,
            items = n,
            "Rapid block read"
        );
        Ok(())
    }

    fn check_runtime(&self, result: crate::error::DriverResult<()>) -> Result<()> {
        result.map_err(|e| {
            let kind = ErrorKind::from(e);
            error!(error = %kind, "Rapid block read failed");
            self.errors.push(kind.clone());
            DigitizerError::Acquisition(kind)
        })
    }

    /// Attach a tag to every enabled output. `payload` receives the index of
    /// the channel among enabled channels, or `None` for ports.
    fn tag_enabled_outputs(
        &self,
        out: &mut OutputBuffers,
        offset: u64,
        payload: impl Fn(Option<usize>) -> TagPayload,
    ) {
        let channels = self
            .enabled_channels
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .enumerate()
            .map(|(k, (slot, _))| (TagTarget::Channel(slot), Some(k)));
        let ports = self
            .enabled_ports
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(slot, _)| (TagTarget::Port(slot), None));
        for (target, k) in channels.chain(ports) {
            out.tags.push(Tag {
                target,
                offset,
                payload: payload(k),
            });
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Drain recorded errors, oldest first.
    pub fn get_errors(&self) -> Vec<ErrorRecord> {
        self.errors.drain()
    }

    /// True while armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// True after a successful `initialize`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Items produced since construction.
    #[must_use]
    pub fn items_written(&self) -> u64 {
        self.items_written
    }

    /// Seconds per delivered item.
    #[must_use]
    pub fn timebase(&self) -> f64 {
        if self.configured {
            self.active.timebase()
        } else {
            self.settings.timebase()
        }
    }

    /// Shared resources handed to the driver.
    #[must_use]
    pub fn context(&self) -> &AcquisitionContext {
        &self.context
    }

    /// Chunk pool counters.
    #[must_use]
    pub fn pool_metrics(&self) -> PoolMetrics {
        self.context.pool.metrics()
    }

    /// Backend identifier.
    #[must_use]
    pub fn driver_type(&self) -> &str {
        &self.driver_type
    }

    /// Driver library version.
    #[must_use]
    pub fn driver_version(&self) -> String {
        self.driver.lock().driver_version()
    }

    /// Instrument hardware version.
    #[must_use]
    pub fn hardware_version(&self) -> String {
        self.driver.lock().hardware_version()
    }

    /// Ids of the analog channel slots.
    #[must_use]
    pub fn aichan_ids(&self) -> Vec<String> {
        self.settings.channel_ids()
    }

    /// Valid analog input ranges.
    #[must_use]
    pub fn aichan_ranges(&self) -> MetaRange {
        self.driver.lock().aichan_ranges()
    }
}

impl Drop for DigitizerSource {
    fn drop(&mut self) {
        self.poller.stop();
        if self.armed {
            if let Err(e) = self.driver.lock().disarm() {
                warn!(error = %e, "Disarm failed on drop");
            }
        }
    }
}

fn resolve_trigger(settings: &AcquisitionSettings) -> Result<Option<TriggerProbe>> {
    let trigger = &settings.trigger;
    if trigger.is_digital() {
        let (port, mask) = trigger.digital_port_and_mask();
        return Ok(Some(TriggerProbe::Digital {
            port,
            mask,
            direction: trigger.direction,
        }));
    }
    if trigger.is_analog() && !trigger.is_aux() {
        let slot = settings.channel_index(&trigger.source)?;
        return Ok(Some(TriggerProbe::Analog {
            slot,
            threshold: trigger.threshold,
            band: settings.channels[slot].range / 100.0,
            direction: trigger.direction,
        }));
    }
    Ok(None)
}
