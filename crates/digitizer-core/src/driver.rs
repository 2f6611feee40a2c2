//! Hardware driver seam.
//!
//! A [`DigitizerDriver`] is the pluggable backend behind a
//! [`DigitizerSource`](crate::DigitizerSource). In streaming mode the driver is
//! also the producer: from `poll()` (or its own callback thread) it borrows free
//! chunks from the pool in [`AcquisitionContext`], fills them and publishes
//! them, reporting each delivered batch to the rate monitor. In rapid-block
//! mode it signals [`BlockReadySignal`] once a capture is complete and serves
//! reads through [`DigitizerDriver::get_rapid_block_data`].

use crate::error::{DriverResult, ErrorKind};
use crate::output::OutputBuffers;
use crate::range::MetaRange;
use crate::settings::AcquisitionSettings;
use crate::watchdog::RateMonitor;
use digitizer_pool::ChunkPool;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backend operations required by the acquisition engine.
pub trait DigitizerDriver: Send {
    /// Backend identifier used in error categories and logs.
    fn driver_type(&self) -> &str;

    /// Number of physical analog channels.
    fn ai_channel_count(&self) -> usize;

    /// Number of physical digital ports.
    fn port_count(&self) -> usize;

    /// Open the device.
    fn initialize(&mut self) -> DriverResult<()>;

    /// Apply `settings`. `context` carries the shared resources the driver
    /// produces into; drivers keep a clone.
    fn configure(
        &mut self,
        settings: &AcquisitionSettings,
        context: &AcquisitionContext,
    ) -> DriverResult<()>;

    /// Start acquisition.
    fn arm(&mut self) -> DriverResult<()>;

    /// Stop acquisition.
    fn disarm(&mut self) -> DriverResult<()>;

    /// Release the device.
    fn close(&mut self) -> DriverResult<()>;

    /// Move pending streaming data into the chunk pool. Called by the poller.
    fn poll(&mut self) -> DriverResult<()>;

    /// Make capture `block_number` (of `length` raw samples) readable.
    fn prefetch_block(&mut self, length: usize, block_number: usize) -> DriverResult<()>;

    /// Copy `length` delivered items starting at `offset` of capture `waveform`
    /// into index 0.. of the enabled slots of `out`, and one status word per
    /// enabled channel into `status`.
    fn get_rapid_block_data(
        &mut self,
        offset: usize,
        length: usize,
        waveform: usize,
        out: &mut OutputBuffers,
        status: &mut [u32],
    ) -> DriverResult<()>;

    /// Driver library version.
    fn driver_version(&self) -> String;

    /// Instrument hardware version.
    fn hardware_version(&self) -> String;

    /// Valid analog input ranges in volts.
    fn aichan_ranges(&self) -> MetaRange;
}

/// Shared resources handed to the driver at configure time.
#[derive(Debug, Clone)]
pub struct AcquisitionContext {
    /// Streaming hand-off pool
    pub pool: ChunkPool<ErrorKind>,
    /// Rapid-block completion signal
    pub block_ready: Arc<BlockReadySignal>,
    /// Delivered-rate estimate fed by the producer
    pub rate_monitor: Arc<RateMonitor>,
}

impl AcquisitionContext {
    /// Fresh context with an uninitialized pool.
    #[must_use]
    pub fn new(watchdog_window: usize) -> Self {
        Self {
            pool: ChunkPool::new(),
            block_ready: Arc::new(BlockReadySignal::new()),
            rate_monitor: Arc::new(RateMonitor::new(watchdog_window)),
        }
    }
}

#[derive(Debug, Default)]
struct BlockState {
    ready: bool,
    error: Option<ErrorKind>,
}

/// Single-shot "capture complete or error" signal for rapid-block mode.
#[derive(Debug, Default)]
pub struct BlockReadySignal {
    state: Mutex<BlockState>,
    changed: Condvar,
}

impl BlockReadySignal {
    /// Signal in the cleared state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the capture complete (`None`) or post an error, waking waiters.
    pub fn notify(&self, error: Option<ErrorKind>) {
        let mut state = self.state.lock();
        match error {
            Some(e) => state.error = Some(e),
            None => state.ready = true,
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Block until ready or an error is posted. A posted error wins.
    pub fn wait(&self) -> Result<(), ErrorKind> {
        let mut state = self.state.lock();
        while !state.ready && state.error.is_none() {
            self.changed.wait(&mut state);
        }
        match &state.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Like [`wait`](Self::wait), giving up with `Interrupted` after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), ErrorKind> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.ready && state.error.is_none() {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        match (&state.error, state.ready) {
            (Some(e), _) => Err(e.clone()),
            (None, true) => Ok(()),
            (None, false) => Err(ErrorKind::Interrupted),
        }
    }

    /// Reset to not-ready with no error.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.ready = false;
        state.error = None;
    }

    /// True if a capture completion is pending.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }
}
