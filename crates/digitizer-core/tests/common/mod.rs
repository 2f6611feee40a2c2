//! Scripted driver shared by the integration tests.
//!
//! The driver records every call in a [`ScriptLog`] the test keeps a handle
//! to, and can be told to fail individual operations. Streaming data is
//! published by the test itself through `source.context().pool`; rapid-block
//! reads return a ramp `waveform * 10_000 + offset + i` so tests can check
//! which items were delivered.

#![allow(dead_code)]

use digitizer_core::{
    AcquisitionContext, AcquisitionSettings, DigitizerDriver, DriverError, DriverErrorKind,
    DriverResult, MetaRange, OutputBuffers,
};
use parking_lot::Mutex;
use std::sync::Arc;

pub const AI_CHANNELS: usize = 2;
pub const PORTS: usize = 1;

/// Calls observed by the driver, plus failure switches.
#[derive(Debug, Default)]
pub struct ScriptLog {
    pub initialize: usize,
    pub configure: usize,
    pub arm: usize,
    pub disarm: usize,
    pub close: usize,
    pub polls: usize,
    pub prefetches: Vec<(usize, usize)>,
    pub reads: Vec<(usize, usize, usize)>,

    pub fail_initialize: bool,
    pub fail_arm: bool,
    pub fail_poll: bool,
}

pub struct ScriptedDriver {
    log: Arc<Mutex<ScriptLog>>,
    context: Option<AcquisitionContext>,
    enabled_channels: Vec<bool>,
    rapid_block: bool,
}

impl ScriptedDriver {
    pub fn new() -> (Self, Arc<Mutex<ScriptLog>>) {
        let log = Arc::new(Mutex::new(ScriptLog::default()));
        let driver = Self {
            log: Arc::clone(&log),
            context: None,
            enabled_channels: Vec::new(),
            rapid_block: false,
        };
        (driver, log)
    }

    fn fail(&self, kind: DriverErrorKind, what: &str) -> DriverError {
        DriverError::new("scripted", kind, what).with_code(-7)
    }
}

impl DigitizerDriver for ScriptedDriver {
    fn driver_type(&self) -> &str {
        "scripted"
    }

    fn ai_channel_count(&self) -> usize {
        AI_CHANNELS
    }

    fn port_count(&self) -> usize {
        PORTS
    }

    fn initialize(&mut self) -> DriverResult<()> {
        let mut log = self.log.lock();
        log.initialize += 1;
        if log.fail_initialize {
            return Err(self.fail(DriverErrorKind::Initialization, "no device"));
        }
        Ok(())
    }

    fn configure(
        &mut self,
        settings: &AcquisitionSettings,
        context: &AcquisitionContext,
    ) -> DriverResult<()> {
        self.log.lock().configure += 1;
        self.context = Some(context.clone());
        self.enabled_channels = settings.channels.iter().map(|c| c.enabled).collect();
        self.rapid_block = !settings.acquisition.is_streaming();
        Ok(())
    }

    fn arm(&mut self) -> DriverResult<()> {
        let mut log = self.log.lock();
        log.arm += 1;
        if log.fail_arm {
            return Err(self.fail(DriverErrorKind::Hardware, "arm rejected"));
        }
        if self.rapid_block {
            if let Some(context) = &self.context {
                context.block_ready.notify(None);
            }
        }
        Ok(())
    }

    fn disarm(&mut self) -> DriverResult<()> {
        self.log.lock().disarm += 1;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.log.lock().close += 1;
        Ok(())
    }

    fn poll(&mut self) -> DriverResult<()> {
        let mut log = self.log.lock();
        log.polls += 1;
        if log.fail_poll {
            return Err(self.fail(DriverErrorKind::Communication, "link lost"));
        }
        Ok(())
    }

    fn prefetch_block(&mut self, length: usize, block_number: usize) -> DriverResult<()> {
        self.log.lock().prefetches.push((length, block_number));
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
        self.log.lock().reads.push((offset, length, waveform));
        for (slot, enabled) in self.enabled_channels.iter().enumerate() {
            if !enabled {
                continue;
            }
            for i in 0..length {
                out.values[slot][i] = (waveform * 10_000 + offset + i) as f32;
                out.errors[slot][i] = 0.01;
            }
        }
        status.fill(0);
        Ok(())
    }

    fn driver_version(&self) -> String {
        "scripted 1.0".to_string()
    }

    fn hardware_version(&self) -> String {
        "none".to_string()
    }

    fn aichan_ranges(&self) -> MetaRange {
        MetaRange::from_points(&[0.5, 1.0, 2.0, 5.0])
    }
}
