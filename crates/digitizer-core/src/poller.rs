//! Background poll loop with an explicit lifecycle state machine.
//!
//! ```text
//!   Idle --transit_to_running--> Running --transit_to_idle--> PendIdle --> Idle
//!                                   |
//!                                 stop
//!                                   v
//!                                PendExit --> Exit
//! ```
//!
//! Callers only ever request the pending states. The loop thread performs the
//! final `Idle`/`Exit` transition itself and notifies waiters, so a caller
//! never changes state under an iteration in progress.

use crate::error::{DigitizerError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a caller waits for the loop to acknowledge a pending state.
pub const TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between state checks while idle.
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Name of the poller thread.
pub const POLLER_THREAD_NAME: &str = "digitizer-poller";

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Loop alive, not polling
    Idle,
    /// Loop polling
    Running,
    /// Loop terminated
    Exit,
    /// Exit requested
    PendExit,
    /// Idle requested
    PendIdle,
}

/// Returned by the work closure after each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    /// Keep polling
    Continue,
    /// Terminate the loop
    Exit,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<PollerState>,
    changed: Condvar,
}

impl Shared {
    fn set(&self, state: PollerState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }
}

/// Owner of the poll thread.
#[derive(Debug)]
pub struct Poller {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    transition_timeout: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    /// Poller with no thread running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PollerState::Idle),
                changed: Condvar::new(),
            }),
            handle: None,
            transition_timeout: TRANSITION_TIMEOUT,
        }
    }

    /// Override how long transitions wait for the loop (default [`TRANSITION_TIMEOUT`]).
    #[must_use]
    pub fn with_transition_timeout(mut self, timeout: Duration) -> Self {
        self.transition_timeout = timeout;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PollerState {
        *self.shared.state.lock()
    }

    /// True while a loop thread exists.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the loop thread in `Idle`. A running loop is stopped first.
    ///
    /// `work` runs once per iteration while `Running`; the loop then sleeps
    /// for `poll_interval` minus the time `work` took.
    pub fn start<F>(&mut self, poll_interval: Duration, mut work: F) -> Result<()>
    where
        F: FnMut() -> PollControl + Send + 'static,
    {
        if self.is_started() {
            self.stop();
        }
        // A loop detached by a timed-out stop keeps its own state.
        self.shared = Arc::new(Shared {
            state: Mutex::new(PollerState::Idle),
            changed: Condvar::new(),
        });

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(POLLER_THREAD_NAME.to_string())
            .spawn(move || {
                debug!(interval_us = poll_interval.as_micros() as u64, "Poller started");
                loop {
                    let state = *shared.state.lock();
                    match state {
                        PollerState::Running => {
                            let started = Instant::now();
                            if work() == PollControl::Exit {
                                shared.set(PollerState::Exit);
                                break;
                            }
                            let elapsed = started.elapsed();
                            thread::sleep(poll_interval.saturating_sub(elapsed));
                        }
                        PollerState::PendIdle => shared.set(PollerState::Idle),
                        PollerState::PendExit => {
                            shared.set(PollerState::Exit);
                            break;
                        }
                        PollerState::Exit => break,
                        PollerState::Idle => thread::sleep(IDLE_SLEEP),
                    }
                }
                debug!("Poller exited");
            })
            .map_err(|e| DigitizerError::Poller(e.to_string()))?;

        self.handle = Some(handle);
        info!("Poller thread spawned");
        Ok(())
    }

    /// Request `Running`. Also supersedes an unacknowledged idle request.
    pub fn transit_to_running(&self) {
        let mut state = self.shared.state.lock();
        if matches!(*state, PollerState::Idle | PollerState::PendIdle) {
            *state = PollerState::Running;
            self.shared.changed.notify_all();
        }
    }

    /// Request `Idle` and wait for the loop to acknowledge.
    ///
    /// If the loop does not answer in time (stuck in a poll), the state is
    /// forced to `Idle`; the loop sees it on its next state check.
    pub fn transit_to_idle(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state != PollerState::Running {
                return;
            }
            *state = PollerState::PendIdle;
        }
        if !self.wait_for(|s| s != PollerState::PendIdle, "idle") {
            let mut state = self.shared.state.lock();
            if *state == PollerState::PendIdle {
                warn!("Forcing poller to idle");
                *state = PollerState::Idle;
                self.shared.changed.notify_all();
            }
        }
    }

    /// Request `Exit`, wait for the loop and join it.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let mut state = self.shared.state.lock();
            if *state != PollerState::Exit {
                *state = PollerState::PendExit;
            }
        }
        if self.wait_for(|s| s == PollerState::Exit, "exit") {
            if handle.join().is_err() {
                warn!("Poller thread panicked");
            }
        } else {
            // Detach; the loop exits on its next state check.
            drop(handle);
        }
    }

    fn wait_for(&self, done: impl Fn(PollerState) -> bool, what: &str) -> bool {
        let deadline = Instant::now() + self.transition_timeout;
        let mut state = self.shared.state.lock();
        while !done(*state) {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                if done(*state) {
                    break;
                }
                warn!(state = ?*state, target_state = what, "Timed out waiting for poller transition");
                return false;
            }
        }
        true
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
