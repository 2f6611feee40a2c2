//! Error injection framework for the simulated digitizer.
//!
//! Enables configurable failures and error scenarios for resilience testing.
//! Injected failures are ordinary [`DriverError`]s, so they travel through
//! the engine exactly like vendor errors.

use super::rng::MockRng;
use digitizer_core::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Status code attached to injected random failures.
pub const INJECTED_FAILURE_CODE: i32 = 0x1F;

/// Error injection configuration
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0), `"*"` matches any operation
    failure_rates: Arc<HashMap<&'static str, f64>>,
    /// Specific failure scenarios
    scenarios: Arc<Vec<ErrorScenario>>,
    /// RNG for failure decisions
    rng: Arc<MockRng>,
    /// State tracking for scenarios
    state: Arc<Mutex<ErrorState>>,
}

/// Scripted failure.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Fail every call of `operation` after `count` successful ones
    FailAfterN {
        /// Operation name (`"arm"`, `"poll"`, ...)
        operation: &'static str,
        /// Successful calls before failing
        count: u32,
    },
    /// Every call of `operation` times out
    Timeout {
        /// Operation name
        operation: &'static str,
    },
    /// Link to the device lost on the first call, for good
    CommunicationLoss,
    /// Hardware fault with a vendor status code, sticky
    HardwareFault {
        /// Vendor status code
        code: i32,
    },
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    communication_lost: bool,
    hardware_fault_code: Option<i32>,
}

impl ErrorConfig {
    /// No injected errors.
    #[must_use]
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Uniform random failures on every operation.
    #[must_use]
    pub fn random_failures(rate: f64) -> Self {
        Self::random_failures_seeded(rate, None)
    }

    /// Uniform random failures with a specific seed.
    #[must_use]
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// Random failures on a single operation.
    #[must_use]
    pub fn operation_failures_seeded(operation: &'static str, rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert(operation, rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// A single scenario.
    #[must_use]
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Several scenarios.
    #[must_use]
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// True when no rate or scenario is configured.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.failure_rates.is_empty() && self.scenarios.is_empty()
    }

    /// Decide whether `operation` fails now.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        if state.communication_lost {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }
        if let Some(code) = state.hardware_fault_code {
            return Err(hardware_fault(driver_type, code));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(DriverError::new(
                            driver_type,
                            DriverErrorKind::Hardware,
                            format!("Injected '{operation}' failure after {count} calls"),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{operation}' timed out"),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.hardware_fault_code = Some(*code);
                    return Err(hardware_fault(driver_type, *code));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);
        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Random failure on operation '{operation}'"),
            )
            .with_code(INJECTED_FAILURE_CODE));
        }

        Ok(())
    }

    /// Clear counters and sticky faults.
    pub fn reset(&self) {
        *self.state.lock() = ErrorState::default();
    }
}

fn hardware_fault(driver_type: &str, code: i32) -> DriverError {
    DriverError::new(
        driver_type,
        DriverErrorKind::Hardware,
        format!("Hardware fault: {code:#x}"),
    )
    .with_code(code)
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}
