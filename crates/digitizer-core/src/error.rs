//! Error types for the acquisition engine.
//!
//! Two layers:
//!
//! - **`ErrorKind`**: runtime acquisition codes that travel through the chunk
//!   pool signal, the rapid-block ready signal and the error buffer. `Stopped`,
//!   `Interrupted` and `Watchdog` are engine codes; everything a driver reports
//!   is carried verbatim as `Driver(DriverError)`, category-tagged but not
//!   interpreted.
//! - **`DigitizerError`**: what the public API returns. Setter validation,
//!   lifecycle misuse, failed driver calls and pool contract violations.
//!
//! Production-time classification of `ErrorKind` happens in the orchestrator:
//! `Stopped` ends the stream, `Watchdog` re-arms and retries, anything else is
//! a terminal failure.

use digitizer_pool::PoolError;
use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a driver-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// Device open/initialization failed
    Initialization,
    /// Device rejected the configuration
    Configuration,
    /// Link to the device failed
    Communication,
    /// Close/stop failed
    Shutdown,
    /// Device reported a hardware fault
    Hardware,
    /// Device did not answer in time
    Timeout,
    /// Access to the device denied
    Permission,
    /// Argument out of the device's range
    InvalidParameter,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Shutdown => "shutdown",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::Permission => "permission",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Opaque failure reported by a driver backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Driver '{driver_type}' {kind} error (code {code}): {message}")]
pub struct DriverError {
    /// Backend identifier, e.g. `"mock"`
    pub driver_type: String,
    /// Failure category
    pub kind: DriverErrorKind,
    /// Vendor status code, passed through unchanged
    pub code: i32,
    /// Human-readable detail
    pub message: String,
}

impl DriverError {
    /// Create a driver error with vendor code 0.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            code: 0,
            message: message.into(),
        }
    }

    /// Attach a vendor status code.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }
}

/// Result of a driver call.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

// =============================================================================
// Acquisition Error Codes
// =============================================================================

/// Runtime acquisition error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cooperative shutdown requested. Ends production cleanly.
    #[error("acquisition stopped")]
    Stopped,

    /// A wait did not complete in time.
    #[error("interrupted: no response in time")]
    Interrupted,

    /// Estimated sample rate fell below the watchdog threshold.
    #[error("watchdog: estimated sample rate below threshold")]
    Watchdog,

    /// Error reported by the driver backend.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ErrorKind {
    /// Numeric code of [`ErrorKind::Stopped`].
    pub const STOPPED: i32 = 1;
    /// Numeric code of [`ErrorKind::Interrupted`].
    pub const INTERRUPTED: i32 = 10;
    /// Numeric code of [`ErrorKind::Watchdog`].
    pub const WATCHDOG: i32 = 11;

    /// Numeric error code. Driver errors return their vendor code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::Stopped => Self::STOPPED,
            ErrorKind::Interrupted => Self::INTERRUPTED,
            ErrorKind::Watchdog => Self::WATCHDOG,
            ErrorKind::Driver(e) => e.code,
        }
    }

    /// Category label used in logs and diagnostics.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            ErrorKind::Driver(e) => &e.driver_type,
            _ => "digitizer",
        }
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Convenience alias for results using the digitizer error type.
pub type Result<T> = std::result::Result<T, DigitizerError>;

/// Error returned by the digitizer API.
#[derive(Error, Debug)]
pub enum DigitizerError {
    /// A setter or configuration document carried an invalid value.
    ///
    /// Setters never unwind; every rejected value ends up here.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// What was wrong
        message: String,
    },

    /// Analog channel id is not a single letter `A`..`P` within the channel count.
    #[error("Invalid analog channel id '{id}'")]
    InvalidChannelId {
        /// Offending id
        id: String,
    },

    /// Port id does not follow `port<d>` or exceeds the port count.
    #[error("Invalid port id '{id}', expected 'port<d>'")]
    InvalidPortId {
        /// Offending id
        id: String,
    },

    /// `configure()` called before `initialize()`.
    #[error("Digitizer not initialized; initialize first")]
    NotInitialized,

    /// `arm()` or `produce()` called before `configure()`.
    #[error("Digitizer not configured; configure first")]
    NotConfigured,

    /// Configuration mutated while armed.
    #[error("Digitizer is armed; disarm first")]
    Armed,

    /// A lifecycle call into the driver failed.
    ///
    /// Raised synchronously by `initialize`, `configure` and `arm`. The code is
    /// also recorded in the error buffer.
    #[error("{operation} failed: {source}")]
    Operation {
        /// Lifecycle step that failed
        operation: &'static str,
        /// Underlying error code
        #[source]
        source: ErrorKind,
    },

    /// Terminal runtime failure returned from `produce()`.
    #[error(transparent)]
    Acquisition(#[from] ErrorKind),

    /// Chunk pool contract violated.
    #[error("Chunk pool error: {0}")]
    Pool(#[from] PoolError),

    /// Output slots cannot hold the samples of one call.
    #[error("Output buffers too small: need {required} items, have {available}")]
    OutputTooSmall {
        /// Items required
        required: usize,
        /// Items the caller provided room for
        available: usize,
    },

    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Poller thread could not be started.
    #[error("Poller error: {0}")]
    Poller(String),
}

impl DigitizerError {
    /// Shorthand for [`DigitizerError::InvalidParameter`].
    pub fn invalid(message: impl Into<String>) -> Self {
        DigitizerError::InvalidParameter {
            message: message.into(),
        }
    }

    /// The acquisition error code behind this error, if any.
    #[must_use]
    pub fn error_kind(&self) -> Option<&ErrorKind> {
        match self {
            DigitizerError::Operation { source, .. } => Some(source),
            DigitizerError::Acquisition(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<figment::Error> for DigitizerError {
    fn from(err: figment::Error) -> Self {
        DigitizerError::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::Stopped.code(), 1);
        assert_eq!(ErrorKind::Interrupted.code(), 10);
        assert_eq!(ErrorKind::Watchdog.code(), 11);

        let driver = DriverError::new("mock", DriverErrorKind::Hardware, "overheated").with_code(0x42);
        let kind = ErrorKind::from(driver);
        assert_eq!(kind.code(), 0x42);
        assert_eq!(kind.category(), "mock");
        assert_eq!(ErrorKind::Watchdog.category(), "digitizer");
    }

    #[test]
    fn test_error_display() {
        let err = DriverError::new("mock", DriverErrorKind::Timeout, "no answer").with_code(7);
        assert_eq!(
            err.to_string(),
            "Driver 'mock' timeout error (code 7): no answer"
        );

        let err = DigitizerError::Operation {
            operation: "arm",
            source: ErrorKind::Watchdog,
        };
        assert!(err.to_string().contains("arm failed"));
        assert_eq!(err.error_kind(), Some(&ErrorKind::Watchdog));

        let err = DigitizerError::invalid("sample rate has to be greater than zero");
        assert!(err.to_string().contains("greater than zero"));
        assert!(err.error_kind().is_none());
    }
}
