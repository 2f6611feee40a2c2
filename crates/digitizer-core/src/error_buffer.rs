//! Fixed-capacity ring of recently observed errors.
//!
//! Consume-once telemetry: [`ErrorBuffer::drain`] returns everything in FIFO
//! order and clears the ring. When full, the oldest record is overwritten.

use crate::error::ErrorKind;
use crate::time;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// Default number of records kept.
pub const DEFAULT_ERROR_BUFFER_CAPACITY: usize = 128;

/// One observed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// When the error was recorded, UTC nanoseconds.
    pub timestamp_ns: u64,
    /// Numeric code, see [`ErrorKind::code`].
    pub code: i32,
    /// Rendered error message.
    pub message: String,
    #[serde(skip)]
    error: ErrorKind,
}

impl ErrorRecord {
    /// Record `error` at `timestamp_ns`.
    #[must_use]
    pub fn new(timestamp_ns: u64, error: ErrorKind) -> Self {
        Self {
            timestamp_ns,
            code: error.code(),
            message: error.to_string(),
            error,
        }
    }

    /// The recorded error.
    #[must_use]
    pub fn error(&self) -> &ErrorKind {
        &self.error
    }

    /// Timestamp as a `DateTime`.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        time::to_datetime(self.timestamp_ns)
    }
}

/// Thread-safe bounded error history.
#[derive(Debug)]
pub struct ErrorBuffer {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
}

impl Default for ErrorBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_BUFFER_CAPACITY)
    }
}

impl ErrorBuffer {
    /// Create a buffer keeping the last `capacity` records (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record `error` with the current time.
    pub fn push(&self, error: ErrorKind) {
        self.push_record(ErrorRecord::new(time::now_ns(), error));
    }

    /// Append a prepared record.
    pub fn push_record(&self, record: ErrorRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Take all records, oldest first, leaving the buffer empty.
    pub fn drain(&self) -> Vec<ErrorRecord> {
        self.records.lock().drain(..).collect()
    }

    /// Records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Maximum number of records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DriverError, DriverErrorKind};

    #[test]
    fn test_drain_is_fifo_and_clears() {
        let buffer = ErrorBuffer::new(8);
        buffer.push(ErrorKind::Watchdog);
        buffer.push(ErrorKind::Stopped);

        let records = buffer.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].error(), &ErrorKind::Watchdog);
        assert_eq!(records[1].code, 1);
        assert!(records[0].timestamp_ns <= records[1].timestamp_ns);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let buffer = ErrorBuffer::new(3);
        for code in 0..5 {
            let err = DriverError::new("mock", DriverErrorKind::Hardware, "fault").with_code(code);
            buffer.push_record(ErrorRecord::new(code as u64, err.into()));
        }

        let codes: Vec<i32> = buffer.drain().iter().map(|r| r.code).collect();
        assert_eq!(codes, vec![2, 3, 4]);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(ErrorBuffer::default().capacity(), 128);
    }

    #[test]
    fn test_concurrent_push() {
        let buffer = std::sync::Arc::new(ErrorBuffer::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        buffer.push(ErrorKind::Interrupted);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.len(), 400);
    }
}
