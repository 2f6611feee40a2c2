//! Sample-rate supervision.
//!
//! The producer side reports every delivered batch to a [`RateMonitor`],
//! which turns the wall-clock gap between batches into an instantaneous rate
//! and feeds it to a [`RunningAverageFilter`]. The poller asks the
//! [`Watchdog`] after every poll whether the average dropped below a fraction
//! of the configured rate.

use crate::error::ErrorKind;
use crate::filter::RunningAverageFilter;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::trace;

/// Fraction of the configured rate below which the watchdog fires.
pub const WATCHDOG_THRESHOLD: f64 = 0.75;

#[derive(Debug)]
struct MonitorState {
    filter: RunningAverageFilter,
    last_batch: Option<Instant>,
}

/// Running estimate of the delivered sample rate.
#[derive(Debug)]
pub struct RateMonitor {
    state: Mutex<MonitorState>,
}

impl RateMonitor {
    /// Create a monitor averaging over `window` rate estimates.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                filter: RunningAverageFilter::new(window),
                last_batch: None,
            }),
        }
    }

    /// Fill the window with `rate` and restart batch timing.
    pub fn seed(&self, rate: f64) {
        let mut state = self.state.lock();
        state.filter.seed(rate);
        state.last_batch = None;
    }

    /// Replace the filter with one of a new window length, seeded with `rate`.
    pub fn reset(&self, window: usize, rate: f64) {
        let mut state = self.state.lock();
        state.filter = RunningAverageFilter::new(window);
        state.filter.seed(rate);
        state.last_batch = None;
    }

    /// Report a delivered batch of `nr_samples` samples.
    ///
    /// The first batch after seeding only starts the clock.
    pub fn record_batch(&self, nr_samples: usize) {
        let now = Instant::now();
        let mut state = self.state.lock();
        if let Some(last) = state.last_batch.replace(now) {
            let elapsed = now.duration_since(last).as_secs_f64();
            if elapsed > 0.0 {
                let rate = nr_samples as f64 / elapsed;
                let average = state.filter.add(rate);
                trace!(rate, average, "Rate estimate");
            }
        }
    }

    /// Feed an instantaneous rate estimate directly.
    pub fn add_rate(&self, rate: f64) -> f64 {
        self.state.lock().filter.add(rate)
    }

    /// Current average rate.
    #[must_use]
    pub fn average(&self) -> f64 {
        self.state.lock().filter.average()
    }
}

/// Checks the monitored rate against the configured one.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    expected_rate: f64,
    threshold: f64,
}

impl Watchdog {
    /// Watchdog for `expected_rate` with the default threshold.
    #[must_use]
    pub fn new(expected_rate: f64) -> Self {
        Self {
            expected_rate,
            threshold: WATCHDOG_THRESHOLD,
        }
    }

    /// Override the firing fraction.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Rate below which [`check`](Self::check) fails.
    #[must_use]
    pub fn limit(&self) -> f64 {
        self.expected_rate * self.threshold
    }

    /// `Err(ErrorKind::Watchdog)` when the monitored average is under the limit.
    pub fn check(&self, monitor: &RateMonitor) -> Result<(), ErrorKind> {
        if monitor.average() < self.limit() {
            Err(ErrorKind::Watchdog)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_monitor_passes() {
        let monitor = RateMonitor::new(100);
        monitor.seed(10_000.0);
        assert!(Watchdog::new(10_000.0).check(&monitor).is_ok());
    }

    #[test]
    fn test_half_rate_fires() {
        let monitor = RateMonitor::new(100);
        monitor.seed(10_000.0);
        let watchdog = Watchdog::new(10_000.0);
        for _ in 0..100 {
            monitor.add_rate(5_000.0);
        }
        assert_eq!(watchdog.check(&monitor), Err(ErrorKind::Watchdog));
    }

    #[test]
    fn test_short_dip_tolerated() {
        let monitor = RateMonitor::new(100);
        monitor.seed(10_000.0);
        for _ in 0..10 {
            monitor.add_rate(5_000.0);
        }
        // 90 * 10k + 10 * 5k over 100 = 9.5k
        assert!(Watchdog::new(10_000.0).check(&monitor).is_ok());
    }

    #[test]
    fn test_first_batch_only_starts_clock() {
        let monitor = RateMonitor::new(4);
        monitor.seed(1.0);
        monitor.record_batch(1_000_000);
        assert_eq!(monitor.average(), 1.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        monitor.record_batch(1_000);
        assert!(monitor.average() > 1.0);
    }

    #[test]
    fn test_custom_threshold() {
        let watchdog = Watchdog::new(1000.0).with_threshold(0.5);
        assert_eq!(watchdog.limit(), 500.0);
    }
}
