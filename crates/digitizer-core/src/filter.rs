//! Sliding-window running average.
//!
//! Each [`add`](RunningAverageFilter::add) updates the average in O(1) by
//! swapping the oldest sample for the newest. Floating-point error from the
//! incremental update accumulates, so the sum is recomputed from scratch once
//! per window length of insertions.

/// O(1) sliding-window average with periodic full recomputation.
#[derive(Debug, Clone)]
pub struct RunningAverageFilter {
    window: Vec<f64>,
    head: usize,
    average: f64,
    since_recompute: usize,
}

impl RunningAverageFilter {
    /// Create a filter over the last `len` samples, initially filled with zeros.
    ///
    /// A `len` of zero is treated as one.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            window: vec![0.0; len.max(1)],
            head: 0,
            average: 0.0,
            since_recompute: 0,
        }
    }

    /// Push a sample, evicting the oldest, and return the new average.
    pub fn add(&mut self, value: f64) -> f64 {
        let n = self.window.len() as f64;
        let oldest = std::mem::replace(&mut self.window[self.head], value);
        self.head = (self.head + 1) % self.window.len();

        self.since_recompute += 1;
        if self.since_recompute >= self.window.len() {
            self.recompute();
        } else {
            self.average += (value - oldest) / n;
        }
        self.average
    }

    /// Current average over the window.
    #[must_use]
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Fill the whole window with `value`.
    pub fn seed(&mut self, value: f64) {
        self.window.fill(value);
        self.head = 0;
        self.average = value;
        self.since_recompute = 0;
    }

    /// Window length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Always false; the window holds at least one sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    fn recompute(&mut self) {
        self.average = self.window.iter().sum::<f64>() / self.window.len() as f64;
        self.since_recompute = 0;
    }
}
