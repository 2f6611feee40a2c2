//! Discrete and stepped value ranges advertised by drivers.

use serde::{Deserialize, Serialize};

/// A closed interval with an optional step (0 means continuous).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound
    pub start: f64,
    /// Upper bound
    pub stop: f64,
    /// Step between valid values, 0 for continuous
    pub step: f64,
}

impl Range {
    /// A single valid value.
    #[must_use]
    pub fn point(value: f64) -> Self {
        Self {
            start: value,
            stop: value,
            step: 0.0,
        }
    }

    /// Interval `[start, stop]` with `step`.
    #[must_use]
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }
}

/// Union of ranges, sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaRange {
    ranges: Vec<Range>,
}

impl MetaRange {
    /// Build from ranges in any order.
    #[must_use]
    pub fn new(mut ranges: Vec<Range>) -> Self {
        ranges.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { ranges }
    }

    /// Build from discrete values.
    #[must_use]
    pub fn from_points(points: &[f64]) -> Self {
        Self::new(points.iter().copied().map(Range::point).collect())
    }

    /// The ranges, ascending.
    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Smallest valid value.
    #[must_use]
    pub fn start(&self) -> Option<f64> {
        self.ranges.first().map(|r| r.start)
    }

    /// Largest valid value.
    #[must_use]
    pub fn stop(&self) -> Option<f64> {
        self.ranges.iter().map(|r| r.stop).max_by(f64::total_cmp)
    }

    /// Nearest valid value to `value`.
    ///
    /// With `clip_step`, values inside a stepped range snap to the nearest step.
    /// An empty meta-range returns `value` unchanged.
    #[must_use]
    pub fn clip(&self, value: f64, clip_step: bool) -> f64 {
        let mut best = value;
        let mut best_distance = f64::INFINITY;
        for range in &self.ranges {
            let mut candidate = value.clamp(range.start, range.stop);
            if clip_step && range.step > 0.0 {
                let steps = ((candidate - range.start) / range.step).round();
                candidate = (range.start + steps * range.step).min(range.stop);
            }
            let distance = (candidate - value).abs();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_to_discrete_points() {
        let ranges = MetaRange::from_points(&[5.0, 0.1, 1.0, 0.5]);
        assert_eq!(ranges.start(), Some(0.1));
        assert_eq!(ranges.stop(), Some(5.0));
        assert_eq!(ranges.clip(0.7, true), 0.5);
        assert_eq!(ranges.clip(0.8, true), 1.0);
        assert_eq!(ranges.clip(100.0, true), 5.0);
        assert_eq!(ranges.clip(0.0, false), 0.1);
    }

    #[test]
    fn test_clip_stepped_range() {
        let ranges = MetaRange::new(vec![Range::new(0.0, 10.0, 2.5)]);
        assert_eq!(ranges.clip(3.0, true), 2.5);
        assert_eq!(ranges.clip(3.0, false), 3.0);
        assert_eq!(ranges.clip(-1.0, true), 0.0);
    }

    #[test]
    fn test_empty() {
        let ranges = MetaRange::default();
        assert_eq!(ranges.clip(3.0, true), 3.0);
        assert!(ranges.start().is_none());
    }
}
