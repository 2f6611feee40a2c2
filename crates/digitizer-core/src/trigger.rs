//! Software edge detection over delivered sample blocks.
//!
//! The detector keeps a single latch across calls, so an edge split over two
//! blocks is reported exactly once. Analog detection applies a hysteresis
//! band around the threshold; digital detection tests a bit mask.

use crate::settings::TriggerDirection;

/// Stateful edge detector.
#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    latch: bool,
}

impl TriggerDetector {
    /// Create a detector with the latch cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the latch.
    pub fn reset(&mut self) {
        self.latch = false;
    }

    /// Offsets of analog edges in `samples`.
    ///
    /// Rising: fires when a sample reaches `threshold` with the latch clear,
    /// and clears the latch once the signal drops to `threshold - band`.
    /// Falling mirrors this around `threshold + band`.
    pub fn find_analog_edges(
        &mut self,
        samples: &[f32],
        threshold: f64,
        band: f64,
        direction: TriggerDirection,
    ) -> Vec<usize> {
        let mut edges = Vec::new();
        if direction.is_rising() {
            let low = threshold - band;
            for (i, &s) in samples.iter().enumerate() {
                let s = f64::from(s);
                if !self.latch && s >= threshold {
                    self.latch = true;
                    edges.push(i);
                } else if self.latch && s <= low {
                    self.latch = false;
                }
            }
        } else {
            let high = threshold + band;
            for (i, &s) in samples.iter().enumerate() {
                let s = f64::from(s);
                if self.latch && s <= threshold {
                    self.latch = false;
                    edges.push(i);
                } else if !self.latch && s >= high {
                    self.latch = true;
                }
            }
        }
        edges
    }

    /// Offsets of digital edges on the bits selected by `mask`.
    pub fn find_digital_edges(
        &mut self,
        samples: &[u8],
        mask: u8,
        direction: TriggerDirection,
    ) -> Vec<usize> {
        let mut edges = Vec::new();
        let rising = direction.is_rising();
        for (i, &s) in samples.iter().enumerate() {
            let high = s & mask != 0;
            if rising {
                if !self.latch && high {
                    self.latch = true;
                    edges.push(i);
                } else if self.latch && !high {
                    self.latch = false;
                }
            } else if self.latch && !high {
                self.latch = false;
                edges.push(i);
            } else if !self.latch && high {
                self.latch = true;
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rising_hysteresis() {
        let mut detector = TriggerDetector::new();
        let edges =
            detector.find_analog_edges(&[-2.0, 2.0, 2.0, -0.5, -2.0, 2.0], 0.0, 1.0, TriggerDirection::Rising);
        assert_eq!(edges, vec![1, 5]);
    }

    #[test]
    fn test_falling_hysteresis() {
        let mut detector = TriggerDetector::new();
        let edges =
            detector.find_analog_edges(&[2.0, -2.0, -2.0, 0.5, 2.0, -2.0], 0.0, 1.0, TriggerDirection::Falling);
        assert_eq!(edges, vec![1, 5]);
    }

    #[test]
    fn test_high_and_low_alias_edges() {
        let samples = [-1.0, 1.0, -1.0, 1.0];
        let mut rising = TriggerDetector::new();
        let mut high = TriggerDetector::new();
        assert_eq!(
            rising.find_analog_edges(&samples, 0.0, 0.5, TriggerDirection::Rising),
            high.find_analog_edges(&samples, 0.0, 0.5, TriggerDirection::High)
        );
    }

    #[test]
    fn test_edge_across_blocks_reported_once() {
        let mut detector = TriggerDetector::new();
        assert_eq!(
            detector.find_analog_edges(&[-2.0, 2.0], 0.0, 1.0, TriggerDirection::Rising),
            vec![1]
        );
        assert!(detector
            .find_analog_edges(&[2.0, 0.5], 0.0, 1.0, TriggerDirection::Rising)
            .is_empty());
        assert_eq!(
            detector.find_analog_edges(&[-2.0, 3.0], 0.0, 1.0, TriggerDirection::Rising),
            vec![1]
        );

        detector.reset();
        assert_eq!(
            detector.find_analog_edges(&[3.0], 0.0, 1.0, TriggerDirection::Rising),
            vec![0]
        );
    }

    #[test]
    fn test_digital_edges() {
        let samples = [0b0000, 0b0100, 0b0110, 0b0010, 0b0100];
        let mut detector = TriggerDetector::new();
        assert_eq!(
            detector.find_digital_edges(&samples, 0b0100, TriggerDirection::Rising),
            vec![1, 4]
        );

        let mut detector = TriggerDetector::new();
        assert_eq!(
            detector.find_digital_edges(&samples, 0b0100, TriggerDirection::Falling),
            vec![3]
        );
    }
}
