//! Synthetic signal generation for the simulated digitizer.
//!
//! Raw device samples are a sine with uniform noise. Downsampling reduces
//! them to delivered items the way a scope's on-board aggregation does, and
//! produces a per-item error estimate alongside each value.

use crate::common::MockRng;
use digitizer_core::{ChannelStatus, DownsamplingMode};
use std::f64::consts::TAU;

/// Analog signal parameters, in volts and hertz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalShape {
    /// Sine frequency
    pub frequency_hz: f64,
    /// Peak amplitude
    pub amplitude: f64,
    /// Peak uniform noise
    pub noise: f64,
    /// Phase offset in radians
    pub phase: f64,
}

impl SignalShape {
    /// Noise-free sine value at raw sample `index`.
    ///
    /// Index `zero_crossing` is a rising zero crossing.
    #[must_use]
    pub fn sample(&self, samp_rate: f64, index: i64, zero_crossing: i64) -> f64 {
        let t = (index - zero_crossing) as f64 / samp_rate;
        self.amplitude * (TAU * self.frequency_hz * t + self.phase).sin()
    }

    /// Fill `raw` with samples `start..start + raw.len()`, noise included.
    pub fn fill(&self, samp_rate: f64, start: i64, zero_crossing: i64, rng: &MockRng, raw: &mut [f64]) {
        rng.fill_noise(raw, self.noise);
        for (i, v) in raw.iter_mut().enumerate() {
            *v += self.sample(samp_rate, start + i as i64, zero_crossing);
        }
    }
}

/// Reduce `raw` by `factor` into `values`/`errors`.
///
/// `base_error` is the device's vertical precision in volts. Returns the
/// number of items written: `raw.len() / factor`, bounded by the output.
pub fn reduce(
    mode: DownsamplingMode,
    factor: usize,
    raw: &[f64],
    base_error: f32,
    values: &mut [f32],
    errors: &mut [f32],
) -> usize {
    let factor = if mode == DownsamplingMode::None {
        1
    } else {
        factor.max(1)
    };
    let n = (raw.len() / factor).min(values.len()).min(errors.len());

    for (i, group) in raw.chunks_exact(factor).take(n).enumerate() {
        let (value, error) = match mode {
            DownsamplingMode::None | DownsamplingMode::Decimate => (group[0], f64::from(base_error)),
            DownsamplingMode::Average => {
                let mean = group.iter().sum::<f64>() / factor as f64;
                (mean, f64::from(base_error) / (factor as f64).sqrt())
            }
            DownsamplingMode::MinMaxAgg => {
                let (min, max) = group
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                ((max + min) / 2.0, (max - min) / 4.0)
            }
        };
        values[i] = value as f32;
        errors[i] = error as f32;
    }
    n
}

/// Status flags for one delivered channel block.
#[must_use]
pub fn channel_status(values: &[f32], range: f64) -> ChannelStatus {
    let limit = range as f32;
    if values.iter().any(|v| v.abs() > limit) {
        ChannelStatus::OVERFLOW
    } else {
        ChannelStatus::empty()
    }
}

/// Counting bit pattern: item `i` carries `start + i`, wrapping at 256.
pub fn port_pattern(start: u64, out: &mut [u8]) {
    for (i, v) in out.iter_mut().enumerate() {
        *v = (start.wrapping_add(i as u64) & 0xFF) as u8;
    }
}
