//! Progress cursor for draining rapid-block captures across several pulls.

/// Phase of a rapid-block read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RapidBlockPhase {
    /// Waiting for the next capture
    #[default]
    Waiting,
    /// About to read the first part of a waveform
    ReadingPart1,
    /// Draining the remainder of a waveform
    ReadingTheRest,
}

/// Which waveform is being read and how much of it is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RapidBlockState {
    /// Current phase
    pub phase: RapidBlockPhase,
    /// Waveforms in the current capture
    pub waveform_count: usize,
    /// Waveform being read
    pub waveform_idx: usize,
    /// Items of the current waveform already delivered
    pub offset: usize,
    /// Items of the current waveform still to deliver
    pub samples_left: usize,
}

impl RapidBlockState {
    /// Start reading a capture of `waveform_count` waveforms.
    pub fn initialize(&mut self, waveform_count: usize) {
        self.phase = RapidBlockPhase::ReadingPart1;
        self.waveform_count = waveform_count;
        self.waveform_idx = 0;
        self.offset = 0;
        self.samples_left = 0;
    }

    /// Set the read window of the current waveform.
    pub fn set_waveform_params(&mut self, offset: usize, samples: usize) {
        self.offset = offset;
        self.samples_left = samples;
    }

    /// Account for `nr_samples` delivered items and advance the phase.
    pub fn update_state(&mut self, nr_samples: usize) {
        self.offset += nr_samples;
        self.samples_left = self.samples_left.saturating_sub(nr_samples);

        if self.samples_left > 0 {
            self.phase = RapidBlockPhase::ReadingTheRest;
        } else {
            self.waveform_idx += 1;
            self.phase = if self.waveform_idx >= self.waveform_count {
                RapidBlockPhase::Waiting
            } else {
                RapidBlockPhase::ReadingPart1
            };
        }
    }

    /// Back to `Waiting`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
