//! Caller-owned output slots for [`produce`](crate::DigitizerSource::produce).

use crate::tags::Tag;

/// Per-slot output storage, indexed by physical channel/port.
///
/// Disabled slots are left untouched. Each call to `produce` writes from
/// index 0 and replaces `tags` with the tags of that call.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffers {
    /// Sample values per analog channel slot
    pub values: Vec<Vec<f32>>,
    /// Error estimates per analog channel slot
    pub errors: Vec<Vec<f32>>,
    /// Samples per digital port slot
    pub ports: Vec<Vec<u8>>,
    /// Tags emitted by the last call, with absolute offsets
    pub tags: Vec<Tag>,
}

impl OutputBuffers {
    /// Allocate `capacity` items for every channel and port slot.
    #[must_use]
    pub fn new(ai_channels: usize, ports: usize, capacity: usize) -> Self {
        Self {
            values: vec![vec![0.0; capacity]; ai_channels],
            errors: vec![vec![0.0; capacity]; ai_channels],
            ports: vec![vec![0; capacity]; ports],
            tags: Vec::new(),
        }
    }

    /// Items every slot can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values
            .iter()
            .chain(self.errors.iter())
            .map(Vec::len)
            .chain(self.ports.iter().map(Vec::len))
            .min()
            .unwrap_or(0)
    }

    /// Mutable value and error slices of the enabled channels, `len` items each.
    pub(crate) fn channel_slices<'a>(
        values: &'a mut [Vec<f32>],
        errors: &'a mut [Vec<f32>],
        enabled: &[bool],
        len: usize,
    ) -> (Vec<&'a mut [f32]>, Vec<&'a mut [f32]>) {
        let values = values
            .iter_mut()
            .zip(enabled)
            .filter(|(_, on)| **on)
            .map(|(v, _)| &mut v[..len])
            .collect();
        let errors = errors
            .iter_mut()
            .zip(enabled)
            .filter(|(_, on)| **on)
            .map(|(e, _)| &mut e[..len])
            .collect();
        (values, errors)
    }

    /// Mutable slices of the enabled ports, `len` items each.
    pub(crate) fn port_slices<'a>(
        ports: &'a mut [Vec<u8>],
        enabled: &[bool],
        len: usize,
    ) -> Vec<&'a mut [u8]> {
        ports
            .iter_mut()
            .zip(enabled)
            .filter(|(_, on)| **on)
            .map(|(p, _)| &mut p[..len])
            .collect()
    }
}

/// Outcome of one `produce` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Produced {
    /// `count` items were written to every enabled slot.
    Items {
        /// Items written
        count: usize,
        /// Chunks lost to pool exhaustion before this block
        lost: u32,
    },
    /// Production ended cleanly; do not call again.
    EndOfStream,
}

impl Produced {
    /// Items written, 0 at end of stream.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Produced::Items { count, .. } => *count,
            Produced::EndOfStream => 0,
        }
    }

    /// True at end of stream.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Produced::EndOfStream)
    }
}
