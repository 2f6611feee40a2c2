//! Fixed-size sample chunk moved between the free and filled queues.
//!
//! A chunk holds exactly `chunk_size` samples for every *enabled* analog channel
//! and digital port. Memory is organized the same way the acquisition hardware
//! delivers it:
//!
//! ```text
//! <chan 1 values> <chan 1 errors> <chan 2 values> <chan 2 errors> ...
//! <port 1 samples> <port 2 samples> ...
//! ```
//!
//! Analog samples and their error estimates are `f32`, port samples are one
//! byte each. The payload is kept as two typed regions: one contiguous `f32`
//! region for all channels and one contiguous byte region for all ports.
//! Storage is allocated once when the pool is initialized and then recycled
//! indefinitely.

use std::mem::size_of;

/// Shape shared by every chunk of one pool generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkGeometry {
    /// Number of enabled analog channels.
    pub channels: usize,
    /// Number of enabled digital ports.
    pub ports: usize,
    /// Samples per channel (and per port) in one chunk.
    pub chunk_size: usize,
}

impl ChunkGeometry {
    /// Create a geometry description.
    #[must_use]
    pub const fn new(channels: usize, ports: usize, chunk_size: usize) -> Self {
        Self {
            channels,
            ports,
            chunk_size,
        }
    }

    /// Payload size of one chunk in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.ports * self.chunk_size + self.channels * self.chunk_size * size_of::<f32>() * 2
    }
}

/// One application-buffer unit.
///
/// `analog` holds the value/error blocks of all enabled channels back to back,
/// `digital` the port blocks. Together they are exactly
/// [`ChunkGeometry::size_bytes`] bytes.
#[derive(Debug, Clone)]
pub struct DataChunk {
    geometry: ChunkGeometry,
    /// Pool generation this chunk was allocated for.
    pub(crate) generation: u64,
    analog: Vec<f32>,
    digital: Vec<u8>,
    status: Vec<u32>,
    /// Capture time of the chunk's last sample, UTC nanoseconds.
    pub local_timestamp_ns: u64,
    /// Chunks dropped immediately before this one because the pool was exhausted.
    pub lost_count: u32,
}

impl DataChunk {
    pub(crate) fn new(geometry: ChunkGeometry, generation: u64) -> Self {
        Self {
            geometry,
            generation,
            analog: vec![0.0; geometry.channels * geometry.chunk_size * 2],
            digital: vec![0; geometry.ports * geometry.chunk_size],
            status: vec![0; geometry.channels],
            local_timestamp_ns: 0,
            lost_count: 0,
        }
    }

    /// Geometry this chunk was allocated with.
    #[must_use]
    pub fn geometry(&self) -> ChunkGeometry {
        self.geometry
    }

    /// Samples per channel/port.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.geometry.chunk_size
    }

    fn value_range(&self, channel: usize) -> std::ops::Range<usize> {
        let start = channel * self.geometry.chunk_size * 2;
        start..start + self.geometry.chunk_size
    }

    fn error_range(&self, channel: usize) -> std::ops::Range<usize> {
        let start = channel * self.geometry.chunk_size * 2 + self.geometry.chunk_size;
        start..start + self.geometry.chunk_size
    }

    fn port_range(&self, port: usize) -> std::ops::Range<usize> {
        let start = port * self.geometry.chunk_size;
        start..start + self.geometry.chunk_size
    }

    /// Values of the `channel`-th enabled analog channel.
    ///
    /// Panics if `channel` is outside the chunk geometry.
    #[must_use]
    pub fn values(&self, channel: usize) -> &[f32] {
        &self.analog[self.value_range(channel)]
    }

    /// Error estimates of the `channel`-th enabled analog channel.
    #[must_use]
    pub fn errors(&self, channel: usize) -> &[f32] {
        &self.analog[self.error_range(channel)]
    }

    /// Mutable values and error estimates of one enabled analog channel.
    pub fn channel_mut(&mut self, channel: usize) -> (&mut [f32], &mut [f32]) {
        let start = channel * self.geometry.chunk_size * 2;
        let block = &mut self.analog[start..start + self.geometry.chunk_size * 2];
        block.split_at_mut(self.geometry.chunk_size)
    }

    /// Samples of the `port`-th enabled digital port.
    #[must_use]
    pub fn port(&self, port: usize) -> &[u8] {
        &self.digital[self.port_range(port)]
    }

    /// Mutable samples of one enabled digital port.
    pub fn port_mut(&mut self, port: usize) -> &mut [u8] {
        let range = self.port_range(port);
        &mut self.digital[range]
    }

    /// Status word per enabled analog channel.
    #[must_use]
    pub fn status(&self) -> &[u32] {
        &self.status
    }

    /// Mutable status words.
    pub fn status_mut(&mut self) -> &mut [u32] {
        &mut self.status
    }
}
