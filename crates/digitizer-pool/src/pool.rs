//! Bounded chunk pool shared by one producer and one consumer.
//!
//! # Hand-off Model
//!
//! ```text
//!            get_free_chunk()                 publish_filled()
//!   [free] ------------------> producer --------------------> [filled]
//!      ^                                                          |
//!      |                  take_filled() (copy out)                |
//!      +---------------------------- consumer <-------------------+
//! ```
//!
//! Both queues are lock-free (`crossbeam_queue::ArrayQueue`). The only mutex in
//! the pool guards the "data ready or error posted" signal that the consumer
//! sleeps on, so producers never block on consumers.
//!
//! Chunks move by ownership: a chunk is in the free queue, the filled queue,
//! or held by exactly one [`ChunkHandle`]. Dropping a handle without publishing
//! it returns the chunk to the free queue.

use crate::chunk::{ChunkGeometry, DataChunk};
use crossbeam_queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hard cap on the number of chunks a pool can own.
pub const MAX_CHUNKS: usize = 8192;

/// Contract violations reported by [`ChunkPool::take_filled`].
///
/// These signal a programming error in the caller, not a recoverable
/// acquisition condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `take_filled` called with an empty filled queue.
    #[error("no filled chunk available; wait_ready must succeed before take_filled")]
    NoFilledChunk,

    /// `take_filled` called while an error is posted.
    #[error("an error is posted on the pool; wait_ready must succeed before take_filled")]
    SignalPending,

    /// Output slices do not match the pool geometry.
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    GeometryMismatch {
        /// Which dimension did not match
        what: &'static str,
        /// Size required by the pool geometry
        expected: usize,
        /// Size supplied by the caller
        actual: usize,
    },
}

/// Metadata of a chunk copied out by [`ChunkPool::take_filled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakenChunk {
    /// Capture time of the last sample, UTC nanoseconds.
    pub local_timestamp_ns: u64,
    /// Chunks lost since the previously published chunk.
    pub lost_count: u32,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetrics {
    /// Chunks owned by the current pool generation.
    pub nr_chunks: usize,
    /// Payload bytes per chunk.
    pub chunk_size_bytes: usize,
    /// Chunks currently in the free queue.
    pub free: usize,
    /// Chunks currently in the filled queue.
    pub filled: usize,
    /// Total chunks published since the last initialize.
    pub published: u64,
    /// Total chunks taken by the consumer since the last initialize.
    pub taken: u64,
    /// Times a producer found the free queue empty.
    pub free_misses: u64,
}

struct Signal<E> {
    error: Option<E>,
}

struct ChunkPoolInner<E> {
    free: ArrayQueue<Box<DataChunk>>,
    filled: ArrayQueue<Box<DataChunk>>,
    /// Mutex protects the signal only, never the queues.
    signal: Mutex<Signal<E>>,
    ready: Condvar,
    /// Mirrors `signal.error.is_some()` for the lock-free take path.
    error_posted: AtomicBool,
    generation: AtomicU64,
    nr_chunks: AtomicUsize,
    chunk_size_bytes: AtomicUsize,
    published: AtomicU64,
    taken: AtomicU64,
    free_misses: AtomicU64,
}

impl<E> ChunkPoolInner<E> {
    fn recycle(&self, chunk: Box<DataChunk>) {
        if chunk.generation != self.generation.load(Ordering::Acquire) {
            debug!(generation = chunk.generation, "Discarding chunk from previous pool generation");
            return;
        }
        if self.free.push(chunk).is_err() {
            warn!("Free queue full while recycling chunk");
        }
    }
}

/// Bounded pool of [`DataChunk`]s with an error/ready signal.
///
/// Cloning is cheap and yields another handle to the same pool. `E` is the
/// error code posted through [`notify_error`](Self::notify_error).
pub struct ChunkPool<E> {
    inner: Arc<ChunkPoolInner<E>>,
}

impl<E> Clone for ChunkPool<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for ChunkPool<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkPool")
            .field("nr_chunks", &self.inner.nr_chunks.load(Ordering::Relaxed))
            .field("free", &self.inner.free.len())
            .field("filled", &self.inner.filled.len())
            .finish()
    }
}

impl<E: Clone + Send + 'static> Default for ChunkPool<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> ChunkPool<E> {
    /// Create an empty pool. Call [`initialize`](Self::initialize) before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChunkPoolInner {
                free: ArrayQueue::new(MAX_CHUNKS),
                filled: ArrayQueue::new(MAX_CHUNKS),
                signal: Mutex::new(Signal { error: None }),
                ready: Condvar::new(),
                error_posted: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                nr_chunks: AtomicUsize::new(0),
                chunk_size_bytes: AtomicUsize::new(0),
                published: AtomicU64::new(0),
                taken: AtomicU64::new(0),
                free_misses: AtomicU64::new(0),
            }),
        }
    }

    /// (Re)allocate `nr_chunks` chunks of the given geometry.
    ///
    /// `nr_chunks` is clamped to [`MAX_CHUNKS`]. Both queues and the error
    /// signal are reset. Must be called while nothing is producing data;
    /// handles still checked out from a previous generation are discarded when
    /// they come back.
    ///
    /// Returns the number of chunks actually allocated.
    pub fn initialize(&self, geometry: ChunkGeometry, nr_chunks: usize) -> usize {
        let nr_chunks = if nr_chunks > MAX_CHUNKS {
            warn!(requested = nr_chunks, max = MAX_CHUNKS, "Clamping chunk count");
            MAX_CHUNKS
        } else {
            nr_chunks
        };

        let mut signal = self.inner.signal.lock();

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        while self.inner.free.pop().is_some() {}
        while self.inner.filled.pop().is_some() {}

        for _ in 0..nr_chunks {
            let chunk = Box::new(DataChunk::new(geometry, generation));
            if self.inner.free.push(chunk).is_err() {
                warn!("Free queue full during initialize");
                break;
            }
        }

        self.inner.nr_chunks.store(nr_chunks, Ordering::Release);
        self.inner
            .chunk_size_bytes
            .store(geometry.size_bytes(), Ordering::Release);
        self.inner.published.store(0, Ordering::Relaxed);
        self.inner.taken.store(0, Ordering::Relaxed);
        self.inner.free_misses.store(0, Ordering::Relaxed);

        signal.error = None;
        self.inner.error_posted.store(false, Ordering::Release);

        info!(
            nr_chunks,
            channels = geometry.channels,
            ports = geometry.ports,
            chunk_size = geometry.chunk_size,
            chunk_size_bytes = geometry.size_bytes(),
            "Chunk pool initialized"
        );

        nr_chunks
    }

    /// Pop a free chunk without blocking.
    ///
    /// Returns `None` when the pool is exhausted; the caller must drop the
    /// incoming sample block and count it as lost.
    #[must_use]
    pub fn get_free_chunk(&self) -> Option<ChunkHandle<E>> {
        match self.inner.free.pop() {
            Some(chunk) => Some(ChunkHandle {
                chunk: Some(chunk),
                pool: Arc::clone(&self.inner),
            }),
            None => {
                self.inner.free_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Push a filled chunk and wake one waiter.
    pub fn publish_filled(&self, mut handle: ChunkHandle<E>) {
        let Some(chunk) = handle.chunk.take() else {
            return;
        };

        if chunk.generation != self.inner.generation.load(Ordering::Acquire) {
            debug!("Dropping chunk published after pool re-initialization");
            return;
        }

        if let Err(chunk) = self.inner.filled.push(chunk) {
            warn!("Filled queue full, recycling chunk");
            self.inner.recycle(chunk);
            return;
        }
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        // Taking the lock orders the push before a consumer's emptiness check.
        drop(self.inner.signal.lock());
        self.inner.ready.notify_one();
    }

    /// Block until a filled chunk is available or an error is posted.
    ///
    /// A posted error takes precedence and is returned without being cleared.
    pub fn wait_ready(&self) -> Result<(), E> {
        let mut signal = self.inner.signal.lock();
        loop {
            if let Some(error) = &signal.error {
                return Err(error.clone());
            }
            if !self.inner.filled.is_empty() {
                return Ok(());
            }
            self.inner.ready.wait(&mut signal);
        }
    }

    /// Like [`wait_ready`](Self::wait_ready) but gives up after `timeout`.
    ///
    /// Returns `Ok(true)` when data is ready and `Ok(false)` on timeout.
    pub fn wait_ready_timeout(&self, timeout: Duration) -> Result<bool, E> {
        let deadline = Instant::now() + timeout;
        let mut signal = self.inner.signal.lock();
        loop {
            if let Some(error) = &signal.error {
                return Err(error.clone());
            }
            if !self.inner.filled.is_empty() {
                return Ok(true);
            }
            if self.inner.ready.wait_until(&mut signal, deadline).timed_out() {
                if let Some(error) = &signal.error {
                    return Err(error.clone());
                }
                return Ok(!self.inner.filled.is_empty());
            }
        }
    }

    /// Post an error and wake all waiters.
    pub fn notify_error(&self, error: E) {
        {
            let mut signal = self.inner.signal.lock();
            signal.error = Some(error);
            self.inner.error_posted.store(true, Ordering::Release);
        }
        self.inner.ready.notify_all();
    }

    /// Clear a posted error.
    pub fn clear_error(&self) {
        let mut signal = self.inner.signal.lock();
        signal.error = None;
        self.inner.error_posted.store(false, Ordering::Release);
    }

    /// Currently posted error, if any.
    #[must_use]
    pub fn pending_error(&self) -> Option<E> {
        self.inner.signal.lock().error.clone()
    }

    /// Copy the oldest filled chunk into caller-owned slices.
    ///
    /// `values`, `errors` and `ports` must hold one slice per enabled channel
    /// or port, each at least `chunk_size` long. `status` is replaced with the
    /// chunk's per-channel status words. The chunk goes back to the free queue.
    ///
    /// Must only follow a successful [`wait_ready`](Self::wait_ready).
    pub fn take_filled(
        &self,
        values: &mut [&mut [f32]],
        errors: &mut [&mut [f32]],
        ports: &mut [&mut [u8]],
        status: &mut Vec<u32>,
    ) -> Result<TakenChunk, PoolError> {
        if self.inner.error_posted.load(Ordering::Acquire) {
            return Err(PoolError::SignalPending);
        }
        let chunk = self.inner.filled.pop().ok_or(PoolError::NoFilledChunk)?;

        if let Err(e) = check_outputs(chunk.geometry(), values, errors, ports) {
            self.inner.recycle(chunk);
            return Err(e);
        }

        let n = chunk.chunk_size();
        for (channel, (value_out, error_out)) in values.iter_mut().zip(errors.iter_mut()).enumerate() {
            value_out[..n].copy_from_slice(chunk.values(channel));
            error_out[..n].copy_from_slice(chunk.errors(channel));
        }
        for (port, port_out) in ports.iter_mut().enumerate() {
            port_out[..n].copy_from_slice(chunk.port(port));
        }
        status.clear();
        status.extend_from_slice(chunk.status());

        let taken = TakenChunk {
            local_timestamp_ns: chunk.local_timestamp_ns,
            lost_count: chunk.lost_count,
        };

        self.inner.taken.fetch_add(1, Ordering::Relaxed);
        self.inner.recycle(chunk);

        Ok(taken)
    }

    /// Number of chunks owned by the current generation.
    #[must_use]
    pub fn nr_chunks(&self) -> usize {
        self.inner.nr_chunks.load(Ordering::Acquire)
    }

    /// Chunks currently waiting in the free queue.
    #[must_use]
    pub fn free_len(&self) -> usize {
        self.inner.free.len()
    }

    /// Chunks currently waiting in the filled queue.
    #[must_use]
    pub fn filled_len(&self) -> usize {
        self.inner.filled.len()
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            nr_chunks: self.nr_chunks(),
            chunk_size_bytes: self.inner.chunk_size_bytes.load(Ordering::Acquire),
            free: self.free_len(),
            filled: self.filled_len(),
            published: self.inner.published.load(Ordering::Relaxed),
            taken: self.inner.taken.load(Ordering::Relaxed),
            free_misses: self.inner.free_misses.load(Ordering::Relaxed),
        }
    }
}

fn check_outputs(
    geometry: ChunkGeometry,
    values: &[&mut [f32]],
    errors: &[&mut [f32]],
    ports: &[&mut [u8]],
) -> Result<(), PoolError> {
    let mismatch = |what, expected, actual| PoolError::GeometryMismatch {
        what,
        expected,
        actual,
    };

    if values.len() != geometry.channels {
        return Err(mismatch("value outputs", geometry.channels, values.len()));
    }
    if errors.len() != geometry.channels {
        return Err(mismatch("error outputs", geometry.channels, errors.len()));
    }
    if ports.len() != geometry.ports {
        return Err(mismatch("port outputs", geometry.ports, ports.len()));
    }
    let shortest = values
        .iter()
        .map(|s| s.len())
        .chain(errors.iter().map(|s| s.len()))
        .chain(ports.iter().map(|s| s.len()))
        .min();
    match shortest {
        Some(len) if len < geometry.chunk_size => {
            Err(mismatch("output length", geometry.chunk_size, len))
        }
        _ => Ok(()),
    }
}

/// Exclusive loan of one chunk.
///
/// Dereferences to [`DataChunk`]. Hand it back with
/// [`ChunkPool::publish_filled`]; dropping it returns the chunk to the free
/// queue instead.
pub struct ChunkHandle<E> {
    chunk: Option<Box<DataChunk>>,
    pool: Arc<ChunkPoolInner<E>>,
}

impl<E> Deref for ChunkHandle<E> {
    type Target = DataChunk;

    fn deref(&self) -> &DataChunk {
        // Only `publish_filled` and `drop` take the chunk, both consume the handle.
        match &self.chunk {
            Some(chunk) => chunk,
            None => unreachable!("chunk handle used after release"),
        }
    }
}

impl<E> DerefMut for ChunkHandle<E> {
    fn deref_mut(&mut self) -> &mut DataChunk {
        match &mut self.chunk {
            Some(chunk) => chunk,
            None => unreachable!("chunk handle used after release"),
        }
    }
}

impl<E> Drop for ChunkHandle<E> {
    fn drop(&mut self) {
        if let Some(chunk) = self.chunk.take() {
            self.pool.recycle(chunk);
        }
    }
}

impl<E> fmt::Debug for ChunkHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkHandle")
            .field("geometry", &self.chunk.as_ref().map(|c| c.geometry()))
            .finish()
    }
}
