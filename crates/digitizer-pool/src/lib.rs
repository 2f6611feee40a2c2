//! Bounded chunk pool for digitizer sample data.
//!
//! Moves multi-channel sample blocks from an acquisition callback (producer)
//! to the consuming thread with explicit backpressure and bounded memory:
//!
//! - [`ChunkPool`]: fixed set of [`DataChunk`]s cycling between a lock-free
//!   free queue and a lock-free filled queue, plus a mutex/condvar signal for
//!   "data ready or error posted"
//! - [`ChunkHandle`]: exclusive loan of one chunk, returned on drop
//! - [`ChunkGeometry`]: enabled channel/port counts and samples per chunk
//!
//! The producer never blocks. When the free queue is empty it drops the
//! incoming block and records it in the next chunk's `lost_count`.
//!
//! # Example
//!
//! ```
//! use digitizer_pool::{ChunkGeometry, ChunkPool};
//!
//! let geometry = ChunkGeometry::new(1, 0, 4);
//! let pool: ChunkPool<u32> = ChunkPool::new();
//! pool.initialize(geometry, 2);
//!
//! // Producer side
//! if let Some(mut chunk) = pool.get_free_chunk() {
//!     chunk.channel_mut(0).0.copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
//!     chunk.local_timestamp_ns = 1_000;
//!     pool.publish_filled(chunk);
//! }
//!
//! // Consumer side
//! pool.wait_ready().unwrap();
//! let mut values = vec![0.0f32; 4];
//! let mut errors = vec![0.0f32; 4];
//! let mut status = Vec::new();
//! let taken = pool
//!     .take_filled(&mut [&mut values[..]], &mut [&mut errors[..]], &mut [], &mut status)
//!     .unwrap();
//! assert_eq!(taken.local_timestamp_ns, 1_000);
//! assert_eq!(values, [0.1, 0.2, 0.3, 0.4]);
//! ```

pub mod chunk;
pub mod pool;

pub use chunk::{ChunkGeometry, DataChunk};
pub use pool::{ChunkHandle, ChunkPool, PoolError, PoolMetrics, TakenChunk, MAX_CHUNKS};
