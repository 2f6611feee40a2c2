//! Metadata records attached to sample offsets.
//!
//! Downstream consumers receive tags alongside sample data. Offsets are
//! absolute item counts on the output stream.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-channel acquisition status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ChannelStatus: u32 {
        /// Signal exceeded the configured range
        const OVERFLOW = 0x01;
        /// Sample realignment failed
        const REALIGNMENT_ERROR = 0x02;
        /// Driver could not extract all samples
        const NOT_ALL_DATA_EXTRACTED = 0x04;
        /// Timed out waiting for a write or realignment event
        const TIMEOUT_WAITING_WR_OR_REALIGNMENT_EVENT = 0x08;
    }
}

/// Tag name of [`TagPayload::AcqInfo`].
pub const ACQ_INFO_TAG: &str = "acq_info";
/// Tag name of [`TagPayload::Trigger`].
pub const TRIGGER_TAG: &str = "trigger";
/// Tag name of [`TagPayload::TimebaseInfo`].
pub const TIMEBASE_INFO_TAG: &str = "timebase_info";

/// Output stream a tag belongs to, by physical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagTarget {
    /// Analog channel slot
    Channel(usize),
    /// Digital port slot
    Port(usize),
}

/// Tag contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TagPayload {
    /// Acquisition info at the start of a delivered block.
    AcqInfo {
        /// Capture time, UTC nanoseconds
        timestamp_ns: u64,
        /// Seconds per delivered item
        time_base: f64,
        /// User-requested trigger delay
        user_delay: f64,
        /// Delay actually applied
        actual_delay: f64,
        /// [`ChannelStatus`] bits, 0 for ports
        status: u32,
    },
    /// Trigger marker at a detected edge.
    Trigger {
        /// Downsampling factor in effect
        downsampling_factor: u32,
        /// Edge time, UTC nanoseconds
        timestamp_ns: u64,
        /// Status bits
        status: u32,
    },
    /// Seconds per delivered item; once per arm.
    TimebaseInfo {
        /// Seconds per delivered item
        time_base: f64,
    },
}

impl TagPayload {
    /// Stream tag name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TagPayload::AcqInfo { .. } => ACQ_INFO_TAG,
            TagPayload::Trigger { .. } => TRIGGER_TAG,
            TagPayload::TimebaseInfo { .. } => TIMEBASE_INFO_TAG,
        }
    }
}

/// A metadata record at an absolute output offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Stream the tag is attached to
    pub target: TagTarget,
    /// Absolute item offset
    pub offset: u64,
    /// Contents
    pub payload: TagPayload,
}

impl Tag {
    /// Stream tag name of the payload.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.payload.name()
    }

    /// True for trigger markers.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(self.payload, TagPayload::Trigger { .. })
    }
}
