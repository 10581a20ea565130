//! Byte layouts of the Nintendo Opus container family.
//!
//! A Nintendo Opus stream is a small chain of little-endian chunks:
//!
//! ```text
//! 0x80000001  basic info    channels, rate, data/context offsets, pre-skip
//! 0x80000003  context info  optional, loop points [Famicom Detective Club]
//! 0x80000004  data info     size, then packets
//! 0x80000005  multistream   optional, right after the basic info chunk
//! ```
//!
//! Each packet inside the data chunk is prefixed by its length and the
//! encoder's final range, both big-endian. Vendor wrappers such as Capcom's
//! put their own header in front and point at a nested basic info chunk.
//!
//! Everything here is pure serialization: readers borrow the caller's buffer
//! and writers append to an owned [`cursor::Writer`].

pub mod capcom;
pub mod cursor;
pub mod standard;

use tracing::warn;

use crate::error::{Error, Result};

pub use capcom::CapcomHeader;
pub use standard::{ContextChunk, DataChunk, MultistreamChunk, PacketIter, PacketRef, StandardHeader};

/// Sample rates Opus can run at.
pub const SAMPLE_RATES: [u32; 5] = [48000, 24000, 16000, 12000, 8000];

/// Rate the decoder always runs at; every container counts samples in it.
pub const PLAYBACK_RATE: u32 = 48000;

pub fn validate_sample_rate(sample_rate: u32) -> Result<u32> {
    if SAMPLE_RATES.contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(Error::InvalidSampleRate(sample_rate))
    }
}

/// Channel layout and timing shared by every container in the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamDescriptor {
    /// 1, 2, or 6 for Capcom's layered streams.
    pub channel_count: u8,
    /// Declared rate. Kept as written even though decoding happens at
    /// [`PLAYBACK_RATE`].
    pub sample_rate: u32,
    pub pre_skip: u16,
}

/// Loop points in samples per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopRange {
    pub start: u32,
    pub end: u32,
    pub enabled: bool,
}

impl LoopRange {
    pub const DISABLED: Self = Self {
        start: 0,
        end: 0,
        enabled: false,
    };

    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            enabled: true,
        }
    }

    /// Loop covering the whole stream.
    pub fn full(total_samples: u32) -> Self {
        Self::new(0, total_samples)
    }

    /// Enforces `start < end <= total_samples`.
    ///
    /// An end past the stream is clamped; an empty or inverted range turns the
    /// loop off with both points reset to zero.
    pub fn validated(self, total_samples: u32) -> Self {
        if !self.enabled {
            return Self::DISABLED;
        }

        let mut end = self.end;
        if end > total_samples {
            warn!(end, total_samples, "loop end exceeds sample count, clamping");
            end = total_samples;
        }

        if self.start >= end {
            warn!(start = self.start, end, "loop start must be less than loop end, disabling loop");
            return Self::DISABLED;
        }

        Self::new(self.start, end)
    }
}

/// One encoded frame on its way into a data chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub payload: Vec<u8>,
    pub final_range: u32,
}

impl Packet {
    /// Bytes the packet occupies in a data chunk, prefix included.
    pub fn wire_len(&self) -> usize {
        standard::PACKET_HEADER_SIZE + self.payload.len()
    }
}
