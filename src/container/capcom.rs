//! Capcom's wrapper [Ultra Street Fighter II (Switch), Resident Evil: Revelations (Switch)].
//!
//! | Offset | Field | Size |
//! |---|---|---|
//! |0x00|samples per channel|4|
//! |0x04|channel count, 6 = three interleaved stereo streams|4|
//! |0x08|loop start, loop end (all ones if disabled)|8|
//! |0x10|marker (0xF8), the reference tooling calls it frame size|4|
//! |0x14|extra chunk count|4|
//! |0x18|reserved|4|
//! |0x1C|data offset (0x30)|4|
//! |0x20|config data, opaque|16|
//!
//! A standard basic info chunk follows at the data offset.

use super::cursor::{Reader, Writer};
use super::LoopRange;
use crate::error::Result;

pub const CAPCOM_HEADER_SIZE: usize = 0x30;
pub const CAPCOM_MARKER: u32 = 0xF8;
/// Loop info of a stream that does not loop.
pub const LOOP_DISABLED: u64 = u64::MAX;
pub const CONFIG_DATA_OFFSET: usize = 0x20;

/// Config block written when no reference file is around to copy it from.
///
/// The words `0x0077C102 0x04000000 0xE107070C 0x00000000`, little-endian.
pub const DEFAULT_CONFIG_DATA: [u8; 16] = [
    0x02, 0xC1, 0x77, 0x00, //
    0x00, 0x00, 0x00, 0x04, //
    0x0C, 0x07, 0x07, 0xE1, //
    0x00, 0x00, 0x00, 0x00,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapcomHeader {
    pub samples_per_channel: u32,
    pub channel_count: u32,
    pub loop_range: LoopRange,
    pub marker: u32,
    pub extra_chunk_count: u32,
    pub reserved: u32,
    pub data_offset: u32,
    pub config_data: [u8; 16],
}

impl CapcomHeader {
    pub fn new(samples_per_channel: u32, channel_count: u32, loop_range: LoopRange, config_data: [u8; 16]) -> Self {
        Self {
            samples_per_channel,
            channel_count,
            loop_range,
            marker: CAPCOM_MARKER,
            extra_chunk_count: 0,
            reserved: 0,
            data_offset: CAPCOM_HEADER_SIZE as u32,
            config_data,
        }
    }

    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = Reader::at(buf, offset);

        let samples_per_channel = reader.u32_le()?;
        let channel_count = reader.u32_le()?;
        let loop_range = decode_loop(reader.u64_le()?);

        Ok(Self {
            samples_per_channel,
            channel_count,
            loop_range,
            marker: reader.u32_le()?,
            extra_chunk_count: reader.u32_le()?,
            reserved: reader.u32_le()?,
            data_offset: reader.u32_le()?,
            config_data: reader.array()?,
        })
    }

    pub fn write(&self, writer: &mut Writer) {
        writer.u32_le(self.samples_per_channel);
        writer.u32_le(self.channel_count);
        writer.u64_le(encode_loop(&self.loop_range));
        writer.u32_le(self.marker);
        writer.u32_le(self.extra_chunk_count);
        writer.u32_le(self.reserved);
        writer.u32_le(self.data_offset);
        writer.bytes(&self.config_data);
    }

    /// Six channels are stored as three interleaved stereo streams.
    pub fn is_layered(&self) -> bool {
        self.channel_count == 6
    }
}

/// Packs a loop so that a little-endian write puts `start` then `end`.
pub fn encode_loop(range: &LoopRange) -> u64 {
    if range.enabled {
        ((range.end as u64) << 32) | range.start as u64
    } else {
        LOOP_DISABLED
    }
}

/// A loop is on when its end is positive, which also rules out the
/// all-ones sentinel (-1 as a signed field).
pub fn decode_loop(raw: u64) -> LoopRange {
    let start = raw as u32;
    let end = (raw >> 32) as u32;
    if (end as i32) > 0 {
        LoopRange::new(start, end)
    } else {
        LoopRange::DISABLED
    }
}
