//! The plain Nintendo Opus chunks.

use std::ops::Range;

use super::cursor::{Reader, Writer};
use super::{Packet, PLAYBACK_RATE};
use crate::error::{Error, Result};

/// 'basic info' chunk.
pub const HEADER_ID: u32 = 0x8000_0001;
/// 'context info' chunk, carries loop points.
pub const CONTEXT_ID: u32 = 0x8000_0003;
/// 'data info' chunk.
pub const DATA_ID: u32 = 0x8000_0004;
/// 'multistream info' chunk.
pub const MULTISTREAM_ID: u32 = 0x8000_0005;
/// `OggS` read as a little-endian u32.
pub const OGG_ID: u32 = u32::from_le_bytes(*b"OggS");

pub const VERSION: u8 = 0;
/// Size of the basic info chunk body, exclusive of ID and size.
pub const HEADER_BODY_SIZE: u32 = 0x18;
/// Size of the whole basic info chunk.
pub const HEADER_SIZE: usize = 8 + HEADER_BODY_SIZE as usize;
pub const DATA_CHUNK_HEADER_SIZE: usize = 8;
/// Big-endian length plus big-endian final range.
pub const PACKET_HEADER_SIZE: usize = 8;
/// Offset of the multistream chunk from the basic info chunk.
pub const MULTISTREAM_OFFSET: usize = 0x20;
pub const CONTEXT_BODY_SIZE: u32 = 0x10;

/// The 'basic info' chunk.
///
/// | Offset | Field | Size |
/// |---|---|---|
/// |0x00|chunk ID|4|
/// |0x04|chunk size (0x18)|4|
/// |0x08|version|1|
/// |0x09|channel count|1|
/// |0x0A|frame size, 0 for VBR|2|
/// |0x0C|sample rate|4|
/// |0x10|data offset|4|
/// |0x14|frame data offset, never seen set|4|
/// |0x18|context offset|4|
/// |0x1C|pre-skip|2|
/// |0x1E|padding|2|
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardHeader {
    pub version: u8,
    pub channel_count: u8,
    pub frame_size: u16,
    pub sample_rate: u32,
    /// Relative to the start of this chunk.
    pub data_offset: u32,
    pub frame_data_offset: u32,
    /// Relative to the start of this chunk, 0 if absent.
    pub context_offset: u32,
    pub pre_skip: u16,
    /// Officially padding, non-zero in Lego Movie 2.
    pub padding: u16,
}

impl StandardHeader {
    /// VBR header with the data chunk right behind it.
    pub fn vbr(channel_count: u8, sample_rate: u32, pre_skip: u16) -> Self {
        Self {
            version: VERSION,
            channel_count,
            frame_size: 0,
            sample_rate,
            data_offset: HEADER_SIZE as u32,
            frame_data_offset: 0,
            context_offset: 0,
            pre_skip,
            padding: 0,
        }
    }

    /// Pre-skip in [`PLAYBACK_RATE`] samples. The stored value counts samples
    /// at the declared rate.
    pub fn playback_pre_skip(&self) -> u32 {
        if self.sample_rate == 0 {
            return self.pre_skip as u32;
        }
        (self.pre_skip as u64 * PLAYBACK_RATE as u64 / self.sample_rate as u64) as u32
    }

    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = Reader::at(buf, offset);

        let id = reader.u32_le()?;
        if id == OGG_ID {
            return Err(Error::OggOpus);
        }
        if id != HEADER_ID {
            return Err(Error::MagicMismatch {
                offset,
                expected: HEADER_ID,
                found: id,
            });
        }
        // 0x04: chunk size, 0x18 or 0x24 depending on the encoder
        reader.skip(4)?;

        Ok(Self {
            version: reader.u8()?,
            channel_count: reader.u8()?,
            frame_size: reader.u16_le()?,
            sample_rate: reader.u32_le()?,
            data_offset: reader.u32_le()?,
            frame_data_offset: reader.u32_le()?,
            context_offset: reader.u32_le()?,
            pre_skip: reader.u16_le()?,
            padding: reader.u16_le()?,
        })
    }

    pub fn write(&self, writer: &mut Writer) {
        writer.u32_le(HEADER_ID);
        writer.u32_le(HEADER_BODY_SIZE);
        writer.u8(self.version);
        writer.u8(self.channel_count);
        writer.u16_le(self.frame_size);
        writer.u32_le(self.sample_rate);
        writer.u32_le(self.data_offset);
        writer.u32_le(self.frame_data_offset);
        writer.u32_le(self.context_offset);
        writer.u16_le(self.pre_skip);
        writer.u16_le(self.padding);
    }
}

/// The 'context info' chunk. Offsets relative to the chunk start:
/// `0x09` loop flag, `0x0C` sample count, `0x10` loop start, `0x14` loop end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextChunk {
    pub loop_flag: bool,
    /// Slightly smaller than the count obtained from the packets; seems to
    /// account for encoder delay.
    pub num_samples: i32,
    pub loop_start: i32,
    pub loop_end: i32,
}

impl ContextChunk {
    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = Reader::at(buf, offset);
        reader.expect_u32_le(CONTEXT_ID)?;
        reader.skip(4 + 1)?;
        let loop_flag = reader.u8()? != 0;
        reader.skip(2)?;

        Ok(Self {
            loop_flag,
            num_samples: reader.i32_le()?,
            loop_start: reader.i32_le()?,
            loop_end: reader.i32_le()?,
        })
    }

    /// Disabled loops are written as a cleared flag with zeroed points.
    pub fn write(&self, writer: &mut Writer) {
        writer.u32_le(CONTEXT_ID);
        writer.u32_le(CONTEXT_BODY_SIZE);
        writer.u8(0);
        writer.u8(self.loop_flag as u8);
        writer.u16_le(0);
        writer.u32_le(self.num_samples as u32);
        if self.loop_flag {
            writer.u32_le(self.loop_start as u32);
            writer.u32_le(self.loop_end as u32);
        } else {
            writer.u32_le(0);
            writer.u32_le(0);
        }
    }
}

/// The 'multistream info' chunk [Clannad (Switch)].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultistreamChunk {
    pub stream_count: u8,
    /// Stereo streams among `stream_count`.
    pub coupled_count: u8,
    channels: u8,
    channel_mapping: [u8; 8],
}

impl MultistreamChunk {
    /// Looks for the chunk right after the basic info chunk at
    /// `header_offset`. Only streams of up to 8 channels carry a mapping.
    pub fn find(buf: &[u8], header_offset: usize, channels: u8) -> Result<Option<Self>> {
        let offset = header_offset + MULTISTREAM_OFFSET;
        let mut reader = Reader::at(buf, offset);
        match reader.u32_le() {
            Ok(MULTISTREAM_ID) => {}
            _ => return Ok(None),
        }
        reader.skip(4)?;

        let stream_count = reader.u8()?;
        let coupled_count = reader.u8()?;
        let channels = channels.min(8);
        let mut channel_mapping = [0u8; 8];
        channel_mapping[..channels as usize].copy_from_slice(reader.bytes(channels as usize)?);

        Ok(Some(Self {
            stream_count,
            coupled_count,
            channels,
            channel_mapping,
        }))
    }

    pub fn channel_mapping(&self) -> &[u8] {
        &self.channel_mapping[..self.channels as usize]
    }
}

/// The 'data info' chunk, located but not copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChunk {
    /// Absolute offset of the chunk ID.
    pub offset: usize,
    /// Bytes of packet data following the chunk header.
    pub size: u32,
}

impl DataChunk {
    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let mut reader = Reader::at(buf, offset);
        reader.expect_u32_le(DATA_ID)?;
        let size = reader.u32_le()?;
        // the packet data itself must be there too
        reader.skip(size as usize)?;

        Ok(Self { offset, size })
    }

    /// Absolute range of the packet bytes.
    pub fn packets_range(&self) -> Range<usize> {
        let start = self.offset + DATA_CHUNK_HEADER_SIZE;
        start..start + self.size as usize
    }

    pub fn packets<'a>(&self, buf: &'a [u8]) -> PacketIter<'a> {
        PacketIter::new(buf.get(self.packets_range()).unwrap_or_default())
    }
}

/// A packet borrowed from a data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRef<'a> {
    pub final_range: u32,
    pub payload: &'a [u8],
}

/// Walks the length-prefixed packets of a data chunk.
#[derive(Debug, Clone)]
pub struct PacketIter<'a> {
    reader: Reader<'a>,
    failed: bool,
}

impl<'a> PacketIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(data),
            failed: false,
        }
    }

    fn next_packet(&mut self) -> Result<PacketRef<'a>> {
        let length = self.reader.u32_be()?;
        let final_range = self.reader.u32_be()?;
        let payload = self.reader.bytes(length as usize)?;
        Ok(PacketRef { final_range, payload })
    }
}

impl<'a> Iterator for PacketIter<'a> {
    type Item = Result<PacketRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.remaining() == 0 {
            return None;
        }
        let packet = self.next_packet();
        self.failed = packet.is_err();
        Some(packet)
    }
}

pub fn write_packet(writer: &mut Writer, payload: &[u8], final_range: u32) {
    writer.u32_be(payload.len() as u32);
    writer.u32_be(final_range);
    writer.bytes(payload);
}

/// Writes a data chunk holding `packets` back to back.
pub fn write_data_chunk(writer: &mut Writer, packets: &[Packet]) {
    let size: usize = packets.iter().map(Packet::wire_len).sum();
    writer.u32_le(DATA_ID);
    writer.u32_le(size as u32);
    for packet in packets {
        write_packet(writer, &packet.payload, packet.final_range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> Vec<u8> {
        let mut writer = Writer::new();
        StandardHeader::vbr(2, 48000, 312).write(&mut writer);
        write_data_chunk(
            &mut writer,
            &[
                Packet {
                    payload: vec![0xFC, 1, 2],
                    final_range: 0x1122_3344,
                },
                Packet {
                    payload: vec![0xFC],
                    final_range: 7,
                },
            ],
        );
        writer.into_inner()
    }

    #[test]
    fn pre_skip_in_playback_samples() {
        assert_eq!(StandardHeader::vbr(1, 48000, 312).playback_pre_skip(), 312);
        assert_eq!(StandardHeader::vbr(1, 16000, 104).playback_pre_skip(), 312);
        assert_eq!(StandardHeader::vbr(2, 8000, 52).playback_pre_skip(), 312);
    }

    #[test]
    fn header_layout() {
        let data = sample_stream();
        assert_eq!(&data[0x00..0x04], &[0x01, 0x00, 0x00, 0x80]);
        assert_eq!(&data[0x04..0x08], &[0x18, 0, 0, 0]);
        assert_eq!(data[0x09], 2);
        assert_eq!(&data[0x0C..0x10], &48000u32.to_le_bytes());
        assert_eq!(&data[0x10..0x14], &[0x20, 0, 0, 0]);
        assert_eq!(&data[0x1C..0x1E], &312u16.to_le_bytes());
        assert_eq!(&data[0x20..0x24], &[0x04, 0x00, 0x00, 0x80]);
        // packet prefixes are big-endian
        assert_eq!(&data[0x28..0x30], &[0, 0, 0, 3, 0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn header_read_back() {
        let data = sample_stream();
        let header = StandardHeader::read(&data, 0).unwrap();
        assert_eq!(header, StandardHeader::vbr(2, 48000, 312));

        let chunk = DataChunk::read(&data, header.data_offset as usize).unwrap();
        assert_eq!(chunk.size, 8 + 3 + 8 + 1);

        let packets: Vec<_> = chunk.packets(&data).collect::<Result<_>>().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload, &[0xFC, 1, 2]);
        assert_eq!(packets[0].final_range, 0x1122_3344);
        assert_eq!(packets[1].final_range, 7);
    }

    #[test]
    fn ogg_is_rejected() {
        let mut data = b"OggS".to_vec();
        data.resize(0x20, 0);
        assert!(matches!(StandardHeader::read(&data, 0), Err(Error::OggOpus)));
    }

    #[test]
    fn data_chunk_larger_than_buffer() {
        let mut data = sample_stream();
        data.truncate(data.len() - 1);
        assert!(matches!(
            DataChunk::read(&data, 0x20),
            Err(Error::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn packet_overrunning_chunk_stops_iteration() {
        // length says 16, only 2 bytes follow
        let data = [0, 0, 0, 16, 0, 0, 0, 0, 0xFC, 0];
        let mut iter = PacketIter::new(&data);
        assert!(matches!(iter.next(), Some(Err(Error::TruncatedBuffer { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn context_chunk_round_trip() {
        let chunk = ContextChunk {
            loop_flag: true,
            num_samples: 96000,
            loop_start: 1000,
            loop_end: 90000,
        };
        let mut writer = Writer::new();
        chunk.write(&mut writer);
        let data = writer.into_inner();
        assert_eq!(data.len(), 0x18);
        assert_eq!(ContextChunk::read(&data, 0).unwrap(), chunk);
    }

    #[test]
    fn disabled_context_loop_writes_zeroes() {
        let chunk = ContextChunk {
            loop_flag: false,
            num_samples: 10,
            loop_start: 5,
            loop_end: 9,
        };
        let mut writer = Writer::new();
        chunk.write(&mut writer);
        let data = writer.into_inner();
        assert_eq!(&data[0x10..0x18], &[0u8; 8]);
    }

    #[test]
    fn multistream_chunk() {
        let mut data = vec![0u8; 0x20];
        data.extend_from_slice(&MULTISTREAM_ID.to_le_bytes());
        data.extend_from_slice(&[0x0C, 0, 0, 0]);
        data.extend_from_slice(&[2, 1, 0, 1, 2]);
        let chunk = MultistreamChunk::find(&data, 0, 3).unwrap().unwrap();
        assert_eq!(chunk.stream_count, 2);
        assert_eq!(chunk.coupled_count, 1);
        assert_eq!(chunk.channel_mapping(), &[0, 1, 2]);

        assert_eq!(MultistreamChunk::find(&sample_stream(), 0, 2).unwrap(), None);
    }
}
