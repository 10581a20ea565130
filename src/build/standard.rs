//! Plain Nintendo Opus streams: basic info chunk, then the data chunk.

use tracing::debug;

use super::{encode_frame, split_frames, Tail};
use crate::codec::{Bitrate, EncoderConfig, Engine, FrameEncoder};
use crate::container::cursor::Writer;
use crate::container::standard::{write_data_chunk, StandardHeader, DATA_CHUNK_HEADER_SIZE, HEADER_SIZE};
use crate::container::{validate_sample_rate, Packet};
use crate::error::{Error, Result};

/// Duration of every frame.
pub const FRAME_MS: u32 = 20;
/// Nominal VBR target.
pub const DEFAULT_BITRATE: u32 = 96000;

/// Samples per channel in one frame at `sample_rate`.
pub fn frame_samples(sample_rate: u32) -> usize {
    (sample_rate / 1000 * FRAME_MS) as usize
}

/// Encodes interleaved `pcm` into a standard container.
///
/// Samples that do not fill a whole frame at the end are dropped.
pub fn build<E: Engine>(engine: &E, pcm: &[i16], sample_rate: u32, channels: u8) -> Result<Vec<u8>> {
    validate_sample_rate(sample_rate)?;
    if !matches!(channels, 1 | 2) {
        return Err(Error::InvalidChannels(channels as u32));
    }

    let config = EncoderConfig::vbr(sample_rate, channels, Bitrate::Bits(DEFAULT_BITRATE));
    let mut encoder = engine.encoder(&config)?;
    let pre_skip = encoder.lookahead()?;

    let frame_samples = frame_samples(sample_rate);
    let packets = split_frames(pcm, channels as usize, frame_samples, Tail::Drop)
        .iter()
        .map(|frame| encode_frame(&mut encoder, frame, frame_samples))
        .collect::<Result<Vec<_>>>()?;

    debug!(packets = packets.len(), pre_skip, sample_rate, channels, "encoded standard stream");

    Ok(write(&StandardHeader::vbr(channels, sample_rate, pre_skip), &packets))
}

/// Serializes a header and its packets. The header's data offset is
/// expected to point right behind it.
pub fn write(header: &StandardHeader, packets: &[Packet]) -> Vec<u8> {
    let data_len: usize = packets.iter().map(Packet::wire_len).sum();
    let mut writer = Writer::with_capacity(HEADER_SIZE + DATA_CHUNK_HEADER_SIZE + data_len);
    header.write(&mut writer);
    write_data_chunk(&mut writer, packets);
    writer.into_inner()
}
