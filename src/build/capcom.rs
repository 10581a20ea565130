//! Capcom containers.
//!
//! Games check more than the header: replacement audio plays back reliably
//! only when its packets are as large as the ones it replaces. Given the
//! packet sizes of a reference file, the builder searches a bitrate on the
//! first frame that reproduces its size and truncates any packet that still
//! comes out too large.

use std::borrow::Cow;

use tracing::{debug, warn};

use super::{encode_frame, split_frames, Tail};
use crate::codec::{EncoderConfig, Engine, FrameEncoder};
use crate::container::capcom::{CapcomHeader, CAPCOM_HEADER_SIZE, DEFAULT_CONFIG_DATA};
use crate::container::cursor::{Reader, Writer};
use crate::container::standard::{write_data_chunk, StandardHeader};
use crate::container::{validate_sample_rate, DataChunk, LoopRange, Packet, PLAYBACK_RATE};
use crate::error::{Error, Result};
use crate::layered::{self, LAYER_CHANNELS};

/// 60 ms at 48 kHz.
pub const FRAME_SAMPLES: usize = 2880;
/// Final range stored with the first packet regardless of the encoder's.
pub const FIRST_FINAL_RANGE: u32 = 0xF000_0000;
/// Bitrate used when there is nothing to match.
pub const UNCONSTRAINED_BITRATE: u32 = 192_000;
/// Absolute offset of the 8 opaque bytes inside the nested basic info chunk
/// (its data offset and frame data offset fields).
pub const CRITICAL_BYTES_OFFSET: usize = CAPCOM_HEADER_SIZE + 0x08;

pub const MIN_BITRATE: u32 = 8000;
pub const MAX_BITRATE: u32 = 512_000;
pub const BITRATE_STEP: u32 = 2000;
pub const MAX_SEARCH_ITERATIONS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapcomOptions {
    pub loop_range: LoopRange,
    /// Copied to header offset 0x20.
    pub config_data: [u8; 16],
    /// Copied over header offsets 0x38..0x40 after everything is written.
    pub critical_bytes: Option<[u8; 8]>,
    /// Payload sizes to match, one per packet in file order.
    pub packet_size_targets: Option<Vec<u32>>,
}

impl Default for CapcomOptions {
    fn default() -> Self {
        Self {
            loop_range: LoopRange::DISABLED,
            config_data: DEFAULT_CONFIG_DATA,
            critical_bytes: None,
            packet_size_targets: None,
        }
    }
}

/// What gets carried over from an original Capcom file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFile {
    pub header: CapcomHeader,
    pub critical_bytes: [u8; 8],
    /// Payload length of every packet, in file order.
    pub packet_sizes: Vec<u32>,
}

impl ReferenceFile {
    pub fn read(buf: &[u8]) -> Result<Self> {
        let header = CapcomHeader::read(buf, 0)?;
        let offset = header.data_offset as usize;
        let nested = StandardHeader::read(buf, offset)?;
        let critical_bytes = Reader::at(buf, offset + 0x08).array()?;

        let data = DataChunk::read(buf, offset + nested.data_offset as usize)?;
        let packet_sizes = data
            .packets(buf)
            .map(|packet| packet.map(|packet| packet.payload.len() as u32))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            critical_bytes,
            packet_sizes,
        })
    }

    /// Options reproducing this file's opaque fields and packet sizes.
    pub fn options(&self, loop_range: LoopRange) -> CapcomOptions {
        CapcomOptions {
            loop_range,
            config_data: self.header.config_data,
            critical_bytes: Some(self.critical_bytes),
            packet_size_targets: Some(self.packet_sizes.clone()),
        }
    }
}

/// Encodes interleaved `pcm` into a Capcom container.
///
/// The PCM is encoded at 48 kHz. Any other `sample_rate` is only recorded in
/// the nested header. Six channels are encoded as three stereo layers.
pub fn build<E: Engine>(
    engine: &E,
    pcm: &[i16],
    sample_rate: u32,
    channels: u8,
    options: &CapcomOptions,
) -> Result<Vec<u8>> {
    validate_sample_rate(sample_rate)?;
    if sample_rate != PLAYBACK_RATE {
        warn!(sample_rate, "Capcom streams are encoded at {PLAYBACK_RATE} Hz, input is treated as such");
    }

    let (inputs, stream_channels): (Vec<Cow<'_, [i16]>>, u8) = match channels {
        1 | 2 => (vec![Cow::Borrowed(pcm)], channels),
        6 => (
            layered::split(pcm).into_iter().map(Cow::Owned).collect(),
            LAYER_CHANNELS as u8,
        ),
        other => return Err(Error::InvalidChannels(other as u32)),
    };
    let layer_count = inputs.len();

    let samples_per_channel = (pcm.len() / channels as usize) as u32;
    let loop_range = options.loop_range.validated(samples_per_channel);

    let mut config = EncoderConfig::music(PLAYBACK_RATE, stream_channels, UNCONSTRAINED_BITRATE);
    let targets = options.packet_size_targets.as_deref().map(|sizes| Targets { sizes, layer_count });

    // the first layer's first frame decides the bitrate for everything
    if let Some(target) = targets.and_then(|targets| targets.get(0, 0)) {
        if let Some(first) = split_frames(&inputs[0], stream_channels as usize, FRAME_SAMPLES, Tail::Pad).first() {
            let bitrate = search_bitrate(engine, &config, first, target)?;
            config = config.with_bitrate(bitrate);
        }
    }

    let encoded = layered::run_layers(inputs, |layer, input| {
        encode_layer(engine, &config, &input, targets, layer)
    })?;

    let pre_skip = encoded.first().map_or(0, |(pre_skip, _)| *pre_skip);
    let packets = if layer_count == 1 {
        encoded.into_iter().flat_map(|(_, packets)| packets).collect()
    } else {
        layered::interleave_packets(encoded.into_iter().map(|(_, packets)| packets).collect())?
    };

    debug!(
        packets = packets.len(),
        pre_skip,
        channels,
        bitrate = ?config.bitrate,
        "encoded Capcom stream"
    );

    let header = CapcomHeader::new(samples_per_channel, channels as u32, loop_range, options.config_data);
    let mut writer = Writer::new();
    header.write(&mut writer);
    // the nested header counts pre-skip at its declared rate
    let stored_pre_skip = (pre_skip as u32 * sample_rate / PLAYBACK_RATE) as u16;
    StandardHeader::vbr(stream_channels, sample_rate, stored_pre_skip).write(&mut writer);
    write_data_chunk(&mut writer, &packets);

    let mut bytes = writer.into_inner();
    if let Some(critical) = options.critical_bytes {
        bytes[CRITICAL_BYTES_OFFSET..CRITICAL_BYTES_OFFSET + critical.len()].copy_from_slice(&critical);
    }
    Ok(bytes)
}

/// Packet size targets laid out the way packets are stored: one per layer
/// per frame.
#[derive(Debug, Clone, Copy)]
struct Targets<'a> {
    sizes: &'a [u32],
    layer_count: usize,
}

impl Targets<'_> {
    fn get(&self, frame: usize, layer: usize) -> Option<u32> {
        self.sizes.get(frame * self.layer_count + layer).copied()
    }
}

fn encode_layer<E: Engine>(
    engine: &E,
    config: &EncoderConfig,
    pcm: &[i16],
    targets: Option<Targets<'_>>,
    layer: usize,
) -> Result<(u16, Vec<Packet>)> {
    let mut encoder = engine.encoder(config)?;
    let pre_skip = encoder.lookahead()?;

    let frames = split_frames(pcm, config.channels as usize, FRAME_SAMPLES, Tail::Pad);
    let mut packets = Vec::with_capacity(frames.len());

    for (index, frame) in frames.iter().enumerate() {
        let mut packet = encode_frame(&mut encoder, frame, FRAME_SAMPLES)?;

        if let Some(target) = targets.and_then(|targets| targets.get(index, layer)) {
            fit_to_target(&mut packet, target, index);
        }
        if index == 0 {
            packet.final_range = FIRST_FINAL_RANGE;
        }
        packets.push(packet);
    }

    Ok((pre_skip, packets))
}

/// Packets are cut down to their target, never grown.
fn fit_to_target(packet: &mut Packet, target: u32, index: usize) {
    let size = packet.payload.len();
    let target = target as usize;
    if size > target {
        warn!(packet = index, size, target, "packet exceeds target size, truncating");
        packet.payload.truncate(target);
    } else if size < target {
        debug!(packet = index, size, target, "packet below target size");
    }
}

/// Bitrate to start searching from: the target size over one frame.
fn initial_bitrate(target: u32) -> u32 {
    let bits = target as u64 * 8 * PLAYBACK_RATE as u64 / FRAME_SAMPLES as u64;
    bits.clamp(MIN_BITRATE as u64, MAX_BITRATE as u64) as u32
}

/// Walks the bitrate in [`BITRATE_STEP`]s until a fresh encoder turns
/// `frame` into exactly `target` bytes, the bounds are left or the
/// iterations run out. Returns the bitrate that came closest.
pub fn search_bitrate<E: Engine>(engine: &E, config: &EncoderConfig, frame: &[i16], target: u32) -> Result<u32> {
    let mut bitrate = initial_bitrate(target);
    let mut best = (bitrate, u32::MAX);

    for iteration in 0..MAX_SEARCH_ITERATIONS {
        let mut encoder = engine.encoder(&config.with_bitrate(bitrate))?;
        let size = encoder.encode(frame, FRAME_SAMPLES)?.len() as u32;
        let distance = size.abs_diff(target);
        debug!(iteration, bitrate, size, target, "bitrate search");

        if distance < best.1 {
            best = (bitrate, distance);
        }
        if size == target {
            break;
        }

        let next = if size > target {
            bitrate.checked_sub(BITRATE_STEP)
        } else {
            bitrate.checked_add(BITRATE_STEP)
        };
        match next {
            Some(next) if (MIN_BITRATE..=MAX_BITRATE).contains(&next) => bitrate = next,
            _ => break,
        }
    }

    if best.1 != 0 {
        warn!(bitrate = best.0, target, off_by = best.1, "no bitrate reproduces the first packet size exactly");
    }
    Ok(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layered::LAYER_COUNT;

    #[test]
    fn initial_bitrate_from_target() {
        // 300 bytes every 60 ms
        assert_eq!(initial_bitrate(300), 40_000);
        assert_eq!(initial_bitrate(1), MIN_BITRATE);
        assert_eq!(initial_bitrate(100_000), MAX_BITRATE);
    }

    #[test]
    fn oversized_packets_are_truncated() {
        let mut packet = Packet {
            payload: vec![7; 10],
            final_range: 0,
        };
        fit_to_target(&mut packet, 4, 0);
        assert_eq!(packet.payload, [7; 4]);

        fit_to_target(&mut packet, 8, 0);
        assert_eq!(packet.payload.len(), 4);
    }

    #[test]
    fn targets_are_interleaved_by_layer() {
        let sizes = [10, 11, 12, 20, 21, 22];
        let targets = Targets {
            sizes: &sizes,
            layer_count: LAYER_COUNT,
        };
        assert_eq!(targets.get(0, 0), Some(10));
        assert_eq!(targets.get(1, 2), Some(22));
        assert_eq!(targets.get(2, 0), None);
    }
}
