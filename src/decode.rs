//! Decoding a sniffed stream back to PCM.

use tracing::debug;

use crate::codec::{Engine, FrameDecoder};
use crate::container::{LoopRange, PacketRef, PLAYBACK_RATE};
use crate::error::{Error, Result};
use crate::layered;
use crate::sniff::VariantMatch;

/// Interleaved 16-bit PCM at [`PLAYBACK_RATE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    pub pcm: Vec<i16>,
    pub channels: u8,
    pub sample_rate: u32,
    pub loop_range: LoopRange,
}

impl DecodedAudio {
    pub fn samples_per_channel(&self) -> usize {
        self.pcm.len() / self.channels.max(1) as usize
    }
}

/// Decodes every packet of `stream`, dropping the pre-skip and anything past
/// the stream's sample count.
pub fn decode<E: Engine>(engine: &E, buf: &[u8], stream: &VariantMatch) -> Result<DecodedAudio> {
    let mut pcm = if stream.layered {
        layered::decode(engine, buf, stream)?
    } else {
        if stream.multistream.is_some() && stream.channel_count > 2 {
            return Err(Error::Unsupported(format!(
                "{}-channel multistream Opus",
                stream.channel_count
            )));
        }
        let packets = stream.data.packets(buf).collect::<Result<Vec<_>>>()?;
        decode_packets(engine, &packets, stream.channel_count, stream.header.playback_pre_skip())?
    };

    let channels = stream.channel_count as usize;
    let expected = stream.sample_count as usize * channels;
    if stream.sample_count > 0 && pcm.len() > expected {
        debug!(decoded = pcm.len() / channels, expected = stream.sample_count, "trimming to sample count");
        pcm.truncate(expected);
    }

    Ok(DecodedAudio {
        pcm,
        channels: stream.channel_count,
        sample_rate: PLAYBACK_RATE,
        loop_range: stream.loop_range,
    })
}

/// Runs `packets` through one decoder and drops the first `pre_skip`
/// samples per channel, counted at [`PLAYBACK_RATE`].
pub fn decode_packets<E: Engine>(
    engine: &E,
    packets: &[PacketRef<'_>],
    channels: u8,
    pre_skip: u32,
) -> Result<Vec<i16>> {
    if !matches!(channels, 1 | 2) {
        return Err(Error::InvalidChannels(channels as u32));
    }

    let mut decoder = engine.decoder(PLAYBACK_RATE, channels)?;
    let channels = channels as usize;
    let mut samples = Vec::new();
    let mut left_to_skip = pre_skip as usize;

    for packet in packets {
        let decoded = decoder.decode(packet.payload)?;
        let frames = decoded.len() / channels;

        if left_to_skip >= frames {
            left_to_skip -= frames;
            continue;
        }
        samples.extend_from_slice(&decoded[left_to_skip * channels..frames * channels]);
        left_to_skip = 0;
    }

    Ok(samples)
}
