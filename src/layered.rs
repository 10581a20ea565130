//! Capcom's 6-channel streams: three stereo Opus streams whose packets are
//! interleaved one per layer per frame (`L0 L1 L2 L0 L1 L2 ...`).
//!
//! Processing goes split, then one independent pass per layer, then
//! recombine. Any failing layer aborts the whole operation.

use crate::codec::Engine;
use crate::container::{Packet, PacketRef};
use crate::decode::decode_packets;
use crate::error::{Error, Result};
use crate::sniff::VariantMatch;

pub const LAYER_COUNT: usize = 3;
pub const LAYER_CHANNELS: usize = 2;
pub const LAYERED_CHANNELS: usize = LAYER_COUNT * LAYER_CHANNELS;

/// Splits interleaved 6-channel PCM into three interleaved stereo buffers:
/// channels 0-1, 2-3 and 4-5. A trailing partial frame is dropped.
pub fn split(pcm: &[i16]) -> Vec<Vec<i16>> {
    let frames = pcm.len() / LAYERED_CHANNELS;
    let mut layers = vec![Vec::with_capacity(frames * LAYER_CHANNELS); LAYER_COUNT];
    for frame in pcm.chunks_exact(LAYERED_CHANNELS) {
        for (layer, pair) in layers.iter_mut().zip(frame.chunks_exact(LAYER_CHANNELS)) {
            layer.extend_from_slice(pair);
        }
    }
    layers
}

/// Inverse of [`split`]. Layers of different lengths are cut to the
/// shortest.
pub fn recombine(layers: &[Vec<i16>]) -> Vec<i16> {
    let frames = layers
        .iter()
        .map(|layer| layer.len() / LAYER_CHANNELS)
        .min()
        .unwrap_or(0);

    let mut pcm = Vec::with_capacity(frames * LAYER_CHANNELS * layers.len());
    for frame in 0..frames {
        for layer in layers {
            pcm.extend_from_slice(&layer[frame * LAYER_CHANNELS..(frame + 1) * LAYER_CHANNELS]);
        }
    }
    pcm
}

/// Routes every `layer`-th packet to its layer.
pub fn deinterleave_packets<'a>(packets: &[PacketRef<'a>]) -> Vec<Vec<PacketRef<'a>>> {
    let mut layers = vec![Vec::with_capacity(packets.len() / LAYER_COUNT + 1); LAYER_COUNT];
    for (index, packet) in packets.iter().enumerate() {
        layers[index % LAYER_COUNT].push(*packet);
    }
    layers
}

/// Lays per-layer packet lists out frame by frame. All layers must hold the
/// same number of packets.
pub fn interleave_packets(layers: Vec<Vec<Packet>>) -> Result<Vec<Packet>> {
    let frames = layers.first().map_or(0, Vec::len);
    if let Some(index) = layers.iter().position(|layer| layer.len() != frames) {
        return Err(Error::Layer {
            index,
            source: Box::new(Error::Unsupported(format!(
                "{} packets where the first layer has {frames}",
                layers[index].len()
            ))),
        });
    }

    let mut iters: Vec<_> = layers.into_iter().map(Vec::into_iter).collect();
    let mut packets = Vec::with_capacity(frames * iters.len());
    for _ in 0..frames {
        for layer in iters.iter_mut() {
            packets.extend(layer.next());
        }
    }
    Ok(packets)
}

/// Runs `pass` over every layer, tagging a failure with the layer index.
pub fn run_layers<I, T>(inputs: I, mut pass: impl FnMut(usize, I::Item) -> Result<T>) -> Result<Vec<T>>
where
    I: IntoIterator,
{
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            pass(index, input).map_err(|source| Error::Layer {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Decodes the three layers of `stream` independently and interleaves the
/// result back into 6-channel PCM.
pub fn decode<E: Engine>(engine: &E, buf: &[u8], stream: &VariantMatch) -> Result<Vec<i16>> {
    let packets = stream.data.packets(buf).collect::<Result<Vec<_>>>()?;
    let pre_skip = stream.header.playback_pre_skip();

    let layers = run_layers(deinterleave_packets(&packets), |_, layer| {
        decode_packets(engine, &layer, LAYER_CHANNELS as u8, pre_skip)
    })?;

    Ok(recombine(&layers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_by_channel_pairs() {
        let pcm: Vec<i16> = (0..12).collect();
        let layers = split(&pcm);
        assert_eq!(layers[0], [0, 1, 6, 7]);
        assert_eq!(layers[1], [2, 3, 8, 9]);
        assert_eq!(layers[2], [4, 5, 10, 11]);
        assert_eq!(recombine(&layers), pcm);
    }

    #[test]
    fn recombine_cuts_to_shortest() {
        let layers = vec![vec![1, 1, 1, 1], vec![2, 2], vec![3, 3, 3, 3]];
        assert_eq!(recombine(&layers), [1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn packets_round_robin() {
        let packet = |tag: u8| Packet {
            payload: vec![tag],
            final_range: tag as u32,
        };
        let layers = vec![vec![packet(0), packet(3)], vec![packet(1), packet(4)], vec![packet(2), packet(5)]];
        let packets = interleave_packets(layers).unwrap();
        let tags: Vec<u8> = packets.iter().map(|p| p.payload[0]).collect();
        assert_eq!(tags, [0, 1, 2, 3, 4, 5]);

        let refs: Vec<PacketRef<'_>> = packets
            .iter()
            .map(|p| PacketRef {
                final_range: p.final_range,
                payload: &p.payload,
            })
            .collect();
        let split = deinterleave_packets(&refs);
        assert_eq!(split[1].iter().map(|p| p.payload[0]).collect::<Vec<_>>(), [1, 4]);
    }

    #[test]
    fn uneven_layers_are_rejected() {
        let packet = Packet {
            payload: vec![0],
            final_range: 0,
        };
        let layers = vec![vec![packet.clone()], vec![], vec![packet]];
        assert!(matches!(interleave_packets(layers), Err(Error::Layer { index: 1, .. })));
    }

    #[test]
    fn failing_layer_aborts() {
        let result = run_layers(0..3, |index, _| {
            if index == 1 {
                Err(Error::Codec("bad packet".into()))
            } else {
                Ok(index)
            }
        });
        assert!(matches!(result, Err(Error::Layer { index: 1, .. })));
    }
}
