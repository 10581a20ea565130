mod common;

use common::{constant_pcm, lookahead, FakeEngine};
use nopus::build::capcom::{self, FRAME_SAMPLES};
use nopus::build::CapcomOptions;
use nopus::decode::decode_packets;
use nopus::layered;
use nopus::sniff::{self, NoSiblings};
use nopus::Error;

const SAMPLES: usize = FRAME_SAMPLES * 4;
const CHANNELS: [i16; 6] = [100, -200, 300, -400, 500, -600];

fn six_channel_stream(engine: &FakeEngine) -> Vec<u8> {
    let pcm = constant_pcm(&CHANNELS, SAMPLES);
    capcom::build(engine, &pcm, 48000, 6, &CapcomOptions::default()).unwrap()
}

#[test]
fn layered_decode_matches_independent_substreams() {
    let engine = FakeEngine::new();
    let bytes = six_channel_stream(&engine);
    let stream = sniff::identify(&bytes, Some("opus"), &NoSiblings).unwrap();

    let audio = nopus::decode(&engine, &bytes, &stream).unwrap();
    assert_eq!(audio.channels, 6);

    // decode every third packet on its own and interleave by channel pair
    let packets = stream.data.packets(&bytes).collect::<Result<Vec<_>, _>>().unwrap();
    let substreams: Vec<Vec<i16>> = (0..3)
        .map(|layer| {
            let own: Vec<_> = packets.iter().skip(layer).step_by(3).copied().collect();
            decode_packets(&engine, &own, 2, stream.header.playback_pre_skip()).unwrap()
        })
        .collect();

    let frames = substreams[0].len() / 2;
    let mut expected = Vec::with_capacity(frames * 6);
    for frame in 0..frames {
        for substream in &substreams {
            expected.extend_from_slice(&substream[frame * 2..frame * 2 + 2]);
        }
    }

    assert_eq!(audio.pcm, expected);
    assert_eq!(audio.samples_per_channel(), SAMPLES - lookahead(48000) as usize);
    assert!(audio.pcm.chunks_exact(6).all(|frame| frame == CHANNELS));
}

#[test]
fn split_then_recombine_is_identity() {
    let pcm: Vec<i16> = (0..600).collect();
    assert_eq!(layered::recombine(&layered::split(&pcm)), pcm);
}

#[test]
fn corrupt_layer_aborts_decode() {
    let engine = FakeEngine::new();
    let mut bytes = six_channel_stream(&engine);
    let stream = sniff::identify(&bytes, Some("opus"), &NoSiblings).unwrap();

    // turn the second packet (layer 1) into a mono packet
    let second = stream.data.packets(&bytes).nth(1).unwrap().unwrap();
    let offset = second.payload.as_ptr() as usize - bytes.as_ptr() as usize;
    bytes[offset] &= !0b100;

    match nopus::decode(&engine, &bytes, &stream) {
        Err(Error::Layer { index, .. }) => assert_eq!(index, 1),
        other => panic!("expected a layer failure, got {other:?}"),
    }
}
