mod common;

use common::{constant_pcm, lookahead, FakeEngine};
use nopus::build::standard;
use nopus::container::{PLAYBACK_RATE, SAMPLE_RATES};
use nopus::sniff::{self, NoSiblings};
use nopus::{Dialect, Error};

#[test]
fn build_identify_decode_every_format() {
    let engine = FakeEngine::new();

    for &rate in &SAMPLE_RATES {
        for channels in 1..=2u8 {
            let frame = standard::frame_samples(rate);
            let values = [1000, -1000];
            let pcm = constant_pcm(&values[..channels as usize], frame * 10);

            let bytes = standard::build(&engine, &pcm, rate, channels).unwrap();
            let stream = sniff::identify(&bytes, Some("opus"), &NoSiblings)
                .unwrap_or_else(|| panic!("{rate} Hz x{channels} not identified"));

            assert_eq!(stream.dialect, Dialect::Standard);
            let descriptor = stream.descriptor();
            assert_eq!(descriptor.channel_count, channels);
            assert_eq!(descriptor.sample_rate, rate);
            assert_eq!(descriptor.pre_skip, lookahead(rate));
            assert_eq!(stream.data.packets(&bytes).count(), 10);

            let audio = nopus::decode(&engine, &bytes, &stream).unwrap();
            assert_eq!(audio.channels, channels);
            assert_eq!(audio.sample_rate, PLAYBACK_RATE);
            assert_eq!(audio.samples_per_channel(), stream.sample_count as usize);
            assert!(audio.pcm.chunks_exact(channels as usize).all(|s| s == &values[..channels as usize]));
        }
    }
}

#[test]
fn trailing_partial_frame_is_dropped() {
    let engine = FakeEngine::new();
    let pcm = constant_pcm(&[5, 5], 960 * 3 + 100);

    let bytes = standard::build(&engine, &pcm, 48000, 2).unwrap();
    let stream = sniff::identify(&bytes, None, &NoSiblings).unwrap();

    assert_eq!(stream.data.packets(&bytes).count(), 3);
    assert_eq!(stream.sample_count, 960 * 3 - lookahead(48000) as u32);
}

#[test]
fn vbr_header_without_context() {
    let engine = FakeEngine::new();
    let bytes = standard::build(&engine, &constant_pcm(&[0], 960), 48000, 1).unwrap();

    // frame size 0 marks VBR
    assert_eq!(&bytes[0x0A..0x0C], &[0, 0]);
    assert_eq!(&bytes[0x18..0x1C], &[0, 0, 0, 0]);
    assert!(!sniff::identify(&bytes, None, &NoSiblings).unwrap().loop_range.enabled);
}

#[test]
fn rejects_bad_input_formats() {
    let engine = FakeEngine::new();
    let pcm = constant_pcm(&[0, 0], 960);

    assert!(matches!(
        standard::build(&engine, &pcm, 44100, 2),
        Err(Error::InvalidSampleRate(44100))
    ));
    assert!(matches!(
        standard::build(&engine, &pcm, 48000, 3),
        Err(Error::InvalidChannels(3))
    ));
    assert!(matches!(
        standard::build(&engine, &pcm, 48000, 6),
        Err(Error::InvalidChannels(6))
    ));
}

#[test]
fn empty_input_gives_empty_stream() {
    let engine = FakeEngine::new();
    let bytes = standard::build(&engine, &[], 48000, 2).unwrap();
    let stream = sniff::identify(&bytes, None, &NoSiblings).unwrap();

    assert_eq!(stream.data.size, 0);
    assert_eq!(stream.sample_count, 0);
    assert!(nopus::decode(&engine, &bytes, &stream).unwrap().pcm.is_empty());
}

#[test]
fn pre_skip_is_scaled_to_playback_rate() {
    let engine = FakeEngine::new();
    let frame = standard::frame_samples(16000);
    let bytes = standard::build(&engine, &constant_pcm(&[300], frame * 10), 16000, 1).unwrap();
    let stream = sniff::identify(&bytes, None, &NoSiblings).unwrap();

    // stored at the declared rate, removed at 48 kHz
    assert_eq!(stream.header.pre_skip, 104);
    assert_eq!(stream.sample_count, 10 * 960 - 312);

    let audio = nopus::decode(&engine, &bytes, &stream).unwrap();
    assert_eq!(audio.samples_per_channel(), 10 * 960 - 312);
}
