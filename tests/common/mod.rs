//! A deterministic stand-in for libopus.
//!
//! Packets carry a real TOC (CELT full band, 20 ms frames, code 3 for longer
//! frames) followed by the mean of every channel over the frame, padded with
//! `0xAA` up to the size the bitrate asks for. Decoding a packet yields those
//! means, repeated for the frame's length.

#![allow(dead_code)]

use std::cell::Cell;

use nopus::codec::{Bitrate, EncoderConfig, Engine, FrameDecoder, FrameEncoder};
use nopus::packet::toc;
use nopus::{Error, Result};

/// Bitrate the fake assumes when asked to pick one itself.
pub const AUTO_BITRATE: u32 = 64000;

#[derive(Debug, Default)]
pub struct FakeEngine {
    encoders: Cell<usize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoders handed out so far.
    pub fn encoders_created(&self) -> usize {
        self.encoders.get()
    }
}

/// Lookahead the fake reports: 6.5 ms.
pub fn lookahead(sample_rate: u32) -> u16 {
    (sample_rate / 1000 * 13 / 2) as u16
}

/// Payload size the fake produces for one frame.
pub fn packet_size(bitrate: u32, frame_ms: u32, channels: u8) -> usize {
    let header = if frame_ms > 20 { 2 } else { 1 };
    let minimum = header + 2 * channels as usize;
    minimum.max((bitrate as u64 * frame_ms as u64 / 8000) as usize)
}

pub struct FakeEncoder {
    config: EncoderConfig,
    frames: u32,
}

impl FrameEncoder for FakeEncoder {
    fn encode(&mut self, pcm: &[i16], frame_samples: usize) -> Result<Vec<u8>> {
        let channels = self.config.channels as usize;
        let frame = pcm
            .get(..frame_samples * channels)
            .ok_or_else(|| Error::Codec("short frame".into()))?;

        let frame_ms = (frame_samples as u32 * 1000 / self.config.sample_rate).max(20);
        let stereo = (channels == 2) as u8;
        let mut packet = match frame_ms / 20 {
            1 => vec![(31 << 3) | (stereo << 2)],
            count => vec![(31 << 3) | (stereo << 2) | 3, count as u8],
        };

        for channel in 0..channels {
            let sum: i64 = frame.iter().skip(channel).step_by(channels).map(|&s| s as i64).sum();
            let mean = (sum / frame_samples.max(1) as i64) as i16;
            packet.extend_from_slice(&mean.to_le_bytes());
        }

        let bitrate = match self.config.bitrate {
            Bitrate::Auto => AUTO_BITRATE,
            Bitrate::Bits(bits) => bits,
        };
        packet.resize(packet_size(bitrate, frame_ms, self.config.channels), 0xAA);

        self.frames += 1;
        Ok(packet)
    }

    fn lookahead(&self) -> Result<u16> {
        Ok(lookahead(self.config.sample_rate))
    }

    fn final_range(&self) -> Result<u32> {
        Ok(0x1234_0000 + self.frames)
    }
}

pub struct FakeDecoder {
    sample_rate: u32,
    channels: usize,
}

impl FrameDecoder for FakeDecoder {
    fn decode(&mut self, packet: &[u8]) -> Result<Vec<i16>> {
        let parsed = toc::parse(packet).map_err(|err| Error::Codec(format!("{err:?}")))?;
        let packet_channels = if parsed.is_stereo { 2 } else { 1 };
        if packet_channels != self.channels {
            return Err(Error::Codec(format!(
                "{packet_channels}-channel packet given to a {}-channel decoder",
                self.channels
            )));
        }

        let header = if parsed.code == toc::Code::Code3 { 2 } else { 1 };
        let means: Vec<i16> = packet
            .get(header..header + 2 * self.channels)
            .ok_or_else(|| Error::Codec("packet too short".into()))?
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let samples = (parsed.samples() as u64 * self.sample_rate as u64 / 48000) as usize;
        Ok(means.iter().copied().cycle().take(samples * self.channels).collect())
    }
}

impl Engine for FakeEngine {
    type Encoder = FakeEncoder;
    type Decoder = FakeDecoder;

    fn encoder(&self, config: &EncoderConfig) -> Result<FakeEncoder> {
        self.encoders.set(self.encoders.get() + 1);
        Ok(FakeEncoder {
            config: *config,
            frames: 0,
        })
    }

    fn decoder(&self, sample_rate: u32, channels: u8) -> Result<FakeDecoder> {
        Ok(FakeDecoder {
            sample_rate,
            channels: channels as usize,
        })
    }
}

/// Interleaved PCM where channel `c` is `values[c]` throughout.
pub fn constant_pcm(values: &[i16], samples_per_channel: usize) -> Vec<i16> {
    values.iter().copied().cycle().take(values.len() * samples_per_channel).collect()
}
