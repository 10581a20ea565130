//! [`Engine`] backed by libopus through `audiopus`.

use audiopus::coder::{Decoder, Encoder};
use audiopus::{Application, Channels, SampleRate};

use super::{Bitrate, EncoderConfig, Engine, FrameDecoder, FrameEncoder, Signal};
use crate::error::{Error, Result};

// opus_defines.h
const OPUS_SET_BITRATE_REQUEST: i32 = 4002;
const OPUS_SET_BANDWIDTH_REQUEST: i32 = 4008;
const OPUS_SET_VBR_REQUEST: i32 = 4006;
const OPUS_SET_COMPLEXITY_REQUEST: i32 = 4010;
const OPUS_SET_VBR_CONSTRAINT_REQUEST: i32 = 4020;
const OPUS_SET_SIGNAL_REQUEST: i32 = 4024;
const OPUS_GET_LOOKAHEAD_REQUEST: i32 = 4027;
const OPUS_GET_FINAL_RANGE_REQUEST: i32 = 4031;

const OPUS_AUTO: i32 = -1000;
const OPUS_BANDWIDTH_FULLBAND: i32 = 1105;
const OPUS_SIGNAL_VOICE: i32 = 3001;
const OPUS_SIGNAL_MUSIC: i32 = 3002;

/// Largest packet libopus can emit for one frame (1275 bytes per 20 ms,
/// three of them for 60 ms, plus framing).
const MAX_PACKET_SIZE: usize = 1275 * 3 + 7;
/// 120 ms at 48 kHz, the longest a packet can decode to.
const MAX_FRAME_SAMPLES: usize = 5760;

/// The system libopus.
#[derive(Debug, Clone, Copy, Default)]
pub struct Libopus;

fn sample_rate(rate: u32) -> Result<SampleRate> {
    Ok(match rate {
        8000 => SampleRate::Hz8000,
        12000 => SampleRate::Hz12000,
        16000 => SampleRate::Hz16000,
        24000 => SampleRate::Hz24000,
        48000 => SampleRate::Hz48000,
        other => return Err(Error::InvalidSampleRate(other)),
    })
}

fn channels(count: u8) -> Result<Channels> {
    match count {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        other => Err(Error::InvalidChannels(other as u32)),
    }
}

fn codec_error(what: &str) -> impl Fn(audiopus::Error) -> Error + '_ {
    move |err| Error::Codec(format!("{what}: {err}"))
}

pub struct LibopusEncoder {
    inner: Encoder,
    channels: usize,
}

impl LibopusEncoder {
    fn ctl(&mut self, request: i32, value: i32, what: &str) -> Result<()> {
        self.inner
            .set_encoder_ctl_request(request, value)
            .map_err(codec_error(what))
    }
}

impl FrameEncoder for LibopusEncoder {
    fn encode(&mut self, pcm: &[i16], frame_samples: usize) -> Result<Vec<u8>> {
        let input = pcm
            .get(..frame_samples * self.channels)
            .ok_or_else(|| Error::Codec(format!("frame of {frame_samples} samples exceeds input")))?;

        let mut out = vec![0u8; MAX_PACKET_SIZE];
        let len = self.inner.encode(input, &mut out).map_err(codec_error("opus_encode"))?;
        out.truncate(len);
        Ok(out)
    }

    fn lookahead(&self) -> Result<u16> {
        let samples = self
            .inner
            .encoder_ctl_request(OPUS_GET_LOOKAHEAD_REQUEST)
            .map_err(codec_error("failed to get pre-skip sample count"))?;
        Ok(samples as u16)
    }

    fn final_range(&self) -> Result<u32> {
        self.inner
            .encoder_ctl_request(OPUS_GET_FINAL_RANGE_REQUEST)
            .map(|range| range as u32)
            .map_err(codec_error("failed to get encoder final range"))
    }
}

pub struct LibopusDecoder {
    inner: Decoder,
    channels: usize,
}

impl FrameDecoder for LibopusDecoder {
    fn decode(&mut self, packet: &[u8]) -> Result<Vec<i16>> {
        let mut out = vec![0i16; MAX_FRAME_SAMPLES * self.channels];
        let samples = self
            .inner
            .decode(Some(packet), &mut out[..], false)
            .map_err(codec_error("opus_decode"))?;
        out.truncate(samples * self.channels);
        Ok(out)
    }
}

impl Engine for Libopus {
    type Encoder = LibopusEncoder;
    type Decoder = LibopusDecoder;

    fn encoder(&self, config: &EncoderConfig) -> Result<LibopusEncoder> {
        let inner = Encoder::new(
            sample_rate(config.sample_rate)?,
            channels(config.channels)?,
            Application::Audio,
        )
        .map_err(codec_error("opus_encoder_create"))?;

        let mut encoder = LibopusEncoder {
            inner,
            channels: config.channels as usize,
        };

        let bitrate = match config.bitrate {
            Bitrate::Auto => OPUS_AUTO,
            Bitrate::Bits(bits) => bits as i32,
        };
        encoder.ctl(OPUS_SET_BITRATE_REQUEST, bitrate, "failed to set bitrate")?;
        encoder.ctl(OPUS_SET_VBR_REQUEST, config.vbr as i32, "failed to set VBR")?;
        encoder.ctl(
            OPUS_SET_VBR_CONSTRAINT_REQUEST,
            config.vbr_constraint as i32,
            "failed to set VBR constraint",
        )?;
        if let Some(complexity) = config.complexity {
            encoder.ctl(OPUS_SET_COMPLEXITY_REQUEST, complexity as i32, "failed to set complexity")?;
        }
        if config.full_band {
            encoder.ctl(OPUS_SET_BANDWIDTH_REQUEST, OPUS_BANDWIDTH_FULLBAND, "failed to set bandwidth")?;
        }
        let signal = match config.signal {
            Signal::Auto => OPUS_AUTO,
            Signal::Voice => OPUS_SIGNAL_VOICE,
            Signal::Music => OPUS_SIGNAL_MUSIC,
        };
        encoder.ctl(OPUS_SET_SIGNAL_REQUEST, signal, "failed to set signal type")?;

        Ok(encoder)
    }

    fn decoder(&self, rate: u32, count: u8) -> Result<LibopusDecoder> {
        let inner = Decoder::new(sample_rate(rate)?, channels(count)?).map_err(codec_error("opus_decoder_create"))?;
        Ok(LibopusDecoder {
            inner,
            channels: count as usize,
        })
    }
}
