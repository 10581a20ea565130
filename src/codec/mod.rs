//! The Opus codec engine, consumed as a black box.
//!
//! The containers only need four things from a codec: encode one frame of
//! interleaved PCM, decode one packet, the encoder lookahead (written as
//! pre-skip) and the encoder final range (written next to every packet).
//! [`Engine`] is the factory the builders and the decoder are generic over;
//! instances it hands out live for a single conversion.

#[cfg(feature = "libopus")]
pub mod libopus;

use crate::error::Result;

#[cfg(feature = "libopus")]
pub use libopus::Libopus;

/// Target bitrate of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitrate {
    /// Let the encoder decide.
    Auto,
    /// Bits per second.
    Bits(u32),
}

/// Hint about the signal being coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    #[default]
    Auto,
    Voice,
    Music,
}

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Rate the PCM handed to the encoder is sampled at.
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: Bitrate,
    pub vbr: bool,
    /// Constrained VBR keeps packet sizes close to the nominal bitrate.
    pub vbr_constraint: bool,
    /// 0 to 10, `None` keeps the encoder default.
    pub complexity: Option<u8>,
    /// Force full band instead of letting the encoder narrow it.
    pub full_band: bool,
    pub signal: Signal,
}

impl EncoderConfig {
    /// Unconstrained VBR music encoder, what the standard container is built with.
    pub fn vbr(sample_rate: u32, channels: u8, bitrate: Bitrate) -> Self {
        Self {
            sample_rate,
            channels,
            bitrate,
            vbr: true,
            vbr_constraint: false,
            complexity: None,
            full_band: false,
            signal: Signal::Auto,
        }
    }

    /// Best-quality music profile at a fixed bitrate.
    pub fn music(sample_rate: u32, channels: u8, bits: u32) -> Self {
        Self {
            sample_rate,
            channels,
            bitrate: Bitrate::Bits(bits),
            vbr: true,
            vbr_constraint: false,
            complexity: Some(10),
            full_band: true,
            signal: Signal::Music,
        }
    }

    pub fn with_bitrate(self, bits: u32) -> Self {
        Self {
            bitrate: Bitrate::Bits(bits),
            ..self
        }
    }
}

/// Encodes one frame at a time.
pub trait FrameEncoder {
    /// Encodes `frame_samples` samples per channel of interleaved `pcm`.
    fn encode(&mut self, pcm: &[i16], frame_samples: usize) -> Result<Vec<u8>>;

    /// Samples the encoder delays its output by, at its own rate.
    fn lookahead(&self) -> Result<u16>;

    /// Range coder state after the last [`FrameEncoder::encode`].
    fn final_range(&self) -> Result<u32>;
}

/// Decodes one packet at a time.
pub trait FrameDecoder {
    /// Interleaved PCM for `packet`.
    fn decode(&mut self, packet: &[u8]) -> Result<Vec<i16>>;
}

/// Hands out fresh encoder and decoder instances.
pub trait Engine {
    type Encoder: FrameEncoder;
    type Decoder: FrameDecoder;

    fn encoder(&self, config: &EncoderConfig) -> Result<Self::Encoder>;

    fn decoder(&self, sample_rate: u32, channels: u8) -> Result<Self::Decoder>;
}

impl<E: Engine + ?Sized> Engine for &E {
    type Encoder = E::Encoder;
    type Decoder = E::Decoder;

    fn encoder(&self, config: &EncoderConfig) -> Result<Self::Encoder> {
        (**self).encoder(config)
    }

    fn decoder(&self, sample_rate: u32, channels: u8) -> Result<Self::Decoder> {
        (**self).decoder(sample_rate, channels)
    }
}
