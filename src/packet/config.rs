//! Structures describing the `config` field of the TOC byte.
//!
//! The TOC (Table of Contents) byte opens every Opus packet and signals the
//! mode, bandwidth and frame duration shared by all frames in the packet.
//! That is all the container layer needs to know how many samples a packet
//! carries without running the decoder.
//!
//! See [RFC 6716, Section 3.1][1].
//!
//! [1]: (https://datatracker.ietf.org/doc/html/rfc6716#section-3.1)

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Operating mode used for packet coding.
pub enum Mode {
    /// [SILK][2]-only mode, speech at low bitrates.
    ///
    /// [2]: https://en.wikipedia.org/wiki/SILK
    Silk,
    /// [CELT][3]-only mode, used for music by every Nintendo encoder profile
    /// seen in the wild.
    ///
    /// [3]: https://en.wikipedia.org/wiki/CELT
    Celt,
    /// Hybrid (SILK+CELT) mode.
    Hybrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Audio bandwidth of the coded signal.
pub enum Bandwidth {
    /// 0-4 kHz.
    Narrow,
    /// 0-6 kHz.
    Medium,
    /// 0-8 kHz.
    Wide,
    /// 0-12 kHz.
    SuperWide,
    /// 0-20 kHz.
    FullBand,
}

/// TOC configuration field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub bandwidth: Bandwidth,
    /// Duration of one frame expressed in samples at 48 kHz, which is the
    /// clock every Nintendo container counts in.
    ///
    /// 2.5 ms = 120, 5 ms = 240, 10 ms = 480, 20 ms = 960, 40 ms = 1920,
    /// 60 ms = 2880.
    pub frame_samples: u32,
}

impl Config {
    const fn new(mode: Mode, bandwidth: Bandwidth, frame_samples: u32) -> Self {
        Self { mode, bandwidth, frame_samples }
    }

    /// Frame duration in milliseconds.
    pub fn frame_ms(&self) -> f32 {
        self.frame_samples as f32 / 48.0
    }
}

impl Default for Config {
    /// Full-band CELT with 20 ms frames, what libopus picks for music.
    fn default() -> Self {
        OPUS_CONFIG_TABLE[31]
    }
}

use Bandwidth::*;
use Mode::*;

/// Possible configurations according to the `config` field of the TOC byte.
pub static OPUS_CONFIG_TABLE: [Config; 32] = [
    Config::new(Silk, Narrow, 480),
    Config::new(Silk, Narrow, 960),
    Config::new(Silk, Narrow, 1920),
    Config::new(Silk, Narrow, 2880),

    Config::new(Silk, Medium, 480),
    Config::new(Silk, Medium, 960),
    Config::new(Silk, Medium, 1920),
    Config::new(Silk, Medium, 2880),

    Config::new(Silk, Wide, 480),
    Config::new(Silk, Wide, 960),
    Config::new(Silk, Wide, 1920),
    Config::new(Silk, Wide, 2880),

    Config::new(Hybrid, SuperWide, 480),
    Config::new(Hybrid, SuperWide, 960),

    Config::new(Hybrid, FullBand, 480),
    Config::new(Hybrid, FullBand, 960),

    Config::new(Celt, Narrow, 120),
    Config::new(Celt, Narrow, 240),
    Config::new(Celt, Narrow, 480),
    Config::new(Celt, Narrow, 960),

    Config::new(Celt, Wide, 120),
    Config::new(Celt, Wide, 240),
    Config::new(Celt, Wide, 480),
    Config::new(Celt, Wide, 960),

    Config::new(Celt, SuperWide, 120),
    Config::new(Celt, SuperWide, 240),
    Config::new(Celt, SuperWide, 480),
    Config::new(Celt, SuperWide, 960),

    Config::new(Celt, FullBand, 120),
    Config::new(Celt, FullBand, 240),
    Config::new(Celt, FullBand, 480),
    Config::new(Celt, FullBand, 960),
];
